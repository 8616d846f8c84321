use reqwest::Client;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const BASE_URL: &str = "http://localhost:8000";

/// Dev fallback used by the server when JWT_SECRET_KEY is unset.
const DEV_SECRET: &str = "dev-secret-key-change-in-production";

pub fn client() -> Client {
    Client::new()
}

/// A distinct user id per test run so graphs from earlier runs don't leak
/// into assertions.
pub fn unique_user_id() -> i64 {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    (ts % 1_000_000_000) as i64
}

/// Build a URL for an API endpoint.
pub fn url(path: &str) -> String {
    format!("{}{}", BASE_URL, path)
}

#[derive(Serialize)]
struct Claims {
    user_id: i64,
    exp: i64,
}

/// Mint the bearer token the external identity service would issue.
pub fn dev_token(user_id: i64) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        + 3600;

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &Claims { user_id, exp },
        &jsonwebtoken::EncodingKey::from_secret(DEV_SECRET.as_bytes()),
    )
    .expect("failed to mint test token")
}
