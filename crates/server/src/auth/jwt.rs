use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims minted by the identity service. Only `user_id` matters here;
/// this server never issues production tokens itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub exp: i64,
}

pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(user_id: i64, secret: &str, expire_hours: i64) -> String {
        let claims = Claims {
            user_id,
            exp: (Utc::now() + Duration::hours(expire_hours)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn round_trips_user_id() {
        let token = mint(42, "test-secret", 1);
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, 42);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint(42, "test-secret", 1);
        assert!(verify_token(&token, "other-secret").is_none());
    }

    #[test]
    fn rejects_expired_token() {
        let token = mint(42, "test-secret", -2);
        assert!(verify_token(&token, "test-secret").is_none());
    }
}
