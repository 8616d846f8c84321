use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::jwt;
use crate::config::Config;
use crate::error::AppError;

/// Authenticated user extracted from the Authorization header.
///
/// Identity is owned by the external auth service that signs the token;
/// everything here is scoped by the `user_id` claim alone.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or(AppError::Internal("Missing config".into()))?
            .clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = jwt::verify_token(token, &config.jwt_secret)
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: claims.user_id,
        })
    }
}
