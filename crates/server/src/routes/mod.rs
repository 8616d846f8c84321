pub mod blunder;
pub mod game;
pub mod health;
pub mod history;
pub mod session;
pub mod srs;

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::db::sessions::{self, GameSession};
use crate::error::AppError;

/// Fetch a session and check it belongs to the caller. Every
/// session-scoped route goes through this before touching any data.
pub(crate) async fn load_owned_session(
    pool: &PgPool,
    session_id: Uuid,
    user: AuthUser,
) -> Result<GameSession, AppError> {
    let session = sessions::get(pool, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Game session not found".to_string()))?;

    if session.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to access this game".to_string(),
        ));
    }

    Ok(session)
}
