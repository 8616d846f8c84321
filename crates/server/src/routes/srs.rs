use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::db::blunders;
use crate::error::AppError;
use crate::routes::load_owned_session;
use crate::srs;

#[derive(Deserialize)]
pub struct SrsReviewRequest {
    pub session_id: Uuid,
    pub blunder_id: i64,
    pub passed: bool,
    /// Move the user played during the review
    pub user_move: String,
    /// Centipawn loss from the best move
    pub eval_delta: i32,
}

#[derive(Serialize)]
pub struct SrsReviewResponse {
    pub blunder_id: i64,
    pub pass_streak: i32,
    pub priority: f64,
    pub next_expected_review: DateTime<Utc>,
}

/// POST /api/srs/review
///
/// A pass extends the streak, a fail resets it to zero; either way the
/// review lands in the append-only log and the schedule restarts from now.
pub async fn review_blunder(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(req): Json<SrsReviewRequest>,
) -> Result<Json<SrsReviewResponse>, AppError> {
    load_owned_session(&pool, req.session_id, user).await?;

    if req.user_move.is_empty() || req.user_move.len() > 10 {
        return Err(AppError::BadRequest(
            "user_move must be a SAN string of 1-10 characters".to_string(),
        ));
    }

    let blunder = blunders::get_for_user(&pool, user.id, req.blunder_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Blunder not found".to_string()))?;

    let reviewed_at = Utc::now();
    let pass_streak = blunders::record_review(
        &pool,
        blunder.id,
        req.session_id,
        req.passed,
        &req.user_move,
        req.eval_delta,
        reviewed_at,
    )
    .await?;

    let interval_hours = srs::expected_interval_hours(pass_streak);
    let next_expected_review =
        reviewed_at + Duration::milliseconds((interval_hours * 3_600_000.0) as i64);

    Ok(Json(SrsReviewResponse {
        blunder_id: blunder.id,
        pass_streak,
        priority: srs::calculate_priority(
            pass_streak,
            Some(reviewed_at),
            Some(blunder.created_at),
            reviewed_at,
        ),
        next_expected_review,
    }))
}
