use std::collections::HashMap;

use axum::{extract::Query, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::db::{session_moves, sessions};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Serialize, Clone)]
pub struct GameSummary {
    pub total_moves: i64,
    pub blunders: i64,
    pub mistakes: i64,
    pub inaccuracies: i64,
    pub average_centipawn_loss: i64,
}

#[derive(Serialize)]
pub struct HistoryGame {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub engine_elo: i32,
    pub player_color: String,
    pub summary: GameSummary,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub games: Vec<HistoryGame>,
}

/// GET /api/history?limit=50
///
/// Ended sessions, newest first, each with move-quality counts aggregated
/// from the session move log.
pub async fn get_history(
    Extension(pool): Extension<PgPool>,
    Query(query): Query<HistoryQuery>,
    user: AuthUser,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    let ended = sessions::list_ended(&pool, user.id, limit).await?;
    if ended.is_empty() {
        return Ok(Json(HistoryResponse { games: Vec::new() }));
    }

    let session_ids: Vec<Uuid> = ended.iter().map(|s| s.id).collect();
    let summaries = session_moves::summaries_for_sessions(&pool, &session_ids).await?;

    let by_session: HashMap<Uuid, GameSummary> = summaries
        .into_iter()
        .map(|row| {
            (
                row.session_id,
                GameSummary {
                    total_moves: row.total_moves,
                    blunders: row.blunders,
                    mistakes: row.mistakes,
                    inaccuracies: row.inaccuracies,
                    average_centipawn_loss: row
                        .avg_cp_loss
                        .map(|v| v.round() as i64)
                        .unwrap_or(0),
                },
            )
        })
        .collect();

    let empty_summary = GameSummary {
        total_moves: 0,
        blunders: 0,
        mistakes: 0,
        inaccuracies: 0,
        average_centipawn_loss: 0,
    };

    let games = ended
        .into_iter()
        .map(|session| HistoryGame {
            session_id: session.id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            result: session.result,
            engine_elo: session.engine_elo,
            player_color: session.player_color,
            summary: by_session
                .get(&session.id)
                .cloned()
                .unwrap_or_else(|| empty_summary.clone()),
        })
        .collect();

    Ok(Json(HistoryResponse { games }))
}
