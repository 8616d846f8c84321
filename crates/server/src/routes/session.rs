use std::collections::HashSet;

use axum::{extract::Path, Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::db::session_moves::{self, SessionMoveInsert};
use crate::error::AppError;
use crate::routes::game::PlayerColor;
use crate::routes::load_owned_session;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveClassification {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveClassification {
    fn as_str(self) -> &'static str {
        match self {
            MoveClassification::Best => "best",
            MoveClassification::Excellent => "excellent",
            MoveClassification::Good => "good",
            MoveClassification::Inaccuracy => "inaccuracy",
            MoveClassification::Mistake => "mistake",
            MoveClassification::Blunder => "blunder",
        }
    }
}

#[derive(Deserialize)]
pub struct SessionMoveInput {
    pub move_number: i32,
    pub color: PlayerColor,
    pub move_san: String,
    pub fen_after: String,
    pub eval_cp: Option<i32>,
    pub eval_mate: Option<i32>,
    pub best_move_san: Option<String>,
    pub best_move_eval_cp: Option<i32>,
    pub eval_delta: Option<i32>,
    pub classification: Option<MoveClassification>,
}

#[derive(Deserialize)]
pub struct SessionMovesRequest {
    #[serde(default)]
    pub moves: Vec<SessionMoveInput>,
}

#[derive(Serialize)]
pub struct SessionMovesResponse {
    pub moves_inserted: usize,
}

/// POST /api/session/{session_id}/moves
///
/// Bulk upsert of the per-move eval log the client accumulates during a
/// game; re-submitting a (move_number, color) pair updates it in place.
pub async fn upsert_session_moves(
    Extension(pool): Extension<PgPool>,
    Path(session_id): Path<Uuid>,
    user: AuthUser,
    Json(req): Json<SessionMovesRequest>,
) -> Result<Json<SessionMovesResponse>, AppError> {
    load_owned_session(&pool, session_id, user).await?;

    let mut seen: HashSet<(i32, &'static str)> = HashSet::new();
    for entry in &req.moves {
        if entry.move_number < 1 {
            return Err(AppError::Unprocessable(
                "move_number must be at least 1".to_string(),
            ));
        }
        if entry.move_san.is_empty() || entry.move_san.len() > 10 {
            return Err(AppError::Unprocessable(
                "move_san must be a SAN string of 1-10 characters".to_string(),
            ));
        }
        if !seen.insert((entry.move_number, entry.color.as_str())) {
            return Err(AppError::Unprocessable(format!(
                "Duplicate move entry in payload for move_number={}, color={}",
                entry.move_number,
                entry.color.as_str()
            )));
        }
    }

    if req.moves.is_empty() {
        return Ok(Json(SessionMovesResponse { moves_inserted: 0 }));
    }

    let rows: Vec<SessionMoveInsert> = req
        .moves
        .iter()
        .map(|entry| SessionMoveInsert {
            move_number: entry.move_number,
            color: entry.color.as_str().to_string(),
            move_san: entry.move_san.clone(),
            fen_after: entry.fen_after.clone(),
            eval_cp: entry.eval_cp,
            eval_mate: entry.eval_mate,
            best_move_san: entry.best_move_san.clone(),
            best_move_eval_cp: entry.best_move_eval_cp,
            eval_delta: entry.eval_delta,
            classification: entry.classification.map(|c| c.as_str().to_string()),
        })
        .collect();

    let moves_inserted = session_moves::upsert_batch(&pool, session_id, &rows).await?;

    Ok(Json(SessionMovesResponse { moves_inserted }))
}
