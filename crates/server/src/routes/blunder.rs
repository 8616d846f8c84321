//! Blunder recording: replay the played game, splice every reached
//! position and edge into the user's graph, and attach the blunder to the
//! pre-move position.

use std::collections::HashMap;

use axum::{extract::Query, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use chess_core::replay::{self, ReplayError};

use crate::auth::middleware::AuthUser;
use crate::db::sessions::GameSession;
use crate::db::{blunders, graph, sessions};
use crate::error::AppError;
use crate::routes::load_owned_session;
use crate::srs;

const AUTO_RECORDING_MAX_FULL_MOVES: usize = 10;

#[derive(Deserialize)]
pub struct BlunderRequest {
    pub session_id: Uuid,
    /// Full game history in PGN format
    pub pgn: String,
    /// Position FEN before the bad move (sanity check)
    pub fen: String,
    /// SAN of the bad move
    pub user_move: String,
    /// SAN of the engine's best move
    pub best_move: String,
    /// Centipawn eval of the best move
    pub eval_before: i32,
    /// Centipawn eval after the user's move
    pub eval_after: i32,
}

#[derive(Deserialize)]
pub struct ManualBlunderRequest {
    pub session_id: Uuid,
    pub pgn: String,
    pub fen: String,
    pub user_move: String,
    pub best_move: Option<String>,
    pub eval_before: Option<i32>,
    pub eval_after: Option<i32>,
}

#[derive(Serialize)]
pub struct BlunderResponse {
    pub blunder_id: Option<i64>,
    pub position_id: i64,
    pub positions_created: i64,
    pub is_new: bool,
}

fn map_replay_error(err: ReplayError) -> AppError {
    match err {
        ReplayError::Empty => {
            AppError::Unprocessable("PGN must contain at least one move".to_string())
        }
        other => AppError::Unprocessable(format!("Invalid PGN: {other}")),
    }
}

/// Shared path of the auto and manual recorders. Validates everything
/// before the first write, then commits all graph work in one transaction.
async fn record_target(
    pool: &PgPool,
    session: &GameSession,
    user: AuthUser,
    pgn: &str,
    claimed_fen: &str,
    user_move: &str,
    best_move: &str,
    eval_loss: i32,
    mark_first_blunder_recorded: bool,
    max_full_moves: Option<usize>,
) -> Result<BlunderResponse, AppError> {
    let replayed = replay::replay_pgn(pgn).map_err(map_replay_error)?;

    if let Some(max) = max_full_moves {
        if replayed.full_moves() > max {
            return Err(AppError::BadRequest(format!(
                "Automatic blunder recording is limited to the first {max} full moves"
            )));
        }
    }

    let claimed_normalized = chess_core::fen::normalize_fen(claimed_fen)
        .map_err(|e| AppError::BadRequest(format!("Invalid FEN: {e}")))?;

    let pre_move = replayed.pre_move_position();
    let replayed_normalized = chess_core::fen::normalize_fen(&pre_move.fen)
        .map_err(|e| AppError::Internal(format!("replayed FEN failed to normalize: {e}")))?;

    if replayed_normalized != claimed_normalized {
        return Err(AppError::Unprocessable(
            "Pre-move FEN mismatch: position does not match PGN".to_string(),
        ));
    }

    if pre_move.active_color != session.player_color {
        return Err(AppError::BadRequest(format!(
            "Cannot record blunder: position is {} to move but player is {}",
            pre_move.active_color, session.player_color
        )));
    }

    let pre_move_hash = pre_move.hash.clone();

    let mut tx = pool.begin().await?;

    let mut hash_to_id: HashMap<&str, i64> = HashMap::new();
    let mut positions_created: i64 = 0;

    for position in &replayed.positions {
        if hash_to_id.contains_key(position.hash.as_str()) {
            continue;
        }
        let (id, created) = graph::upsert_position(
            &mut *tx,
            user.id,
            &position.hash,
            &position.fen,
            position.active_color,
        )
        .await?;
        hash_to_id.insert(position.hash.as_str(), id);
        if created {
            positions_created += 1;
        }
    }

    for edge in &replayed.edges {
        let from_id = *hash_to_id
            .get(edge.from_hash.as_str())
            .ok_or_else(|| AppError::Internal("edge references unknown position".to_string()))?;
        let to_id = *hash_to_id
            .get(edge.to_hash.as_str())
            .ok_or_else(|| AppError::Internal("edge references unknown position".to_string()))?;
        graph::upsert_edge(&mut *tx, from_id, &edge.move_san, to_id).await?;
    }

    let pre_move_position_id = *hash_to_id
        .get(pre_move_hash.as_str())
        .ok_or_else(|| AppError::Internal("pre-move position missing from replay".to_string()))?;

    let (blunder_id, is_new) = blunders::upsert(
        &mut *tx,
        user.id,
        pre_move_position_id,
        user_move,
        best_move,
        eval_loss,
    )
    .await?;

    if mark_first_blunder_recorded {
        sessions::mark_blunder_recorded(&mut *tx, session.id).await?;
    }

    tx.commit().await?;

    tracing::info!(
        user_id = user.id,
        blunder_id,
        position_id = pre_move_position_id,
        positions_created,
        is_new,
        "blunder recorded"
    );

    Ok(BlunderResponse {
        blunder_id: Some(blunder_id),
        position_id: pre_move_position_id,
        positions_created,
        is_new,
    })
}

/// POST /api/blunder
///
/// Records the first flagged mistake of a session. The recorded flag is
/// sticky, so a second call on the same session is a no-op.
pub async fn record_blunder(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(req): Json<BlunderRequest>,
) -> Result<Json<BlunderResponse>, AppError> {
    let session = load_owned_session(&pool, req.session_id, user).await?;

    if session.status != "active" {
        return Err(AppError::BadRequest(format!(
            "Game session is already {}",
            session.status
        )));
    }

    if session.blunder_recorded {
        return Ok(Json(BlunderResponse {
            blunder_id: None,
            position_id: 0,
            positions_created: 0,
            is_new: false,
        }));
    }

    let response = record_target(
        &pool,
        &session,
        user,
        &req.pgn,
        &req.fen,
        &req.user_move,
        &req.best_move,
        req.eval_before - req.eval_after,
        true,
        Some(AUTO_RECORDING_MAX_FULL_MOVES),
    )
    .await?;

    Ok(Json(response))
}

/// POST /api/blunder/manual
///
/// Adds a user-chosen move to the library. Works on ended sessions, never
/// touches the first-blunder flag, and tolerates missing evals.
pub async fn record_manual_blunder(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(req): Json<ManualBlunderRequest>,
) -> Result<Json<BlunderResponse>, AppError> {
    let session = load_owned_session(&pool, req.session_id, user).await?;

    let best_move = req.best_move.as_deref().unwrap_or(&req.user_move);
    let eval_before = req.eval_before.unwrap_or(0);
    let eval_after = req.eval_after.unwrap_or(eval_before);

    let response = record_target(
        &pool,
        &session,
        user,
        &req.pgn,
        &req.fen,
        &req.user_move,
        best_move,
        eval_before - eval_after,
        false,
        None,
    )
    .await?;

    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct BlunderListQuery {
    #[serde(default)]
    pub due: Option<bool>,
}

#[derive(Serialize)]
pub struct BlunderListItem {
    pub id: i64,
    pub fen: String,
    pub bad_move: String,
    pub best_move: String,
    pub eval_loss_cp: i32,
    pub pass_streak: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub srs_priority: f64,
}

/// GET /api/blunder?due=true
///
/// The user's blunder library, sorted by descending review priority.
pub async fn list_blunders(
    Extension(pool): Extension<PgPool>,
    Query(query): Query<BlunderListQuery>,
    user: AuthUser,
) -> Result<Json<Vec<BlunderListItem>>, AppError> {
    let rows = blunders::list_with_positions(&pool, user.id).await?;
    let now = Utc::now();

    let mut items: Vec<BlunderListItem> = rows
        .into_iter()
        .map(|row| {
            let srs_priority = srs::calculate_priority(
                row.pass_streak,
                row.last_reviewed_at,
                Some(row.created_at),
                now,
            );
            BlunderListItem {
                id: row.id,
                fen: row.fen_raw,
                bad_move: row.bad_move_san,
                best_move: row.best_move_san,
                eval_loss_cp: row.eval_loss_cp,
                pass_streak: row.pass_streak,
                last_reviewed_at: row.last_reviewed_at,
                created_at: row.created_at,
                srs_priority,
            }
        })
        .collect();

    if query.due == Some(true) {
        items.retain(|item| item.srs_priority > 1.0);
    }

    items.sort_by(|a, b| {
        b.srs_priority
            .partial_cmp(&a.srs_priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Json(items))
}
