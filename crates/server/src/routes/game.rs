use std::sync::Arc;

use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::config::Config;
use crate::controller;
use crate::db::sessions;
use crate::engines::maia::{MaiaEngine, MODEL_ELO_MAX, MODEL_ELO_MIN};
use crate::engines::stockfish::StockfishService;
use crate::error::AppError;
use crate::ghost;
use crate::routes::load_owned_session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    White,
    Black,
}

impl PlayerColor {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerColor::White => "white",
            PlayerColor::Black => "black",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    CheckmateWin,
    CheckmateLoss,
    Resign,
    Draw,
    Abandon,
}

impl GameResult {
    fn as_str(self) -> &'static str {
        match self {
            GameResult::CheckmateWin => "checkmate_win",
            GameResult::CheckmateLoss => "checkmate_loss",
            GameResult::Resign => "resign",
            GameResult::Draw => "draw",
            GameResult::Abandon => "abandon",
        }
    }
}

#[derive(Deserialize)]
pub struct GameStartRequest {
    pub engine_elo: i32,
    pub player_color: PlayerColor,
}

#[derive(Serialize)]
pub struct GameStartResponse {
    pub session_id: Uuid,
    pub engine_elo: i32,
    pub player_color: PlayerColor,
}

/// POST /api/game/start
pub async fn start_game(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(req): Json<GameStartRequest>,
) -> Result<Json<GameStartResponse>, AppError> {
    if !(MODEL_ELO_MIN..=MODEL_ELO_MAX).contains(&req.engine_elo) {
        return Err(AppError::BadRequest(format!(
            "Engine Elo must be between {MODEL_ELO_MIN} and {MODEL_ELO_MAX}, got {}",
            req.engine_elo
        )));
    }

    let session = sessions::create(&pool, user.id, req.engine_elo, req.player_color.as_str()).await?;
    tracing::info!(session_id = %session.id, user_id = user.id, "game session started");

    Ok(Json(GameStartResponse {
        session_id: session.id,
        engine_elo: session.engine_elo,
        player_color: req.player_color,
    }))
}

#[derive(Deserialize)]
pub struct GameEndRequest {
    pub session_id: Uuid,
    pub result: GameResult,
    pub pgn: String,
}

#[derive(Serialize)]
pub struct GameEndResponse {
    pub session_id: Uuid,
    pub result: String,
    pub ended_at: Option<DateTime<Utc>>,
}

/// POST /api/game/end
///
/// One-way transition: the session must still be active.
pub async fn end_game(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(req): Json<GameEndRequest>,
) -> Result<Json<GameEndResponse>, AppError> {
    let session = load_owned_session(&pool, req.session_id, user).await?;

    if session.status != "active" {
        return Err(AppError::BadRequest(format!(
            "Game session is already {}",
            session.status
        )));
    }

    let ended = sessions::end(&pool, session.id, req.result.as_str(), &req.pgn).await?;

    Ok(Json(GameEndResponse {
        session_id: ended.id,
        result: ended.result.unwrap_or_else(|| req.result.as_str().to_string()),
        ended_at: ended.ended_at,
    }))
}

#[derive(Deserialize)]
pub struct NextMoveRequest {
    pub session_id: Uuid,
    pub fen: String,
    /// UCI history from the game start; informational only.
    #[serde(default)]
    pub moves: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct MovePayload {
    pub uci: String,
    pub san: String,
}

#[derive(Serialize)]
pub struct NextMoveResponse {
    pub mode: &'static str,
    #[serde(rename = "move")]
    pub chosen: MovePayload,
    pub decision_source: &'static str,
    pub target_blunder_id: Option<i64>,
}

/// POST /api/game/next-opponent-move
///
/// Ghost-steer toward a stored blunder when the graph allows it, else let
/// the human-move model pick. A failure anywhere in the ghost branch falls
/// through to the engine branch instead of surfacing.
pub async fn next_opponent_move(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Config>,
    Extension(maia): Extension<Arc<MaiaEngine>>,
    Extension(stockfish): Extension<Arc<StockfishService>>,
    user: AuthUser,
    Json(req): Json<NextMoveRequest>,
) -> Result<Json<NextMoveResponse>, AppError> {
    let session = load_owned_session(&pool, req.session_id, user).await?;

    chess_core::fen::parse_position(&req.fen)
        .map_err(|e| AppError::BadRequest(format!("Invalid FEN: {e}")))?;
    let position_color = chess_core::fen::active_color(&req.fen)
        .map_err(|e| AppError::BadRequest(format!("Invalid FEN: {e}")))?;

    if position_color == session.player_color {
        return Err(AppError::BadRequest(
            "It is the player's turn; the opponent cannot move".to_string(),
        ));
    }

    if let Some(moves) = &req.moves {
        tracing::debug!(history_plies = moves.len(), "client supplied move history");
    }

    // Ghost branch: errors here are logged and never surfaced.
    let ghost_move =
        match ghost::find_ghost_move(&pool, user.id, &req.fen, &session.player_color).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("ghost lookup failed, falling through to engine: {e}");
                None
            }
        };

    if let Some(found) = ghost_move {
        match chess_core::notation::san_to_uci(&req.fen, &found.move_san) {
            Ok(uci) => {
                tracing::info!(
                    session_id = %session.id,
                    blunder_id = found.blunder_id,
                    san = %found.move_san,
                    "ghost move selected"
                );
                return Ok(Json(NextMoveResponse {
                    mode: "ghost",
                    chosen: MovePayload {
                        uci,
                        san: found.move_san,
                    },
                    decision_source: "ghost_path",
                    target_blunder_id: Some(found.blunder_id),
                }));
            }
            Err(e) => {
                // Stale graph entry for this position; the engine decides.
                tracing::warn!(
                    blunder_id = found.blunder_id,
                    san = %found.move_san,
                    "ghost move not legal here: {e}"
                );
            }
        }
    }

    let mut rng = StdRng::from_entropy();
    let chosen = controller::choose_engine_move(
        maia.as_ref(),
        stockfish.as_ref(),
        config.calibration_enabled,
        &req.fen,
        session.engine_elo,
        &mut rng,
    )
    .await?;

    Ok(Json(NextMoveResponse {
        mode: "engine",
        chosen: MovePayload {
            uci: chosen.uci,
            san: chosen.san,
        },
        decision_source: "backend_engine",
        target_blunder_id: None,
    }))
}
