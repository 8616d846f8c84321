//! Ghost steering: pick the opponent move that walks the game toward a
//! position this user has previously misplayed.
//!
//! The graph walk itself lives in `db::graph::ghost_candidates`; this
//! module scores the returned candidates and applies the deterministic
//! tie-break.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::graph::{self, GhostCandidateRow};
use crate::error::AppError;
use crate::srs;

/// Maximum steering distance in plies.
pub const STEERING_RADIUS: i32 = 5;
pub const SEVERITY_NORMALIZER_CP: f64 = 50.0;
pub const DISTANCE_WEIGHT_SLOPE: f64 = 0.1;

/// Traversal time limit; an overrun is treated as "no candidate".
const TRAVERSAL_TIMEOUT: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct GhostCandidate {
    pub first_move: String,
    pub blunder_id: i64,
    pub depth: i32,
    pub eval_loss_cp: i32,
    pub pass_streak: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<GhostCandidateRow> for GhostCandidate {
    fn from(row: GhostCandidateRow) -> Self {
        Self {
            first_move: row.first_move,
            blunder_id: row.blunder_id,
            depth: row.depth,
            eval_loss_cp: row.eval_loss_cp,
            pass_streak: row.pass_streak,
            last_reviewed_at: row.last_reviewed_at,
            created_at: row.created_at,
        }
    }
}

impl GhostCandidate {
    /// priority x severity x distance. Overdue, severe, nearby blunders
    /// win; a blunder with no timestamps or no recorded loss scores zero.
    pub fn score(&self, now: DateTime<Utc>) -> f64 {
        let priority = srs::calculate_priority(
            self.pass_streak,
            self.last_reviewed_at,
            self.created_at,
            now,
        );
        let severity = f64::from(self.eval_loss_cp.max(0)) / SEVERITY_NORMALIZER_CP;
        let distance = 1.0 / (1.0 + DISTANCE_WEIGHT_SLOPE * f64::from(self.depth));
        priority * severity * distance
    }
}

/// Pick the best candidate. Ties break on lower depth, then higher
/// eval_loss_cp, then lower blunder_id, then lexicographically smaller
/// first move, so every replica picks the same target.
pub fn pick_best(candidates: Vec<GhostCandidate>, now: DateTime<Utc>) -> Option<GhostCandidate> {
    let mut scored: Vec<(f64, GhostCandidate)> = candidates
        .into_iter()
        .map(|c| (c.score(now), c))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| b.eval_loss_cp.cmp(&a.eval_loss_cp))
            .then_with(|| a.blunder_id.cmp(&b.blunder_id))
            .then_with(|| a.first_move.cmp(&b.first_move))
    });

    scored.into_iter().next().map(|(_, c)| c)
}

#[derive(Debug, Clone)]
pub struct GhostMove {
    pub move_san: String,
    pub blunder_id: i64,
}

/// Search the user's graph for a reachable due blunder and return the first
/// move along the best path. Returns `None` when the current position is
/// unknown, nothing is reachable, or the traversal times out.
pub async fn find_ghost_move(
    pool: &PgPool,
    user_id: i64,
    fen: &str,
    player_color: &str,
) -> Result<Option<GhostMove>, AppError> {
    let fen_hash = chess_core::fen::fen_hash(fen)
        .map_err(|e| AppError::BadRequest(format!("Invalid FEN: {e}")))?;

    let start = match graph::find_position_by_hash(pool, user_id, &fen_hash).await? {
        Some(id) => id,
        None => return Ok(None),
    };

    let rows = match tokio::time::timeout(
        TRAVERSAL_TIMEOUT,
        graph::ghost_candidates(pool, start, user_id, player_color, STEERING_RADIUS),
    )
    .await
    {
        Ok(rows) => rows?,
        Err(_) => {
            tracing::warn!(user_id, start_position_id = start, "ghost traversal timed out");
            return Ok(None);
        }
    };

    let now = Utc::now();
    let candidates = rows.into_iter().map(GhostCandidate::from).collect();

    Ok(pick_best(candidates, now).map(|c| GhostMove {
        move_san: c.first_move,
        blunder_id: c.blunder_id,
    }))
}
