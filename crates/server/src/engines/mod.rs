//! Injected engine collaborators: the human-move model and the tactical
//! evaluator. Both are narrow capability traits so the controller can be
//! exercised with in-memory doubles.

pub mod maia;
pub mod stockfish;

use async_trait::async_trait;

use crate::error::AppError;

/// A candidate move with its human-likelihood probability.
#[derive(Debug, Clone)]
pub struct MoveCandidate {
    pub uci: String,
    pub san: String,
    pub probability: f64,
}

/// Tactical evaluation of a single candidate move.
#[derive(Debug, Clone)]
pub struct CandidateEval {
    pub uci: String,
    /// Centipawns from the mover's perspective in the pre-move position.
    pub cp_score: i32,
    /// How many centipawns worse than the best candidate in the set.
    pub cp_loss_vs_best: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Retryable: the engine is down, unreachable, or timed out.
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidRequest(String),

    /// Non-retryable: the model produced a move that is illegal here.
    #[error("model returned illegal move {0}")]
    IllegalMove(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            EngineError::InvalidRequest(msg) => AppError::BadRequest(msg),
            EngineError::IllegalMove(msg) => {
                AppError::Internal(format!("model returned illegal move {msg}"))
            }
        }
    }
}

/// Human-likelihood move model: probability-ranked candidates for a
/// position at a target strength.
#[async_trait]
pub trait MoveModel: Send + Sync {
    async fn candidates(
        &self,
        fen: &str,
        elo: i32,
        top_k: usize,
        min_prob: f64,
    ) -> Result<Vec<MoveCandidate>, EngineError>;

    fn available(&self) -> bool;
}

/// Centipawn evaluator for a set of candidate moves.
#[async_trait]
pub trait MoveEvaluator: Send + Sync {
    async fn evaluate_moves(
        &self,
        fen: &str,
        candidate_ucis: &[String],
    ) -> Result<Vec<CandidateEval>, EngineError>;

    fn available(&self) -> bool;
}
