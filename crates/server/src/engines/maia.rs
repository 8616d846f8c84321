//! Maia-2 human-likelihood model client.
//!
//! Inference runs in a sidecar process holding the model weights; this
//! client is process-wide and lazily verifies the sidecar exactly once.
//! Concurrent first requests await the same probe, and a failed probe is
//! sticky: later callers see the same error without retrying the load.

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::engines::{EngineError, MoveCandidate, MoveModel};

/// Maia-2 uses discrete Elo bins. Everything below this floor maps to the
/// same "under 1100" bucket, producing identical move distributions, so
/// requests are clamped here and the controller handles sub-floor play
/// by calibration instead.
pub const MAIA_ELO_FLOOR: i32 = 1100;

pub const MODEL_ELO_MIN: i32 = 500;
pub const MODEL_ELO_MAX: i32 = 2200;

pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_MIN_PROB: f64 = 0.01;

#[derive(Debug, Deserialize)]
struct RawCandidate {
    uci: String,
    prob: f64,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

pub struct MaiaEngine {
    client: reqwest::Client,
    base_url: String,
    ready: OnceCell<Result<(), String>>,
}

impl MaiaEngine {
    pub fn new(base_url: &str, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ready: OnceCell::new(),
        }
    }

    /// Load/verify the model ahead of the first request. Called from
    /// startup when configured; never runs implicitly at construction.
    pub async fn warmup(&self) -> Result<(), EngineError> {
        self.ensure_ready().await
    }

    async fn ensure_ready(&self) -> Result<(), EngineError> {
        let state = self
            .ready
            .get_or_init(|| async {
                match self.probe_sidecar().await {
                    Ok(()) => {
                        tracing::info!(base_url = %self.base_url, "human-move model ready");
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!("human-move model initialization failed: {e}");
                        Err(e)
                    }
                }
            })
            .await;

        state.clone().map_err(EngineError::Unavailable)
    }

    async fn probe_sidecar(&self) -> Result<(), String> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("model sidecar unreachable: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("model sidecar returned HTTP {}", resp.status()));
        }

        let health: HealthResponse = resp
            .json()
            .await
            .map_err(|e| format!("bad model health payload: {e}"))?;

        if health.status == "ok" {
            Ok(())
        } else {
            Err(format!("model sidecar not ready: status={}", health.status))
        }
    }

    async fn fetch_candidates(
        &self,
        fen: &str,
        elo: i32,
    ) -> Result<Vec<RawCandidate>, EngineError> {
        let url = format!("{}/candidates", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "fen": fen, "elo": elo }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Unavailable("model inference timed out".to_string())
                } else {
                    EngineError::Unavailable(format!("model request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(EngineError::Unavailable(format!(
                "model returned HTTP {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| EngineError::Unavailable(format!("bad model payload: {e}")))
    }
}

/// Probability-descending top-k filter. Always keeps at least the single
/// most likely move, even when it falls below the threshold.
fn select_candidates(
    mut raw: Vec<(String, f64)>,
    top_k: usize,
    min_prob: f64,
) -> Vec<(String, f64)> {
    raw.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let kept: Vec<(String, f64)> = raw
        .iter()
        .take(top_k)
        .filter(|(_, prob)| *prob >= min_prob)
        .cloned()
        .collect();

    if kept.is_empty() {
        raw.into_iter().take(1).collect()
    } else {
        kept
    }
}

#[async_trait]
impl MoveModel for MaiaEngine {
    async fn candidates(
        &self,
        fen: &str,
        elo: i32,
        top_k: usize,
        min_prob: f64,
    ) -> Result<Vec<MoveCandidate>, EngineError> {
        if !(MODEL_ELO_MIN..=MODEL_ELO_MAX).contains(&elo) {
            return Err(EngineError::InvalidRequest(format!(
                "Elo must be between {MODEL_ELO_MIN} and {MODEL_ELO_MAX}, got {elo}"
            )));
        }

        self.ensure_ready().await?;

        let effective_elo = elo.max(MAIA_ELO_FLOOR);
        let raw = self.fetch_candidates(fen, effective_elo).await?;
        if raw.is_empty() {
            return Err(EngineError::Unavailable(format!(
                "model returned no moves for position {fen}"
            )));
        }

        let selected = select_candidates(
            raw.into_iter().map(|c| (c.uci, c.prob)).collect(),
            top_k,
            min_prob,
        );

        tracing::debug!(
            elo,
            effective_elo,
            count = selected.len(),
            "model candidates selected"
        );

        selected
            .into_iter()
            .map(|(uci, probability)| {
                let san = chess_core::notation::uci_to_san(fen, &uci)
                    .map_err(|_| EngineError::IllegalMove(uci.clone()))?;
                Ok(MoveCandidate {
                    uci,
                    san,
                    probability,
                })
            })
            .collect()
    }

    fn available(&self) -> bool {
        // Unknown until the first probe; only a cached failure is definitive.
        !matches!(self.ready.get(), Some(Err(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(u, p)| (u.to_string(), *p)).collect()
    }

    #[test]
    fn keeps_top_k_above_threshold() {
        let selected = select_candidates(
            raw(&[("g1f3", 0.35), ("b1c3", 0.22), ("d2d4", 0.18), ("a2a3", 0.005)]),
            8,
            0.01,
        );
        let ucis: Vec<&str> = selected.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(ucis, vec!["g1f3", "b1c3", "d2d4"]);
    }

    #[test]
    fn truncates_to_top_k() {
        let selected = select_candidates(
            raw(&[("a", 0.4), ("b", 0.3), ("c", 0.2), ("d", 0.1)]),
            2,
            0.01,
        );
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].0, "a");
    }

    #[test]
    fn sorts_descending_by_probability() {
        let selected = select_candidates(raw(&[("low", 0.1), ("high", 0.6), ("mid", 0.3)]), 8, 0.01);
        let probs: Vec<f64> = selected.iter().map(|(_, p)| *p).collect();
        assert!(probs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn always_keeps_the_best_move() {
        // Everything below the threshold: still return the single best.
        let selected = select_candidates(raw(&[("a", 0.004), ("b", 0.009)]), 8, 0.01);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "b");
    }

    #[tokio::test]
    async fn rejects_out_of_range_elo() {
        let engine = MaiaEngine::new("http://127.0.0.1:1", 100);
        let err = engine
            .candidates("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 300, 8, 0.01)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn init_failure_is_sticky() {
        // Nothing listens on port 1, so the first probe fails; the second
        // call must see the same cached failure.
        let engine = MaiaEngine::new("http://127.0.0.1:1", 100);
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

        let first = engine.candidates(fen, 1200, 8, 0.01).await.unwrap_err();
        assert!(matches!(first, EngineError::Unavailable(_)));
        assert!(!engine.available());

        let second = engine.candidates(fen, 1200, 8, 0.01).await.unwrap_err();
        assert!(matches!(second, EngineError::Unavailable(_)));
    }
}
