//! Opponent move selection for the engine branch.
//!
//! Three sub-modes, picked by config and target strength:
//!   - calibration off: the model's single most likely move
//!   - at or above the model's Elo floor: a probability-weighted sample
//!   - below the floor: candidates fetched at the floor, fitted to a
//!     sampled centipawn-loss target, penalized for inhuman choices
//!
//! The evaluator being down never fails the request; selection degrades
//! to weighted sampling.

use std::collections::HashMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::engines::maia::{DEFAULT_MIN_PROB, DEFAULT_TOP_K, MAIA_ELO_FLOOR};
use crate::engines::{CandidateEval, EngineError, MoveCandidate, MoveEvaluator, MoveModel};
use crate::loss_model;

pub const HUMAN_PENALTY_WEIGHT: f64 = 15.0;
/// Floor inside the log penalty so near-zero probabilities stay finite.
const PROBABILITY_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceMethod {
    Argmax,
    Sampled,
    Calibrated,
}

#[derive(Debug, Clone)]
pub struct EngineChoice {
    pub uci: String,
    pub san: String,
    pub method: ChoiceMethod,
}

fn choice(candidate: &MoveCandidate, method: ChoiceMethod) -> EngineChoice {
    EngineChoice {
        uci: candidate.uci.clone(),
        san: candidate.san.clone(),
        method,
    }
}

pub async fn choose_engine_move<R: Rng>(
    model: &dyn MoveModel,
    evaluator: &dyn MoveEvaluator,
    calibration_enabled: bool,
    fen: &str,
    engine_elo: i32,
    rng: &mut R,
) -> Result<EngineChoice, EngineError> {
    if !calibration_enabled {
        let candidates = model.candidates(fen, engine_elo, 1, DEFAULT_MIN_PROB).await?;
        let top = candidates.first().ok_or_else(|| {
            EngineError::Unavailable("model returned no candidates".to_string())
        })?;
        return Ok(choice(top, ChoiceMethod::Argmax));
    }

    if engine_elo >= MAIA_ELO_FLOOR {
        let candidates = model
            .candidates(fen, engine_elo, DEFAULT_TOP_K, DEFAULT_MIN_PROB)
            .await?;
        let picked = weighted_sample(&candidates, rng)?;
        return Ok(choice(picked, ChoiceMethod::Sampled));
    }

    // Sub-floor strength: the model has no resolution down here, so fetch
    // candidates at the floor and pick the one whose centipawn loss best
    // matches a sampled target for this Elo.
    let candidates = model
        .candidates(fen, MAIA_ELO_FLOOR, DEFAULT_TOP_K, DEFAULT_MIN_PROB)
        .await?;
    let ucis: Vec<String> = candidates.iter().map(|c| c.uci.clone()).collect();

    let evals = match evaluator.evaluate_moves(fen, &ucis).await {
        Ok(evals) => evals,
        Err(e) => {
            tracing::warn!("tactical evaluator unavailable, falling back to sampling: {e}");
            let picked = weighted_sample(&candidates, rng)?;
            return Ok(choice(picked, ChoiceMethod::Sampled));
        }
    };

    let target = loss_model::sample_target_loss(engine_elo, rng);
    match pick_calibrated(&candidates, &evals, target) {
        Some(picked) => Ok(choice(picked, ChoiceMethod::Calibrated)),
        None => {
            let picked = weighted_sample(&candidates, rng)?;
            Ok(choice(picked, ChoiceMethod::Sampled))
        }
    }
}

/// Lowest `|loss - target| + w * (-ln p)` wins: fit the sampled loss while
/// staying on moves a human would actually play.
fn pick_calibrated<'a>(
    candidates: &'a [MoveCandidate],
    evals: &[CandidateEval],
    target_loss: f64,
) -> Option<&'a MoveCandidate> {
    let loss_by_uci: HashMap<&str, i32> = evals
        .iter()
        .map(|e| (e.uci.as_str(), e.cp_loss_vs_best))
        .collect();

    let mut best: Option<(f64, &MoveCandidate)> = None;
    for candidate in candidates {
        let Some(&loss) = loss_by_uci.get(candidate.uci.as_str()) else {
            continue;
        };

        let loss_fit = (f64::from(loss) - target_loss).abs();
        let human_penalty =
            HUMAN_PENALTY_WEIGHT * -(candidate.probability.max(PROBABILITY_FLOOR)).ln();
        let score = loss_fit + human_penalty;

        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, c)| c)
}

fn weighted_sample<'a, R: Rng>(
    candidates: &'a [MoveCandidate],
    rng: &mut R,
) -> Result<&'a MoveCandidate, EngineError> {
    if candidates.is_empty() {
        return Err(EngineError::Unavailable(
            "model returned no candidates".to_string(),
        ));
    }

    match WeightedIndex::new(candidates.iter().map(|c| c.probability.max(0.0))) {
        Ok(dist) => Ok(&candidates[dist.sample(rng)]),
        // Degenerate weights (all zero); fall back to the top move.
        Err(_) => Ok(&candidates[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const SICILIAN_FEN: &str = "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2";

    fn mock_candidates() -> Vec<MoveCandidate> {
        [
            ("g1f3", "Nf3", 0.35),
            ("b1c3", "Nc3", 0.22),
            ("d2d4", "d4", 0.18),
            ("f1c4", "Bc4", 0.08),
            ("f2f4", "f4", 0.05),
            ("d1h5", "Qh5", 0.03),
            ("g2g3", "g3", 0.02),
            ("a2a3", "a3", 0.015),
        ]
        .iter()
        .map(|(uci, san, p)| MoveCandidate {
            uci: uci.to_string(),
            san: san.to_string(),
            probability: *p,
        })
        .collect()
    }

    fn mock_evals() -> Vec<CandidateEval> {
        [
            ("g1f3", 50, 0),
            ("b1c3", 43, 7),
            ("d2d4", 26, 24),
            ("f1c4", 39, 11),
            ("f2f4", -2, 52),
            ("d1h5", -51, 101),
            ("g2g3", -6, 56),
            ("a2a3", -18, 68),
        ]
        .iter()
        .map(|(uci, cp, loss)| CandidateEval {
            uci: uci.to_string(),
            cp_score: *cp,
            cp_loss_vs_best: *loss,
        })
        .collect()
    }

    struct StubModel {
        candidates: Vec<MoveCandidate>,
    }

    #[async_trait]
    impl MoveModel for StubModel {
        async fn candidates(
            &self,
            _fen: &str,
            _elo: i32,
            top_k: usize,
            _min_prob: f64,
        ) -> Result<Vec<MoveCandidate>, EngineError> {
            Ok(self.candidates.iter().take(top_k).cloned().collect())
        }

        fn available(&self) -> bool {
            true
        }
    }

    struct DownModel;

    #[async_trait]
    impl MoveModel for DownModel {
        async fn candidates(
            &self,
            _fen: &str,
            _elo: i32,
            _top_k: usize,
            _min_prob: f64,
        ) -> Result<Vec<MoveCandidate>, EngineError> {
            Err(EngineError::Unavailable("model offline".to_string()))
        }

        fn available(&self) -> bool {
            false
        }
    }

    struct StubEvaluator {
        evals: Option<Vec<CandidateEval>>,
    }

    #[async_trait]
    impl MoveEvaluator for StubEvaluator {
        async fn evaluate_moves(
            &self,
            _fen: &str,
            _candidate_ucis: &[String],
        ) -> Result<Vec<CandidateEval>, EngineError> {
            self.evals
                .clone()
                .ok_or_else(|| EngineError::Unavailable("stockfish not found".to_string()))
        }

        fn available(&self) -> bool {
            self.evals.is_some()
        }
    }

    #[tokio::test]
    async fn calibration_off_uses_argmax() {
        let model = StubModel { candidates: mock_candidates() };
        let evaluator = StubEvaluator { evals: Some(mock_evals()) };
        let mut rng = StdRng::seed_from_u64(1);

        let result = choose_engine_move(&model, &evaluator, false, SICILIAN_FEN, 800, &mut rng)
            .await
            .unwrap();
        assert_eq!(result.method, ChoiceMethod::Argmax);
        assert_eq!(result.uci, "g1f3");

        let result = choose_engine_move(&model, &evaluator, false, SICILIAN_FEN, 1500, &mut rng)
            .await
            .unwrap();
        assert_eq!(result.method, ChoiceMethod::Argmax);
    }

    #[tokio::test]
    async fn high_elo_samples_from_candidates() {
        let model = StubModel { candidates: mock_candidates() };
        let evaluator = StubEvaluator { evals: Some(mock_evals()) };
        let mut rng = StdRng::seed_from_u64(2);
        let all_ucis: HashSet<String> =
            mock_candidates().iter().map(|c| c.uci.clone()).collect();

        let mut seen = HashSet::new();
        for _ in 0..100 {
            let result =
                choose_engine_move(&model, &evaluator, true, SICILIAN_FEN, 1500, &mut rng)
                    .await
                    .unwrap();
            assert_eq!(result.method, ChoiceMethod::Sampled);
            assert!(all_ucis.contains(&result.uci));
            seen.insert(result.uci);
        }
        // Weighted sampling over 8 candidates should show variety.
        assert!(seen.len() >= 3);
    }

    #[tokio::test]
    async fn exact_floor_elo_uses_sampling() {
        let model = StubModel { candidates: mock_candidates() };
        let evaluator = StubEvaluator { evals: Some(mock_evals()) };
        let mut rng = StdRng::seed_from_u64(3);

        let result =
            choose_engine_move(&model, &evaluator, true, SICILIAN_FEN, MAIA_ELO_FLOOR, &mut rng)
                .await
                .unwrap();
        assert_eq!(result.method, ChoiceMethod::Sampled);
    }

    #[tokio::test]
    async fn low_elo_uses_calibrated_selection() {
        let model = StubModel { candidates: mock_candidates() };
        let evaluator = StubEvaluator { evals: Some(mock_evals()) };
        let mut rng = StdRng::seed_from_u64(4);

        let result = choose_engine_move(&model, &evaluator, true, SICILIAN_FEN, 800, &mut rng)
            .await
            .unwrap();
        assert_eq!(result.method, ChoiceMethod::Calibrated);
    }

    #[tokio::test]
    async fn evaluator_failure_falls_back_to_sampling() {
        let model = StubModel { candidates: mock_candidates() };
        let evaluator = StubEvaluator { evals: None };
        let mut rng = StdRng::seed_from_u64(5);

        let result = choose_engine_move(&model, &evaluator, true, SICILIAN_FEN, 800, &mut rng)
            .await
            .unwrap();
        assert_eq!(result.method, ChoiceMethod::Sampled);
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let evaluator = StubEvaluator { evals: Some(mock_evals()) };
        let mut rng = StdRng::seed_from_u64(6);

        let err = choose_engine_move(&DownModel, &evaluator, true, SICILIAN_FEN, 800, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[test]
    fn zero_target_picks_the_best_fitting_likely_move() {
        let candidates = mock_candidates();
        let evals = mock_evals();
        // Nf3: perfect loss fit and the highest probability.
        let picked = pick_calibrated(&candidates, &evals, 0.0).unwrap();
        assert_eq!(picked.uci, "g1f3");
    }

    #[test]
    fn high_target_prefers_a_weaker_move() {
        let candidates = mock_candidates();
        let evals = mock_evals();
        // target 100: Qh5 (loss 101) fits almost exactly and wins despite
        // its low probability.
        let picked = pick_calibrated(&candidates, &evals, 100.0).unwrap();
        assert_eq!(picked.uci, "d1h5");
        assert_ne!(picked.uci, "g1f3");
    }

    #[test]
    fn human_penalty_weighs_against_alien_moves() {
        let candidates = vec![
            MoveCandidate { uci: "g1f3".into(), san: "Nf3".into(), probability: 0.30 },
            MoveCandidate { uci: "a2a3".into(), san: "a3".into(), probability: 0.005 },
        ];
        let evals = vec![
            CandidateEval { uci: "g1f3".into(), cp_score: 50, cp_loss_vs_best: 0 },
            CandidateEval { uci: "a2a3".into(), cp_score: -50, cp_loss_vs_best: 100 },
        ];

        // Nf3: |0-100| + 15*(-ln 0.30) ~= 118.1
        // a3:  |100-100| + 15*(-ln 0.005) ~= 79.5 -> the perfect fit still
        // wins when the alternative's fit is this bad.
        let picked = pick_calibrated(&candidates, &evals, 100.0).unwrap();
        assert_eq!(picked.uci, "a2a3");

        // With a smaller gap in fit the penalty dominates.
        let evals = vec![
            CandidateEval { uci: "g1f3".into(), cp_score: 50, cp_loss_vs_best: 60 },
            CandidateEval { uci: "a2a3".into(), cp_score: -50, cp_loss_vs_best: 100 },
        ];
        let picked = pick_calibrated(&candidates, &evals, 100.0).unwrap();
        assert_eq!(picked.uci, "g1f3");
    }

    #[test]
    fn weighted_sample_respects_weights() {
        let candidates = vec![
            MoveCandidate { uci: "g1f3".into(), san: "Nf3".into(), probability: 0.90 },
            MoveCandidate { uci: "a2a3".into(), san: "a3".into(), probability: 0.10 },
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..1000 {
            let picked = weighted_sample(&candidates, &mut rng).unwrap();
            *counts.entry(picked.uci.clone()).or_default() += 1;
        }
        assert!(counts["g1f3"] > 700);
    }

    #[test]
    fn empty_candidate_set_is_an_error() {
        let mut rng = StdRng::seed_from_u64(8);
        assert!(weighted_sample(&[], &mut rng).is_err());
    }
}
