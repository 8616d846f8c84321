//! Server-side Stockfish evaluation over the UCI protocol.
//!
//! A single subprocess is shared process-wide; access is serialized behind
//! a mutex. A failed evaluation drops the subprocess and the next call
//! respawns it.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use async_trait::async_trait;
use shakmaty::{fen::Fen, uci::UciMove, Chess, EnPassantMode, Position};
use tracing::debug;

use crate::engines::{CandidateEval, EngineError, MoveEvaluator};

/// Large centipawn value used when the engine reports mate.
/// Mate-in-1 = 10000, mate-in-2 = 9999, and so on.
pub const MATE_CP_BASE: i32 = 10000;

#[derive(Debug, Clone, Copy)]
struct RawEval {
    cp: Option<i32>,
    mate: Option<i32>,
}

/// One UCI engine subprocess.
struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    fn new(path: &str) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("no stdin pipe to Stockfish".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| EngineError::Unavailable("no stdout pipe from Stockfish".to_string()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        engine.send("uci")?;
        engine.wait_for("uciok")?;

        engine.send("setoption name Threads value 1")?;
        engine.send("setoption name Hash value 64")?;
        engine.send("isready")?;
        engine.wait_for("readyok")?;

        Ok(engine)
    }

    fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        writeln!(self.stdin, "{cmd}")
            .map_err(|e| EngineError::Unavailable(format!("failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .map_err(|e| EngineError::Unavailable(format!("failed to flush stdin: {e}")))?;
        Ok(())
    }

    fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.stdout.read_line(&mut line).map_err(|e| {
                EngineError::Unavailable(format!("failed to read from Stockfish: {e}"))
            })?;
            if n == 0 {
                return Err(EngineError::Unavailable("Stockfish closed its pipe".to_string()));
            }
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Evaluate a position to a fixed depth; the score is from the side
    /// to move's perspective.
    fn evaluate(&mut self, fen: &str, depth: u32) -> Result<RawEval, EngineError> {
        self.send(&format!("position fen {fen}"))?;
        self.send(&format!("go depth {depth}"))?;

        let mut result = RawEval { cp: None, mate: None };

        let mut line = String::new();
        loop {
            line.clear();
            let n = self.stdout.read_line(&mut line).map_err(|e| {
                EngineError::Unavailable(format!("failed to read from Stockfish: {e}"))
            })?;
            if n == 0 {
                return Err(EngineError::Unavailable("Stockfish closed its pipe".to_string()));
            }
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" score ") {
                if let Some(cp) = parse_cp(trimmed) {
                    result.cp = Some(cp);
                    result.mate = None;
                }
                if let Some(mate) = parse_mate(trimmed) {
                    result.mate = Some(mate);
                    result.cp = None;
                }
            } else if trimmed.starts_with("bestmove") {
                break;
            }
        }

        Ok(result)
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        let _ = self.send("quit");
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Serialized process-wide evaluator.
pub struct StockfishService {
    path: String,
    depth: u32,
    slot: Mutex<Option<StockfishEngine>>,
}

impl StockfishService {
    pub fn new(path: &str, depth: u32) -> Self {
        Self {
            path: path.to_string(),
            depth,
            slot: Mutex::new(None),
        }
    }

    fn eval_with_engine(
        &self,
        slot: &mut Option<StockfishEngine>,
        fen: &str,
    ) -> Result<RawEval, EngineError> {
        let engine = match slot {
            Some(engine) => engine,
            None => slot.insert(StockfishEngine::new(&self.path)?),
        };
        engine.evaluate(fen, self.depth)
    }

    /// Evaluate each candidate by playing it and scoring the resulting
    /// position, negated back to the mover's perspective. Terminal
    /// positions are scored directly: checkmate = MATE_CP_BASE, stalemate
    /// and insufficient material = 0.
    fn evaluate_blocking(
        &self,
        fen: &str,
        candidate_ucis: &[String],
    ) -> Result<Vec<CandidateEval>, EngineError> {
        if candidate_ucis.is_empty() {
            return Ok(Vec::new());
        }

        let pos: Chess = chess_core::fen::parse_position(fen)
            .map_err(|e| EngineError::InvalidRequest(format!("invalid FEN: {e}")))?;

        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut scored: Vec<(String, i32)> = Vec::with_capacity(candidate_ucis.len());

        for uci in candidate_ucis {
            let parsed: UciMove = uci
                .parse()
                .map_err(|_| EngineError::IllegalMove(uci.clone()))?;
            let mv = parsed
                .to_move(&pos)
                .map_err(|_| EngineError::IllegalMove(uci.clone()))?;

            let mut after = pos.clone();
            after.play_unchecked(mv);

            if after.is_checkmate() {
                scored.push((uci.clone(), MATE_CP_BASE));
                continue;
            }
            if after.is_stalemate() || after.is_insufficient_material() {
                scored.push((uci.clone(), 0));
                continue;
            }

            let after_fen = Fen::from_position(&after, EnPassantMode::Legal).to_string();
            let cp = match self.eval_with_engine(&mut slot, &after_fen) {
                Ok(raw) => eval_to_cp(raw),
                Err(e) => {
                    // Drop the worker so the next call respawns it, and
                    // deprioritize this candidate rather than failing.
                    tracing::warn!("Stockfish eval failed for {uci}: {e}");
                    *slot = None;
                    -MATE_CP_BASE
                }
            };
            scored.push((uci.clone(), cp));
        }

        let best_cp = scored.iter().map(|(_, cp)| *cp).max().unwrap_or(0);
        Ok(scored
            .into_iter()
            .map(|(uci, cp)| CandidateEval {
                uci,
                cp_score: cp,
                cp_loss_vs_best: best_cp - cp,
            })
            .collect())
    }
}

#[async_trait]
impl MoveEvaluator for StockfishService {
    async fn evaluate_moves(
        &self,
        fen: &str,
        candidate_ucis: &[String],
    ) -> Result<Vec<CandidateEval>, EngineError> {
        tokio::task::block_in_place(|| self.evaluate_blocking(fen, candidate_ucis))
    }

    fn available(&self) -> bool {
        Path::new(&self.path).is_file()
    }
}

/// Convert the engine's post-move evaluation to centipawns from the
/// mover's perspective. After pushing a candidate the engine scores the
/// position for the opponent, so both cp and mate flip sign.
fn eval_to_cp(raw: RawEval) -> i32 {
    if let Some(mate) = raw.mate {
        return -mate_to_cp(mate);
    }
    -raw.cp.unwrap_or(0)
}

/// Mate-in-N to a large centipawn value preserving sign.
fn mate_to_cp(mate_in: i32) -> i32 {
    match mate_in.cmp(&0) {
        std::cmp::Ordering::Greater => MATE_CP_BASE - (mate_in - 1),
        std::cmp::Ordering::Less => -(MATE_CP_BASE - (mate_in.abs() - 1)),
        std::cmp::Ordering::Equal => 0,
    }
}

/// Parse a centipawn score from a UCI info line.
fn parse_cp(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "cp" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse a mate score from a UCI info line.
fn parse_mate(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "mate" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 8 seldepth 12 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_cp("info depth 8 score mate 3 pv e2e4"), None);
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 8 score mate 3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(3));
        assert_eq!(parse_mate("info depth 8 score cp 35 pv e2e4"), None);
    }

    #[test]
    fn mate_scores_count_down_with_distance() {
        assert_eq!(mate_to_cp(1), 10000);
        assert_eq!(mate_to_cp(2), 9999);
        assert_eq!(mate_to_cp(-1), -10000);
        assert_eq!(mate_to_cp(-3), -9998);
        assert_eq!(mate_to_cp(0), 0);
    }

    #[test]
    fn post_move_eval_is_negated_to_mover_perspective() {
        // Opponent is up 51cp after our move => we are down 51.
        assert_eq!(eval_to_cp(RawEval { cp: Some(51), mate: None }), -51);
        // Opponent can mate in 2 => very bad for the mover.
        assert_eq!(eval_to_cp(RawEval { cp: None, mate: Some(2) }), -9999);
        // Opponent is getting mated => very good for the mover.
        assert_eq!(eval_to_cp(RawEval { cp: None, mate: Some(-2) }), 9999);
    }
}
