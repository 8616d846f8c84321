//! Replay a played move sequence into the list of reached positions and
//! the edges between them.
//!
//! The replay starts from the standard initial position and produces, for
//! every ply, the canonical SAN actually played plus the position hash on
//! both sides of the move. The blunder recorder splices this output into
//! the per-user position graph.

use shakmaty::{fen::Fen, san::SanPlus, Chess, EnPassantMode};

use crate::fen::{hash_position, position_color};
use crate::pgn;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone)]
pub struct ReplayedPosition {
    pub fen: String,
    pub hash: String,
    pub active_color: &'static str,
}

#[derive(Debug, Clone)]
pub struct ReplayedEdge {
    pub from_hash: String,
    pub move_san: String,
    pub to_hash: String,
}

#[derive(Debug, Clone)]
pub struct ReplayedGame {
    /// All reached positions in order, starting position included.
    pub positions: Vec<ReplayedPosition>,
    /// One edge per ply, in played order.
    pub edges: Vec<ReplayedEdge>,
}

impl ReplayedGame {
    /// The position in which the last move of the sequence was played.
    pub fn pre_move_position(&self) -> &ReplayedPosition {
        &self.positions[self.positions.len() - 2]
    }

    /// Full moves played (1. e4 counts as full move 1).
    pub fn full_moves(&self) -> usize {
        (self.edges.len() + 1) / 2
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("move sequence contains no moves")]
    Empty,

    #[error("illegal move {san} at ply {ply}")]
    IllegalMove { san: String, ply: usize },
}

fn snapshot(pos: &Chess) -> ReplayedPosition {
    ReplayedPosition {
        fen: Fen::from_position(pos, EnPassantMode::Legal).to_string(),
        hash: hash_position(pos),
        active_color: position_color(pos),
    }
}

/// Replay a SAN sequence from the standard starting position.
pub fn replay_sans(sans: &[String]) -> Result<ReplayedGame, ReplayError> {
    if sans.is_empty() {
        return Err(ReplayError::Empty);
    }

    let mut pos = Chess::default();
    let mut positions = vec![snapshot(&pos)];
    let mut edges = Vec::with_capacity(sans.len());

    for (ply, san) in sans.iter().enumerate() {
        let parsed: SanPlus = san.parse().map_err(|_| ReplayError::IllegalMove {
            san: san.clone(),
            ply: ply + 1,
        })?;
        let mv = parsed
            .san
            .to_move(&pos)
            .map_err(|_| ReplayError::IllegalMove {
                san: san.clone(),
                ply: ply + 1,
            })?;

        let from_hash = hash_position(&pos);
        // Store the canonical SAN so transpositions written with or without
        // check marks collapse onto the same edge.
        let canonical = SanPlus::from_move_and_play_unchecked(&mut pos, mv).to_string();
        let reached = snapshot(&pos);

        edges.push(ReplayedEdge {
            from_hash,
            move_san: canonical,
            to_hash: reached.hash.clone(),
        });
        positions.push(reached);
    }

    Ok(ReplayedGame { positions, edges })
}

/// Extract the mainline from a PGN and replay it.
pub fn replay_pgn(pgn_text: &str) -> Result<ReplayedGame, ReplayError> {
    replay_sans(&pgn::extract_moves(pgn_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::normalize_fen;

    #[test]
    fn replays_short_game_into_positions_and_edges() {
        let game = replay_pgn("1. e4 e5 2. Qh5").unwrap();

        assert_eq!(game.positions.len(), 4);
        assert_eq!(game.edges.len(), 3);
        assert_eq!(game.full_moves(), 2);

        assert_eq!(game.positions[0].fen, STANDARD_START_FEN);
        assert_eq!(game.edges[0].move_san, "e4");
        assert_eq!(game.edges[1].move_san, "e5");
        assert_eq!(game.edges[2].move_san, "Qh5");

        // Edges chain through matching hashes.
        for (i, edge) in game.edges.iter().enumerate() {
            assert_eq!(edge.from_hash, game.positions[i].hash);
            assert_eq!(edge.to_hash, game.positions[i + 1].hash);
        }
    }

    #[test]
    fn pre_move_position_is_second_to_last() {
        let game = replay_pgn("1. e4 e5 2. Qh5").unwrap();
        let pre = game.pre_move_position();

        assert_eq!(pre.active_color, "white");
        assert_eq!(
            normalize_fen(&pre.fen).unwrap(),
            normalize_fen("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2").unwrap()
        );
    }

    #[test]
    fn canonicalizes_check_suffix() {
        // 3. Qxf7 is mate; the stored SAN carries the canonical suffix even
        // if the input omitted it.
        let game = replay_pgn("1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7").unwrap();
        assert_eq!(game.edges.last().unwrap().move_san, "Qxf7#");
    }

    #[test]
    fn rejects_empty_and_illegal_sequences() {
        assert!(matches!(replay_pgn("*"), Err(ReplayError::Empty)));
        assert!(matches!(
            replay_pgn("1. e4 e4"),
            Err(ReplayError::IllegalMove { ply: 2, .. })
        ));
    }

    #[test]
    fn odd_ply_counts_round_up_to_full_moves() {
        let game = replay_pgn("1. e4").unwrap();
        assert_eq!(game.full_moves(), 1);

        let game = replay_pgn("1. e4 e5").unwrap();
        assert_eq!(game.full_moves(), 1);

        let game = replay_pgn("1. e4 e5 2. Nf3").unwrap();
        assert_eq!(game.full_moves(), 2);
    }
}
