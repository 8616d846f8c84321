//! SAN ↔ UCI conversion against a concrete position.

use shakmaty::{san::SanPlus, uci::UciMove, CastlingMode};

use crate::fen::{parse_position, FenError};

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("illegal or unparsable move {0}")]
    Illegal(String),
}

/// Parse a SAN move (check suffix optional) against a FEN and return its
/// UCI form.
pub fn san_to_uci(fen: &str, san: &str) -> Result<String, MoveError> {
    let pos = parse_position(fen)?;
    let parsed: SanPlus = san
        .parse()
        .map_err(|_| MoveError::Illegal(san.to_string()))?;
    let mv = parsed
        .san
        .to_move(&pos)
        .map_err(|_| MoveError::Illegal(san.to_string()))?;
    Ok(mv.to_uci(CastlingMode::Standard).to_string())
}

/// Parse a UCI move against a FEN and return its canonical SAN form.
pub fn uci_to_san(fen: &str, uci: &str) -> Result<String, MoveError> {
    let mut pos = parse_position(fen)?;
    let parsed: UciMove = uci
        .parse()
        .map_err(|_| MoveError::Illegal(uci.to_string()))?;
    let mv = parsed
        .to_move(&pos)
        .map_err(|_| MoveError::Illegal(uci.to_string()))?;
    Ok(SanPlus::from_move_and_play_unchecked(&mut pos, mv).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    #[test]
    fn san_round_trips_to_uci() {
        assert_eq!(san_to_uci(AFTER_E4, "e5").unwrap(), "e7e5");
        assert_eq!(san_to_uci(AFTER_E4, "Nf6").unwrap(), "g8f6");
    }

    #[test]
    fn uci_round_trips_to_san() {
        assert_eq!(uci_to_san(AFTER_E4, "e7e5").unwrap(), "e5");
        assert_eq!(uci_to_san(AFTER_E4, "b8c6").unwrap(), "Nc6");
    }

    #[test]
    fn illegal_moves_are_rejected() {
        // White piece, but black to move.
        assert!(san_to_uci(AFTER_E4, "Nf3").is_err());
        assert!(uci_to_san(AFTER_E4, "e2e4").is_err());
        assert!(san_to_uci(AFTER_E4, "zz9").is_err());
    }
}
