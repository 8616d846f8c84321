//! FEN canonicalization and position hashing.
//!
//! Positions reached via different move orders must be recognized as the
//! same position, so FENs are normalized before hashing: the halfmove and
//! fullmove counters are stripped, and the en-passant square is kept only
//! when an en-passant capture is actually legal. Engines that always write
//! the EP square after a double pawn push would otherwise split identical
//! positions into distinct keys.

use shakmaty::{fen::Fen, CastlingMode, Chess, EnPassantMode, Position};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("invalid FEN: {0}")]
    Invalid(String),
}

/// Parse a FEN into a legal standard-chess position.
pub fn parse_position(fen: &str) -> Result<Chess, FenError> {
    let setup: Fen = fen
        .parse()
        .map_err(|e| FenError::Invalid(format!("{e}")))?;
    setup
        .into_position(CastlingMode::Standard)
        .map_err(|e| FenError::Invalid(format!("{e}")))
}

/// Canonical four-field FEN for an already-parsed position.
///
/// Keeps piece placement, active color, castling rights, and en passant;
/// the EP field is `-` unless a legal en-passant capture exists.
pub fn normalize_position(pos: &Chess) -> String {
    let full = Fen::from_position(pos, EnPassantMode::Legal).to_string();
    full.split(' ').take(4).collect::<Vec<_>>().join(" ")
}

/// Canonical four-field FEN for a raw FEN string.
pub fn normalize_fen(fen: &str) -> Result<String, FenError> {
    Ok(normalize_position(&parse_position(fen)?))
}

/// SHA-256 of the canonical FEN, hex-encoded. This is the identity key of
/// a position; external consumers must compute it the same way.
pub fn hash_position(pos: &Chess) -> String {
    hex::encode(Sha256::digest(normalize_position(pos).as_bytes()))
}

/// SHA-256 hash of the normalized FEN.
pub fn fen_hash(fen: &str) -> Result<String, FenError> {
    Ok(hash_position(&parse_position(fen)?))
}

/// Side to move of a parsed position as the canonical color string.
pub fn position_color(pos: &Chess) -> &'static str {
    match pos.turn() {
        shakmaty::Color::White => "white",
        shakmaty::Color::Black => "black",
    }
}

/// Read the active-color field of a FEN without full board validation.
pub fn active_color(fen: &str) -> Result<&'static str, FenError> {
    match fen.split(' ').nth(1) {
        Some("w") => Ok("white"),
        Some("b") => Ok("black"),
        _ => Err(FenError::Invalid(format!(
            "missing or bad active-color field in {fen:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn normalize_strips_move_counters() {
        let a = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let b = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 7 42";
        assert_eq!(normalize_fen(a).unwrap(), normalize_fen(b).unwrap());
        assert_eq!(fen_hash(a).unwrap(), fen_hash(b).unwrap());
    }

    #[test]
    fn spurious_ep_square_is_dropped() {
        // After 1. e4 the e3 square is often written even though no black
        // pawn can capture there.
        let with_ep = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let without = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        assert_eq!(normalize_fen(with_ep).unwrap(), normalize_fen(without).unwrap());
        assert_eq!(fen_hash(with_ep).unwrap(), fen_hash(without).unwrap());
        assert!(normalize_fen(with_ep).unwrap().ends_with(" -"));
    }

    #[test]
    fn legal_ep_square_is_kept() {
        // White pawn on e5, black just played f7-f5: exf6 e.p. is legal.
        let fen = "rnbqkbnr/ppppp1pp/8/4Pp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        let normalized = normalize_fen(fen).unwrap();
        assert!(normalized.ends_with(" f6"), "kept EP square: {normalized}");

        let without = "rnbqkbnr/ppppp1pp/8/4Pp2/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3";
        assert_ne!(fen_hash(fen).unwrap(), fen_hash(without).unwrap());
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let hash = fen_hash(START_FEN).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn active_color_reads_second_field() {
        assert_eq!(active_color(START_FEN).unwrap(), "white");
        assert_eq!(
            active_color("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap(),
            "black"
        );
    }

    #[test]
    fn malformed_fen_is_rejected() {
        assert!(normalize_fen("not-a-fen").is_err());
        assert!(fen_hash("8/8/8/8").is_err());
        assert!(active_color("nonsense").is_err());
    }
}
