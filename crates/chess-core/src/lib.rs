pub mod fen;
pub mod notation;
pub mod pgn;
pub mod replay;
