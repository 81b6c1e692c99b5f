//! Position fingerprinting.
//!
//! CDB keys positions by their EPD string (piece placement, side to move,
//! castling rights, en-passant square — no move counters), so two boards
//! reached via different move orders collide on the same fingerprint. This
//! is also what the engine's repetition check and the position cache key on.

use chess::board::Board;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The board string as sent over the wire: spaces replaced by `+`, per
    /// CDB's `board=` query parameter convention.
    pub fn as_query_param(&self) -> String {
        self.0.replace(' ', "+")
    }
}

impl From<&Board> for Fingerprint {
    fn from(board: &Board) -> Self {
        Fingerprint(board.epd())
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn drops_move_counters() {
        let a = Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        let b = Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 7 12").unwrap();

        assert_eq!(Fingerprint::from(&a), Fingerprint::from(&b));
    }

    #[test]
    fn query_param_escapes_spaces() {
        let fp = Fingerprint::from(
            &Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap(),
        );

        assert!(!fp.as_query_param().contains(' '));
        assert!(fp.as_query_param().contains('+'));
    }
}
