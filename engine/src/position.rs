//! A board threaded with move history, so terminal detection can also see
//! 3-fold repetition — something a bare `chess::board::Board` can't do on
//! its own, since it doesn't track history.

use chess::board::{Board, Terminal, Variant};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Position {
    pub board: Board,
    /// EPD fingerprints of every position reached so far, including the
    /// current one. Move counters are already excluded from EPD, which is
    /// exactly what repetition comparison needs.
    history: Vec<String>,
}

impl Position {
    pub fn new(board: Board) -> Self {
        let epd = board.epd();
        Position { board, history: vec![epd] }
    }

    pub fn from_fen(fen: &str, variant: Variant) -> anyhow::Result<Self> {
        let board = Board::from_fen_with_variant(fen, variant)?;
        Ok(Position::new(board))
    }

    pub fn epd(&self) -> String {
        self.board.epd()
    }

    pub fn ply_count(&self) -> u32 {
        self.history.len() as u32 - 1
    }

    /// Apply a UCI move (`<from><to>[promo]`) and return the resulting
    /// position, with history extended.
    pub fn apply_uci(&self, uci: &str) -> anyhow::Result<Position> {
        let mv = self.board.legal_moves::<true>().into_iter().find(|mv| mv.to_string() == uci);
        let mv = mv.ok_or_else(|| anyhow::anyhow!("{uci} is not a legal move in {}", self.epd()))?;

        let board = self.board.play_move(mv);
        let mut history = self.history.clone();
        history.push(board.epd());

        Ok(Position { board, history })
    }

    fn is_repetition(&self) -> bool {
        let current = self.history.last().expect("history is never empty");

        // Only positions with the same side to move can repeat, so check
        // every other entry.
        self.history
            .iter()
            .rev()
            .skip(1)
            .step_by(2)
            .filter(|epd| *epd == current)
            .count()
            >= 2
    }

    /// Classify this position as terminal, including 3-fold repetition,
    /// which a bare `Board` can't see on its own.
    pub fn is_terminal(&self) -> Terminal {
        if self.is_repetition() {
            return Terminal::Draw;
        }

        self.board.is_terminal()
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(fen: &str) -> anyhow::Result<Self> {
        Position::from_fen(fen, Variant::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_not_terminal() {
        let pos: Position = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();
        assert_eq!(pos.is_terminal(), Terminal::None);
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let pos: Position = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".parse().unwrap();
        let pos = pos.apply_uci("f2f3").unwrap();
        let pos = pos.apply_uci("e7e5").unwrap();
        let pos = pos.apply_uci("g2g4").unwrap();
        let pos = pos.apply_uci("d8h4").unwrap();

        assert_eq!(pos.is_terminal(), Terminal::Checkmate);
    }

    #[test]
    fn threefold_repetition_is_a_draw() {
        let mut pos: Position = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();

        for _ in 0..2 {
            pos = pos.apply_uci("g1f3").unwrap();
            pos = pos.apply_uci("g8f6").unwrap();
            pos = pos.apply_uci("f3g1").unwrap();
            pos = pos.apply_uci("f6g8").unwrap();
        }

        assert_eq!(pos.is_terminal(), Terminal::Draw);
    }
}
