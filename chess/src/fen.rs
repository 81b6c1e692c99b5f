//! Logic for parsing FEN strings
//!
//! A FEN string (short for Forsyth-Edwards Notation) captures an entire board
//! state at a given point in time. This includes more than just the actual
//! pieces: it also includes whose turn it is, what castling rights remain,
//! whether it's possible to capture en-passant on this turn, etc...
//!
//! An example of a FEN-serialized board is:
//!
//!   rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2
//!
//! A FEN string always consists of 6 space-separated parts:
//!
//! 1. rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR
//!  The piece list, read as follows: Starting at the top rank, each character
//!  either represents a piece (in standard algebraic notation), or a number
//!  that represents a number of open squares until the next piece (or the end
//!  of the rank).
//!    
//! 2. w
//!  The player to go next
//!
//! 3. KQkq
//!  The remaining castling rights, read as "White Kingside",
//!  "White Queenside", etc... If no castling rights remain, it's simply
//!  written as a "-". (Note that these castling rights do not include
//!  temporary states like "this square is currently under attack". It only
//!  tracks whether or not the king/rooks have moved, and thus can never
//!  castle.
//!
//! 4. c6
//!  The square that is currently viable for an en-passant capture. This gets
//!  unset on the next move (or updated, if a new square becomes available).
//!  Some as with castling rights, it's simply written as a "-" when unset.
//!
//! 5. 0
//!  The half-move clock. This counts the number of half-turns (i.e, ply)
//!  since the last capture or pawn move. We need this to uphold the 50 move
//!  rule
//!
//! 6. 2
//!  The turn counter. Monotonically increasing counter that keeps track of
//!  how many full turns have gone. Gets incremented at the end of Black's turn.
//!
//! Not doing the best job at having clear errors when passed invalid FEN
//! strings, it'll just scream "Invalid!" and blow up. 💥

use std::str::FromStr;

use crate::bitboard::Bitboard;
use crate::board::Board;
use crate::board::Variant;
use crate::movegen::castling::CastleType;
use crate::movegen::castling::CastlingRights;
use crate::piece::Color;
use crate::piece::Piece;
use crate::piece::PieceType;
use crate::square::Square;
use anyhow::anyhow;
use itertools::Itertools;

impl Board {
  fn piece_placement_str(&self) -> String {
    let ranks = self.piece_list.into_iter().chunks(8);
    let ranks = ranks.into_iter().collect_vec();
    let mut rank_strs: Vec<String> = Vec::new();

    for rank in ranks.into_iter().rev() {
      let mut elements: Vec<String> = Vec::new();
      let piece_runs = rank.into_iter().group_by(|p| p.is_some());

      for run in &piece_runs {
        match run {
          (true, pieces) => {
            for piece in pieces {
              elements.push(piece.unwrap().to_string())
            }
          }
          (false, gaps) => elements.push(gaps.count().to_string()),
        }
      }

      rank_strs.push(elements.join(""));
    }

    rank_strs.into_iter().join("/")
  }

  /// Render the remaining castling rights, in Shredder-FEN (file-letter)
  /// notation when this board is a Chess960 position, so that two
  /// Chess960 positions whose rooks started on different files can't
  /// collide on the same castling string.
  fn castling_str(&self) -> String {
    if self.variant == Variant::Standard {
      return self.castling_rights.to_string();
    }

    let mut s = String::new();

    for (ctype, upper) in [
      (CastleType::WK, true),
      (CastleType::WQ, true),
      (CastleType::BK, false),
      (CastleType::BQ, false),
    ] {
      if !self.castling_rights.is_available(ctype) {
        continue;
      }

      if let Some(rook_sq) = self.castling_rook(ctype.color(), ctype.is_kingside()) {
        let file = (b'a' + rook_sq.file() as u8) as char;
        s.push(if upper { file.to_ascii_uppercase() } else { file });
      }
    }

    if s.is_empty() {
      s.push('-');
    }

    s
  }

  // Serialize a board into a FEN string
  pub fn to_fen(&self) -> String {
    let pieces = self.piece_placement_str();
    let next_player = self.current.to_string();
    let castling = self.castling_str();
    let en_passant = self
      .en_passant
      .map(|sq| sq.to_string())
      .unwrap_or(String::from("-"));
    let half_moves = self.half_moves;
    let full_moves = self.full_moves;

    format!("{pieces} {next_player} {castling} {en_passant} {half_moves} {full_moves}")
  }

  /// Serialize the position to EPD: the first four FEN fields, dropping the
  /// half-move and full-move counters. Two positions reached via different
  /// move orders fingerprint identically, which is what repetition
  /// detection and CDB lookups key on.
  pub fn epd(&self) -> String {
    let pieces = self.piece_placement_str();
    let next_player = self.current.to_string();
    let castling = self.castling_str();
    let en_passant = self
      .en_passant
      .map(|sq| sq.to_string())
      .unwrap_or(String::from("-"));

    format!("{pieces} {next_player} {castling} {en_passant}")
  }

  // Parse a board from a FEN string, assuming standard castling rules.
  pub fn from_fen(fen: &str) -> anyhow::Result<Board> {
    Board::from_fen_with_variant(fen, Variant::Standard)
  }

  /// Parse a board from a FEN string, using the given castling convention.
  /// Chess960 positions with rooks away from a/h-file rely on `variant` to
  /// resolve which rook a `K`/`Q`/`k`/`q` castling letter refers to.
  pub fn from_fen_with_variant(fen: &str, variant: Variant) -> anyhow::Result<Board> {
    let mut parts = fen.split(' ');

    let piece_string = parts.next().ok_or(anyhow!("Invalid FEN string"))?;

    // Parse the pieces

    let mut piece_bbs = [Bitboard::EMPTY; PieceType::COUNT];
    let mut occupied_squares = [Bitboard::EMPTY; Color::COUNT];
    let mut piece_list = [None; Square::COUNT];
    let mut square_idx: usize = 0;

    // FEN starts with the 8th rank down, so we need to reverse the ranks
    // to go in ascending order
    for rank in piece_string.split('/').rev() {
      for c in rank.chars() {
        let c = c.to_string();

        if let Ok(gap) = usize::from_str(&c) {
          square_idx += gap;
        } else if let Ok(piece) = Piece::from_str(&c) {
          let square = Square::from(square_idx);
          let bb = Bitboard::from(square);

          piece_list[square_idx] = Some(piece);
          piece_bbs[piece.piece_type()] |= bb;
          occupied_squares[piece.color()] |= bb;

          square_idx += 1;
        }
      }
    }

    // Parse the game state

    let current: Color =
      parts.next().ok_or(anyhow!("Invalid FEN string"))?.parse()?;

    let castling_str = parts.next().ok_or(anyhow!("Invalid FEN string"))?;
    let castling_rights = match variant {
      Variant::Standard => castling_str.parse()?,
      Variant::Chess960 => parse_shredder_castling(castling_str, &piece_list)?,
    };

    let en_passant: Option<Square> = parts
      .next()
      .ok_or(anyhow!("Invalid FEN string"))?
      .parse()
      .ok();

    let half_moves =
      parts.next().ok_or(anyhow!("Invalid FEN string"))?.parse()?;

    let full_moves =
      parts.next().ok_or(anyhow!("Invalid FEN string"))?.parse()?;

    let board = Board::new(
      piece_list,
      piece_bbs,
      occupied_squares,
      current,
      castling_rights,
      en_passant,
      half_moves,
      full_moves,
      variant,
    );

    Ok(board)
  }
}

/// Parse a Shredder-FEN castling field (file letters rather than `KQkq`)
/// into `CastlingRights`, by comparing each rook's file against its king's
/// file to decide whether it's a kingside or queenside right.
fn parse_shredder_castling(
  castling_str: &str,
  piece_list: &[Option<Piece>; Square::COUNT],
) -> anyhow::Result<CastlingRights> {
  let mut rights = CastlingRights::none();

  if castling_str == "-" {
    return Ok(rights);
  }

  let king_file = |color: Color| -> anyhow::Result<usize> {
    piece_list
      .iter()
      .enumerate()
      .find_map(|(idx, p)| match p {
        Some(piece) if piece.is_king() && piece.color() == color => {
          Some(Square::from(idx).file())
        }
        _ => None,
      })
      .ok_or(anyhow!("No king found for {color:?}"))
  };

  for ch in castling_str.chars() {
    let color = if ch.is_ascii_uppercase() { Color::White } else { Color::Black };
    let file = match ch.to_ascii_lowercase() {
      'k' => None, // fall back to standard notation below
      'q' => None,
      letter @ 'a'..='h' => Some(letter as usize - 'a' as usize),
      _ => Err(anyhow!("Invalid FEN string"))?,
    };

    let kingside = match (ch.to_ascii_lowercase(), file) {
      ('k', None) => true,
      ('q', None) => false,
      (_, Some(file)) => file > king_file(color)?,
    };

    rights.add(if kingside {
      if color.is_white() { CastleType::WK } else { CastleType::BK }
    } else if color.is_white() { CastleType::WQ } else { CastleType::BQ }
    );
  }

  Ok(rights)
}

////////////////////////////////////////////////////////////////////////////////
//
// Tests
//
////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_to_fen() {
  let initial_fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
  let board = Board::from_str(initial_fen).unwrap();
  let fen = board.to_fen();
  assert_eq!(initial_fen, fen);
}
