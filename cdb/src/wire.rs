//! CDB's line-oriented wire protocol.
//!
//! Response bodies for `queryall`/`queryscore` are whitespace/`|`-delimited
//! `key:value` tuples, not JSON — the parsing style here mirrors
//! `chessmatch`'s UCI `Info` parser: split on a separator, match each token,
//! fill in an accumulator struct.

use anyhow::{anyhow, Context};
use std::fmt::Display;
use std::str::FromStr;

/// Centipawn score together with the reserved out-of-band sentinel bands
/// CDB uses for mates and cursed wins/losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Plain centipawn evaluation, from the side-to-move's perspective.
    Centipawns(i32),
    /// CDB's "cursed win/loss" band: technically winning/losing per CDB's
    /// tablebase, but not counted as such unless `cursed_wins` is enabled.
    Cursed(i32),
    /// Distance to mate, in plies. Positive: side to move mates. Negative:
    /// side to move gets mated.
    Mate(i32),
    /// No evaluation is available yet.
    Unknown,
    /// The move is illegal or the position is unreachable.
    Invalid,
}

const MATE_BOUND: i32 = 30000;
const CURSED_LOW: i32 = 20000;
pub const MAX_PLY: i32 = 1024;

impl Score {
    /// Decode a raw CDB integer score into its banded representation.
    pub fn from_raw(raw: i32) -> Self {
        let mag = raw.abs();

        if mag >= MATE_BOUND - MAX_PLY {
            let plies = MATE_BOUND - mag;
            Score::Mate(if raw > 0 { plies } else { -plies })
        } else if mag > CURSED_LOW {
            Score::Cursed(raw)
        } else {
            Score::Centipawns(raw)
        }
    }

    /// Negate for the opposing side's perspective, the way minimax threads
    /// scores back up the tree.
    pub fn negate(self) -> Self {
        match self {
            Score::Centipawns(s) => Score::Centipawns(-s),
            Score::Cursed(s) => Score::Cursed(-s),
            Score::Mate(plies) => Score::Mate(-plies),
            Score::Unknown => Score::Unknown,
            Score::Invalid => Score::Invalid,
        }
    }

    /// Collapse cursed wins/losses to a neutral score unless the engine has
    /// been configured to trust them.
    pub fn clip_cursed(self, cursed_wins: bool) -> Self {
        match self {
            Score::Cursed(_) if !cursed_wins => Score::Centipawns(0),
            Score::Cursed(s) => Score::Centipawns(s.signum() * CURSED_LOW),
            other => other,
        }
    }

    /// An ordering key usable to sort scored moves best-first, regardless of
    /// band. Mates always outrank cursed/plain scores of the same sign.
    pub fn ordering_key(self) -> i64 {
        match self {
            Score::Mate(plies) if plies > 0 => 1_000_000 - plies as i64,
            Score::Mate(plies) => -1_000_000 - plies as i64,
            Score::Cursed(s) => s as i64,
            Score::Centipawns(s) => s as i64,
            Score::Unknown => i64::MIN,
            Score::Invalid => i64::MIN,
        }
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Centipawns(s) => write!(f, "{s}"),
            Score::Cursed(s) => write!(f, "{s} (cursed)"),
            Score::Mate(plies) if *plies >= 0 => write!(f, "#{}", plies / 2 + 1),
            Score::Mate(plies) => write!(f, "#-{}", (-plies) / 2 + 1),
            Score::Unknown => write!(f, "unknown"),
            Score::Invalid => write!(f, "invalid"),
        }
    }
}

/// One entry of CDB's `move:score` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMove {
    pub uci: String,
    pub score: Score,
}

/// The terminal/administrative status a CDB response can carry instead of
/// a move list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unknown,
    NoBestMove,
    Checkmate,
    Stalemate,
    InvalidBoard,
    Busy,
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim() {
            "unknown" => Ok(Status::Unknown),
            "nobestmove" => Ok(Status::NoBestMove),
            "checkmate" => Ok(Status::Checkmate),
            "stalemate" => Ok(Status::Stalemate),
            "invalid board" => Ok(Status::InvalidBoard),
            other => Err(anyhow!("not a recognized status: {other}")),
        }
    }
}

/// The result of a `queryall` call: an ordered (best-first) move list, plus
/// CDB's metadata flags about how complete that list is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub moves: Vec<ScoredMove>,
    pub known: bool,
    pub tb_hit: bool,
    pub ply: Option<u32>,
}

impl QueryResult {
    /// CDB considers a position "complete" once it has 5 or more scored
    /// moves, or has returned every legal move there is.
    pub fn is_complete(&self, legal_move_count: usize) -> bool {
        self.moves.len() >= 5 || self.moves.len() >= legal_move_count
    }

    pub fn best(&self) -> Option<&ScoredMove> {
        self.moves.first()
    }
}

/// Parse a `queryall` response body.
///
/// Typical success body:
///   `move:e2e4, score:32, move:d2d4, score:28|ply:12`
/// or, with a tablebase hit:
///   `egtb:1|move:e2e4, score:32`
/// A bare status word (`unknown`, `invalid board`, ...) is also possible.
pub fn parse_queryall(body: &str) -> anyhow::Result<Result<QueryResult, Status>> {
    let body = body.trim();

    if let Ok(status) = Status::from_str(body) {
        return Ok(Err(status));
    }

    if body.is_empty() {
        return Err(anyhow!("empty queryall body"));
    }

    let mut result = QueryResult { known: true, ..Default::default() };

    for segment in body.split('|') {
        let segment = segment.trim();

        if segment.is_empty() {
            continue;
        }

        if segment == "egtb:1" || segment == "egtb" {
            result.tb_hit = true;
            continue;
        }

        if let Some(rest) = segment.strip_prefix("ply:") {
            result.ply = rest.trim().parse().ok();
            continue;
        }

        // `move:`/`score:` tokens alternate, comma-separated; a move's score
        // isn't necessarily adjacent in every CDB reply variant, so tokens
        // are paired up by key rather than assumed to come two-at-a-time.
        let mut pending_uci: Option<String> = None;

        for token in segment.split(',') {
            let token = token.trim();

            if token.is_empty() {
                continue;
            }

            if let Some(value) = token.strip_prefix("move:") {
                pending_uci = Some(value.trim().to_string());
            } else if let Some(value) = token.strip_prefix("score:") {
                let uci = pending_uci
                    .take()
                    .ok_or(anyhow!("score: with no preceding move: in {segment}"))?;
                let score = Score::from_raw(value.trim().parse().context("invalid score integer")?);
                result.moves.push(ScoredMove { uci, score });
            }
        }
    }

    result
        .moves
        .sort_by(|a, b| b.score.ordering_key().cmp(&a.score.ordering_key()));

    Ok(Ok(result))
}

fn parse_move_score_pair(pair: &str) -> anyhow::Result<ScoredMove> {
    let mut uci = None;
    let mut score = None;

    for token in pair.split(',') {
        let token = token.trim();

        if let Some(value) = token.strip_prefix("move:") {
            uci = Some(value.trim().to_string());
        } else if let Some(value) = token.strip_prefix("score:") {
            score = Some(Score::from_raw(
                value.trim().parse().context("invalid score integer")?,
            ));
        }
    }

    Ok(ScoredMove {
        uci: uci.ok_or(anyhow!("missing move: in {pair}"))?,
        score: score.ok_or(anyhow!("missing score: in {pair}"))?,
    })
}

/// Parse a `queryscore` response body: a single `move:<uci>,score:<int>`
/// line, or a bare status word.
pub fn parse_queryscore(body: &str) -> anyhow::Result<Result<ScoredMove, Status>> {
    let body = body.trim();

    if let Ok(status) = Status::from_str(body) {
        return Ok(Err(status));
    }

    Ok(Ok(parse_move_score_pair(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_queryall_body() {
        let result = parse_queryall("move:e2e4, score:32, move:d2d4, score:28")
            .unwrap()
            .unwrap();

        assert_eq!(result.moves.len(), 2);
        assert_eq!(result.moves[0].uci, "e2e4");
        assert_eq!(result.moves[0].score, Score::Centipawns(32));
        assert!(result.known);
        assert!(!result.tb_hit);
    }

    #[test]
    fn parses_egtb_and_ply_markers() {
        let result = parse_queryall("egtb:1|move:e2e4, score:32|ply:7")
            .unwrap()
            .unwrap();

        assert!(result.tb_hit);
        assert_eq!(result.ply, Some(7));
    }

    #[test]
    fn sorts_moves_best_first() {
        let result = parse_queryall("move:a2a3, score:5, move:e2e4, score:80")
            .unwrap()
            .unwrap();

        assert_eq!(result.moves[0].uci, "e2e4");
    }

    #[test]
    fn recognizes_status_words() {
        assert_eq!(parse_queryall("unknown").unwrap(), Err(Status::Unknown));
        assert_eq!(
            parse_queryall("invalid board").unwrap(),
            Err(Status::InvalidBoard)
        );
    }

    #[test]
    fn decodes_mate_band() {
        assert_eq!(Score::from_raw(30000), Score::Mate(0));
        assert_eq!(Score::from_raw(29998), Score::Mate(2));
        assert_eq!(Score::from_raw(-29999), Score::Mate(-1));
    }

    #[test]
    fn decodes_mate_band_far_from_the_boundary() {
        // Mate in 5 plies for the side to move, well below the 29999
        // boundary a too-narrow gate would require.
        assert_eq!(Score::from_raw(29990), Score::Mate(10));
        assert_eq!(Score::from_raw(-29990), Score::Mate(-10));
        // The edge of the mate band: MATE_BOUND - MAX_PLY.
        assert_eq!(Score::from_raw(28976), Score::Mate(1024));
        assert_eq!(Score::from_raw(28975), Score::Cursed(28975));
    }

    #[test]
    fn decodes_cursed_band() {
        assert_eq!(Score::from_raw(25000), Score::Cursed(25000));
        assert_eq!(Score::from_raw(25000).clip_cursed(false), Score::Centipawns(0));
        assert_eq!(
            Score::from_raw(25000).clip_cursed(true),
            Score::Centipawns(20000)
        );
    }

    #[test]
    fn parses_queryscore_body() {
        let mv = parse_queryscore("move:e2e4,score:32").unwrap().unwrap();
        assert_eq!(mv.uci, "e2e4");
        assert_eq!(mv.score, Score::Centipawns(32));
    }
}
