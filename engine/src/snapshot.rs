//! A single iterative-deepening pass rendered for the `explorer` binary to
//! print, per `§6`'s text layout: two-space indent, labels left-padded to 10
//! columns, colon-space separator.

use crate::stats::StatsSnapshot;
use cdb::Score;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub depth: u32,
    pub score: Score,
    pub pv: Vec<String>,
    pub stats: StatsSnapshot,
    pub mate_proven: Option<bool>,
    pub root_epd: String,
}

impl Snapshot {
    /// `https://www.chessdb.cn/queryc_en/?<EPD-underscored>_moves_<m1>_<m2>…`
    pub fn query_url(&self) -> String {
        let epd = self.root_epd.replace(' ', "_");
        let mut url = format!("https://www.chessdb.cn/queryc_en/?{epd}");

        if !self.pv.is_empty() {
            url.push_str("_moves");
            for mv in &self.pv {
                url.push('_');
                url.push_str(mv);
            }
        }

        url
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {:<10}: {}", "depth", self.depth)?;

        match self.mate_proven {
            Some(true) => writeln!(f, "  {:<10}: CHECKMATE ({})", "score", self.score)?,
            Some(false) => writeln!(f, "  {:<10}: checkmate ({}, unproven)", "score", self.score)?,
            None => writeln!(f, "  {:<10}: {}", "score", self.score)?,
        }

        writeln!(f, "  {:<10}: {}", "pv", self.pv.join(" "))?;
        writeln!(f, "  {:<10}: {}", "queryall", self.stats.queryall)?;
        writeln!(f, "  {:<10}: {}", "enqueued", self.stats.enqueued)?;
        writeln!(f, "  {:<10}: {}", "requeued", self.stats.requeued)?;
        writeln!(f, "  {:<10}: {}", "unscored", self.stats.unscored)?;
        writeln!(f, "  {:<10}: {}", "reprobed", self.stats.reprobed)?;
        writeln!(f, "  {:<10}: {:.2}", "inflightQ", self.stats.inflight_q)?;
        writeln!(f, "  {:<10}: {:.2}", "inflightR", self.stats.inflight_r)?;
        writeln!(f, "  {:<10}: {}", "max_level", self.stats.max_level)?;
        writeln!(f, "  {:<10}: {:.3}", "bf", self.stats.branching_factor(self.depth))?;
        writeln!(f, "  {:<10}: {}", "cdb_ms", self.stats.cdb_time_ms)?;
        writeln!(f, "  {:<10}: {}", "url", self.query_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            depth: 3,
            score: Score::Centipawns(32),
            pv: vec!["e2e4".to_string(), "e7e5".to_string()],
            stats: StatsSnapshot::default(),
            mate_proven: None,
            root_epd: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -".to_string(),
        }
    }

    #[test]
    fn query_url_joins_pv_with_underscores() {
        let snap = sample();
        assert_eq!(
            snap.query_url(),
            "https://www.chessdb.cn/queryc_en/?rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR_w_KQkq_-_moves_e2e4_e7e5"
        );
    }

    #[test]
    fn query_url_omits_moves_segment_when_pv_is_empty() {
        let mut snap = sample();
        snap.pv.clear();
        assert!(!snap.query_url().contains("_moves"));
    }

    #[test]
    fn display_labels_are_left_padded() {
        let rendered = sample().to_string();
        assert!(rendered.contains("  depth     : 3"));
    }
}
