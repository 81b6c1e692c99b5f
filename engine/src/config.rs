//! Search configuration.
//!
//! `serde`-derived so a driver can load this from a config file, mirroring
//! `chessmatch`'s use of `serde::Deserialize` for its own engine configs —
//! this crate additionally derives `Serialize` so a driver can round-trip
//! one back out.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stop after this many iterative-deepening passes. `None` = unlimited.
    pub depth_limit: Option<u32>,
    /// Stop starting new iterations once this many seconds have elapsed.
    pub time_limit: Option<u64>,
    /// Permits on the CDB semaphore.
    pub concurrency: usize,
    /// Centipawns of score lost per 1 ply of width pruning. `0` means
    /// PV-only: only the best move at each node is explored.
    pub eval_decay: u32,
    /// Count CDB's "cursed win/loss" band as a genuine win/loss.
    pub cursed_wins: bool,
    /// Keep expanding past tablebase-scored positions instead of treating
    /// them as leaves.
    pub tb_search: bool,
    /// After a mate score is found at the root, run the auxiliary
    /// mate-proof pass.
    pub prove_mates: bool,
    /// Use Chess960 castling semantics, and set the CDB API's variant flag.
    pub chess960: bool,
    /// Appended to the User-Agent CDB sees.
    pub user: Option<String>,
    /// Silence error-level logging on CDB transport failures (they're
    /// still downgraded to `UNKNOWN`, just not logged).
    pub suppress_errors: bool,
    /// Ask CDB to learn queried positions (`&learn=1`).
    pub learn: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            depth_limit: None,
            time_limit: None,
            concurrency: 16,
            eval_decay: 0,
            cursed_wins: false,
            tb_search: false,
            prove_mates: false,
            chess960: false,
            user: None,
            suppress_errors: false,
            learn: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pv_only_unbounded() {
        let config = Config::default();
        assert_eq!(config.eval_decay, 0);
        assert_eq!(config.depth_limit, None);
        assert_eq!(config.concurrency, 16);
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let config = Config { depth_limit: Some(20), chess960: true, ..Default::default() };
        assert_eq!(config.depth_limit, Some(20));
        assert!(config.chess960);
        assert!(config.learn);
    }

    #[test]
    fn round_trips_through_json() {
        let config = Config { depth_limit: Some(20), chess960: true, ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(back.depth_limit, Some(20));
        assert!(back.chess960);
    }
}
