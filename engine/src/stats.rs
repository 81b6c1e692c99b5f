//! Per-iteration statistics, shared across concurrent search tasks behind
//! an `Arc<Mutex<..>>` and updated synchronously, the way the position
//! cache and CDB semaphore are also shared mutable state (`§5`).

use cdb::InflightCounters;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Statistics {
    pub queryall: AtomicU64,
    pub chessdbq: AtomicU64,
    pub enqueued: AtomicU64,
    pub requeued: AtomicU64,
    pub unscored: AtomicU64,
    pub reprobed: AtomicU64,
    pub cdb_time_ms: AtomicU64,
    pub level: AtomicU64,
    pub max_level: AtomicU64,
    /// Running sums backing the `inflightQ`/`inflightR` time-averages,
    /// sampled from the client's `InflightCounters` at every node visit.
    inflight_q_sum: AtomicU64,
    inflight_r_sum: AtomicU64,
    inflight_samples: AtomicU64,
}

impl Statistics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_queryall(&self) {
        self.queryall.fetch_add(1, Ordering::Relaxed);
        self.chessdbq.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueue(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeue(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unscored(&self) {
        self.unscored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reprobe(&self) {
        self.reprobed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cdb_time(&self, elapsed: Duration) {
        self.cdb_time_ms.fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn observe_level(&self, level: u64) {
        self.level.store(level, Ordering::Relaxed);
        self.max_level.fetch_max(level, Ordering::Relaxed);
    }

    /// Take one sample of the client's current in-flight gauges toward the
    /// `inflightQ`/`inflightR` running averages. Called once per node visit,
    /// alongside `observe_level`.
    pub fn sample_inflight(&self, inflight: &InflightCounters) {
        self.inflight_q_sum.fetch_add(inflight.logical.load(Ordering::Relaxed), Ordering::Relaxed);
        self.inflight_r_sum.fetch_add(inflight.raw.load(Ordering::Relaxed), Ordering::Relaxed);
        self.inflight_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let samples = self.inflight_samples.load(Ordering::Relaxed).max(1) as f64;

        StatsSnapshot {
            queryall: self.queryall.load(Ordering::Relaxed),
            chessdbq: self.chessdbq.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            unscored: self.unscored.load(Ordering::Relaxed),
            reprobed: self.reprobed.load(Ordering::Relaxed),
            cdb_time_ms: self.cdb_time_ms.load(Ordering::Relaxed),
            level: self.level.load(Ordering::Relaxed),
            max_level: self.max_level.load(Ordering::Relaxed),
            inflight_q: self.inflight_q_sum.load(Ordering::Relaxed) as f64 / samples,
            inflight_r: self.inflight_r_sum.load(Ordering::Relaxed) as f64 / samples,
        }
    }
}

/// A point-in-time read of `Statistics`, plus the derived branching-factor
/// figure. Taken at the end of each iterative-deepening pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub queryall: u64,
    pub chessdbq: u64,
    pub enqueued: u64,
    pub requeued: u64,
    pub unscored: u64,
    pub reprobed: u64,
    pub cdb_time_ms: u64,
    pub level: u64,
    pub max_level: u64,
    pub inflight_q: f64,
    pub inflight_r: f64,
}

impl StatsSnapshot {
    /// `bf = queryall^(1/d)`: the effective branching factor implied by the
    /// total number of `queryall` calls made to reach depth `d`.
    pub fn branching_factor(&self, depth: u32) -> f64 {
        if depth == 0 || self.queryall == 0 {
            return 0.0;
        }

        (self.queryall as f64).powf(1.0 / depth as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branching_factor_of_one_query_at_depth_one_is_one() {
        let stats = Statistics::new();
        stats.record_queryall();
        let snap = stats.snapshot();

        assert!((snap.branching_factor(1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn branching_factor_zero_depth_is_zero() {
        let stats = Statistics::new();
        stats.record_queryall();
        assert_eq!(stats.snapshot().branching_factor(0), 0.0);
    }

    #[test]
    fn inflight_averages_over_samples_taken() {
        let stats = Statistics::new();
        let inflight = InflightCounters::default();

        inflight.logical.store(2, Ordering::Relaxed);
        inflight.raw.store(4, Ordering::Relaxed);
        stats.sample_inflight(&inflight);

        inflight.logical.store(0, Ordering::Relaxed);
        inflight.raw.store(0, Ordering::Relaxed);
        stats.sample_inflight(&inflight);

        let snap = stats.snapshot();
        assert!((snap.inflight_q - 1.0).abs() < 1e-9);
        assert!((snap.inflight_r - 2.0).abs() < 1e-9);
    }

    #[test]
    fn max_level_tracks_the_high_water_mark() {
        let stats = Statistics::new();
        stats.observe_level(3);
        stats.observe_level(1);
        stats.observe_level(5);

        let snap = stats.snapshot();
        assert_eq!(snap.level, 1);
        assert_eq!(snap.max_level, 5);
    }
}
