//! Process-wide position cache.
//!
//! A single `Mutex<HashMap<Fingerprint, Arc<CacheEntry>>>`, the thread-safe
//! analogue of the single-threaded cooperative cache the design describes:
//! the mutex is only ever held for the synchronous insert/lookup, never
//! across an `.await`. Concurrent lookups for the same fingerprint share one
//! entry's `OnceCell`, so only the first caller actually issues a CDB
//! request — everyone else awaits that same future.

use crate::client::{CdbClient, CdbError};
use crate::fingerprint::Fingerprint;
use crate::wire::QueryResult;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

pub struct CacheEntry {
    result: OnceCell<Result<QueryResult, CdbError>>,
    pub fetched_at: Instant,
    pub reprobes: u32,
}

impl CacheEntry {
    fn new(reprobes: u32) -> Arc<Self> {
        Arc::new(CacheEntry {
            result: OnceCell::new(),
            fetched_at: Instant::now(),
            reprobes,
        })
    }
}

#[derive(Default)]
pub struct PositionCache {
    entries: Mutex<HashMap<Fingerprint, Arc<CacheEntry>>>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `fp`, fetching from CDB on a miss or when `reprobe` forces a
    /// fresh entry (used for the root every iteration, and for PV nodes).
    /// Concurrent callers for the same fingerprint share one in-flight
    /// request via the entry's `OnceCell`.
    pub async fn lookup(
        &self,
        client: &CdbClient,
        fp: &Fingerprint,
        reprobe: bool,
        learn: bool,
    ) -> Result<QueryResult, CdbError> {
        let entry = self.entry_for(fp, reprobe);

        let result = entry
            .result
            .get_or_init(|| async { client.queryall(fp, learn).await })
            .await;

        match result {
            Ok(r) => Ok(r.clone()),
            Err(e) => Err(clone_error(e)),
        }
    }

    /// Fetch or reuse the cache slot for `fp`. `reprobe` always installs a
    /// fresh, empty entry so the next `lookup` forces a new `queryall`,
    /// regardless of whether the stale entry had already completed.
    fn entry_for(&self, fp: &Fingerprint, reprobe: bool) -> Arc<CacheEntry> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        if reprobe {
            debug!(fp = %fp, "reprobing position");
            let prior_reprobes = entries.get(fp).map(|e| e.reprobes).unwrap_or(0);
            let entry = CacheEntry::new(prior_reprobes + 1);
            entries.insert(fp.clone(), entry.clone());
            return entry;
        }

        entries
            .entry(fp.clone())
            .or_insert_with(|| CacheEntry::new(0))
            .clone()
    }

    /// Ask CDB to add `fp` for evaluation. Used when a cached entry is
    /// `known` but under-populated (fewer scored moves than legal moves,
    /// and fewer than 5).
    pub async fn requeue(&self, client: &CdbClient, fp: &Fingerprint) -> Result<(), CdbError> {
        client.queue(fp).await
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `CdbError` doesn't implement `Clone` (its variants carry owned `String`s
/// that round-trip fine through a fresh construction), so cache hits that
/// replay a cached transport failure reconstruct an equivalent error rather
/// than cloning one verbatim.
fn clone_error(e: &CdbError) -> CdbError {
    match e {
        CdbError::Transport(msg) => CdbError::Transport(msg.clone()),
        CdbError::Busy => CdbError::Busy,
        CdbError::Protocol(msg) => CdbError::Protocol(msg.clone()),
        CdbError::InvalidPosition => CdbError::InvalidPosition,
        CdbError::Exhausted(n) => CdbError::Exhausted(*n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::board::Board;
    use std::str::FromStr;

    fn fp() -> Fingerprint {
        Fingerprint::from(&Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap())
    }

    #[test]
    fn starts_empty() {
        let cache = PositionCache::new();
        assert!(cache.is_empty());
    }

    #[test]
    fn reprobe_replaces_the_slot() {
        let cache = PositionCache::new();
        let fp = fp();

        let first = cache.entry_for(&fp, false);
        let second = cache.entry_for(&fp, false);
        assert!(Arc::ptr_eq(&first, &second));

        let third = cache.entry_for(&fp, true);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 1);
    }
}
