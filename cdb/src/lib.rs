//! Client, wire protocol, and position cache for CDB (chessdb.cn), the remote
//! chess position database this engine explores and extends.

pub mod cache;
pub mod client;
pub mod fingerprint;
pub mod wire;

pub use cache::{CacheEntry, PositionCache};
pub use client::{CdbClient, CdbError, InflightCounters};
pub use fingerprint::Fingerprint;
pub use wire::{QueryResult, Score, ScoredMove};
