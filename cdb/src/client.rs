//! HTTP client for `https://www.chessdb.cn/cdb.php`.
//!
//! Every call passes through a single `tokio::sync::Semaphore`, sized by
//! `concurrency`. A compound interaction — `queryall` discovering an unknown
//! position and following up with a `queue`, or a retry after a busy reply —
//! holds its permit for the whole interaction, so the semaphore bounds
//! logical queries rather than raw HTTP requests.

use crate::fingerprint::Fingerprint;
use crate::wire::{self, QueryResult, ScoredMove, Status};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const BASE_URL: &str = "https://www.chessdb.cn/cdb.php";
const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum CdbError {
    #[error("CDB transport error: {0}")]
    Transport(String),
    #[error("CDB reported it is busy")]
    Busy,
    #[error("could not parse CDB response: {0}")]
    Protocol(String),
    #[error("CDB rejected the position as invalid")]
    InvalidPosition,
    #[error("retries exhausted after {0} attempts")]
    Exhausted(u32),
}

/// Time-averaged counters the engine reports as `inflightQ`/`inflightR`.
#[derive(Debug, Default)]
pub struct InflightCounters {
    pub logical: AtomicU64,
    pub raw: AtomicU64,
}

pub struct CdbClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    user_agent: String,
    chess960: bool,
    suppress_errors: bool,
    pub inflight: Arc<InflightCounters>,
}

impl CdbClient {
    pub fn new(concurrency: usize, user: Option<&str>, chess960: bool, suppress_errors: bool) -> Self {
        Self::with_base_url(BASE_URL, concurrency, user, chess960, suppress_errors)
    }

    /// Like `new`, but pointed at an arbitrary endpoint. Exists so tests can
    /// run `CdbClient` against a local stub instead of the real `chessdb.cn`.
    pub fn with_base_url(
        base_url: &str,
        concurrency: usize,
        user: Option<&str>,
        chess960: bool,
        suppress_errors: bool,
    ) -> Self {
        let user_agent = match user {
            Some(user) => format!("cdbexplore/{} (user={user})", env!("CARGO_PKG_VERSION")),
            None => format!("cdbexplore/{}", env!("CARGO_PKG_VERSION")),
        };

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            user_agent,
            chess960,
            suppress_errors,
            inflight: Arc::new(InflightCounters::default()),
        }
    }

    /// Ask CDB for the scored move list at `fp`. If CDB doesn't know the
    /// position, this transparently issues a `queue` and returns an empty,
    /// `known: false` result rather than surfacing the gap to the caller.
    pub async fn queryall(&self, fp: &Fingerprint, learn: bool) -> Result<QueryResult, CdbError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.inflight.logical.fetch_add(1, Ordering::Relaxed);

        let outcome = self.queryall_locked(fp, learn).await;

        self.inflight.logical.fetch_sub(1, Ordering::Relaxed);
        outcome
    }

    async fn queryall_locked(&self, fp: &Fingerprint, learn: bool) -> Result<QueryResult, CdbError> {
        let action = if learn { "queryall&learn=1" } else { "queryall" };

        match self.get_with_retry(action, fp).await? {
            Ok(result) => Ok(result),
            Err(Status::Unknown) => {
                self.queue_raw(fp).await.ok();
                Ok(QueryResult { known: false, ..Default::default() })
            }
            Err(Status::NoBestMove | Status::Checkmate | Status::Stalemate) => {
                Ok(QueryResult { known: true, ..Default::default() })
            }
            Err(Status::InvalidBoard) => Err(CdbError::InvalidPosition),
            Err(Status::Busy) => Err(CdbError::Exhausted(MAX_ATTEMPTS)),
        }
    }

    /// Ask CDB to add `fp` and its children for evaluation. Response body is
    /// informational and not parsed.
    pub async fn queue(&self, fp: &Fingerprint) -> Result<(), CdbError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.inflight.logical.fetch_add(1, Ordering::Relaxed);

        let outcome = self.queue_raw(fp).await;

        self.inflight.logical.fetch_sub(1, Ordering::Relaxed);
        outcome
    }

    async fn queue_raw(&self, fp: &Fingerprint) -> Result<(), CdbError> {
        self.get_body("queue", fp).await?;
        Ok(())
    }

    /// Re-check a position that previously returned `unknown`.
    pub async fn queryscore(&self, fp: &Fingerprint) -> Result<Option<ScoredMove>, CdbError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.inflight.logical.fetch_add(1, Ordering::Relaxed);

        let body = self.get_body("queryscore", fp).await;
        self.inflight.logical.fetch_sub(1, Ordering::Relaxed);

        let body = body?;

        match wire::parse_queryscore(&body).map_err(|e| CdbError::Protocol(e.to_string()))? {
            Ok(mv) => Ok(Some(mv)),
            Err(_status) => Ok(None),
        }
    }

    async fn get_with_retry(
        &self,
        action: &str,
        fp: &Fingerprint,
    ) -> Result<Result<QueryResult, Status>, CdbError> {
        let body = self.get_body(action, fp).await?;
        wire::parse_queryall(&body).map_err(|e| CdbError::Protocol(e.to_string()))
    }

    /// GET `action` for `fp`, retrying transport/busy failures with jittered
    /// exponential backoff. Each attempt counts toward `inflightR` (raw HTTP).
    async fn get_body(&self, action: &str, fp: &Fingerprint) -> Result<String, CdbError> {
        let url = self.build_url(action, fp);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.inflight.raw.fetch_add(1, Ordering::Relaxed);
            let started = Instant::now();

            let outcome = self.try_once(&url).await;

            self.inflight.raw.fetch_sub(1, Ordering::Relaxed);
            debug!(action, attempt, elapsed_ms = started.elapsed().as_millis() as u64, "cdb request");

            match outcome {
                Ok(body) => return Ok(body),
                Err(err) if attempt >= MAX_ATTEMPTS => {
                    if !self.suppress_errors {
                        warn!(action, attempt, error = %err, "cdb request exhausted retries");
                    }
                    return Err(CdbError::Exhausted(attempt));
                }
                Err(err) => {
                    if !self.suppress_errors {
                        warn!(action, attempt, error = %err, "cdb request failed, retrying");
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }

    async fn try_once(&self, url: &str) -> Result<String, CdbError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| CdbError::Transport(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(CdbError::Transport(format!("http {}", response.status())));
        }

        if !response.status().is_success() {
            return Err(CdbError::Transport(format!("http {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CdbError::Transport(e.to_string()))?;

        if body.trim().is_empty() {
            return Err(CdbError::Transport("empty body".to_string()));
        }

        if body.trim().eq_ignore_ascii_case("busy") || body.trim().starts_with("rate limit") {
            return Err(CdbError::Busy);
        }

        Ok(body)
    }

    fn build_url(&self, action: &str, fp: &Fingerprint) -> String {
        let mut url = format!("{}?action={action}&board={}", self.base_url, fp.as_query_param());

        if self.chess960 {
            url.push_str("&variant=chess960");
        }

        url
    }
}

/// Base delay doubles per attempt, plus up to 50% jitter, capped at
/// `MAX_BACKOFF` so a CDB rate limit doesn't produce synchronized retry
/// storms across concurrently-racing tasks.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF.saturating_mul(1u32 << attempt.min(8));
    let capped = exp.min(MAX_BACKOFF);
    let jitter_frac = rand::thread_rng().gen_range(0.0..0.5);

    capped.mul_f64(1.0 + jitter_frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let d1 = backoff_delay(1);
        let d5 = backoff_delay(5);

        assert!(d1 < d5);
        assert!(d5 <= MAX_BACKOFF.mul_f64(1.5));
    }

    #[test]
    fn user_agent_includes_user_when_set() {
        let client = CdbClient::new(4, Some("alice"), false, false);
        assert_eq!(client.user_agent, format!("cdbexplore/{} (user=alice)", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn user_agent_omits_suffix_when_unset() {
        let client = CdbClient::new(4, None, false, false);
        assert_eq!(client.user_agent, format!("cdbexplore/{}", env!("CARGO_PKG_VERSION")));
    }
}
