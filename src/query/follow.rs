//! Follow/Tail Loop
//!
//! Continuously re-queries the most recent index for records newer than a
//! moving cursor, like `tail -f` over the log store.
//!
//! # State Machine
//!
//! ```text
//!            ┌──────────── sleep(poll_interval) ◄──── EMIT
//!            ▼                                         ▲ ok
//!        POLLING ─── cache.get() → run(after = cursor) ┤
//!            ▲                                         ▼ err
//!            └──────────── sleep(retry_backoff) ◄─── BACKOFF
//!                                                      │ max_attempts reached
//!                                                      ▼
//!                                             FollowError::RetriesExhausted
//! ```
//!
//! The cursor is the latest `@timestamp` seen so far and only moves forward.
//! Queries after the first use an exclusive lower bound, so the record the
//! cursor came from is not returned again.

use crate::index::IndexCache;
use crate::query::error::{FollowError, QueryError, QueryResult};
use crate::query::executor::QueryExecutor;
use crate::query::{latest_timestamp, LogRecord, QuerySpec};
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::io;
use std::time::Duration;

/// Pause between successful polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pause before retrying a failed poll
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Consecutive failed polls before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Follow loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowConfig {
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Tails the newest index matching the cached pattern
pub struct Follower {
    cache: IndexCache,
    executor: QueryExecutor,
    spec: QuerySpec,
    config: FollowConfig,
    cursor: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    force_refresh: bool,
}

impl Follower {
    pub fn new(cache: IndexCache, executor: QueryExecutor, spec: QuerySpec) -> Self {
        Self {
            cache,
            executor,
            spec,
            config: FollowConfig::default(),
            cursor: None,
            consecutive_failures: 0,
            force_refresh: false,
        }
    }

    /// Builder method: override timing
    pub fn config(mut self, config: FollowConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder method: bypass the index cache until the first successful poll
    pub fn refresh_indices(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Lower bound of the next poll
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor
    }

    /// Failed polls since the last success
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Spec of the next poll
    ///
    /// Once a cursor exists the backend is asked for the oldest new records
    /// first, so a burst bigger than the budget drains over several polls
    /// instead of leaving a gap.
    pub fn next_spec(&self) -> QuerySpec {
        match self.cursor {
            Some(cursor) => {
                let mut spec = self.spec.with_cursor(Some(cursor));
                spec.query_ascending = true;
                spec
            }
            None => self.spec.with_cursor(None),
        }
    }

    /// Run a single poll and advance the cursor
    ///
    /// Returns the new records in presentation order. Does not sleep and does
    /// not touch the failure counter.
    pub async fn poll_once(&mut self) -> QueryResult<Vec<LogRecord>> {
        let indices = self.cache.get(self.force_refresh).await?;
        self.force_refresh = false;
        let newest = indices
            .first()
            .cloned()
            .ok_or_else(|| QueryError::NoIndices(self.cache.source().pattern().to_string()))?;

        let spec = self.next_spec();
        let records = self.executor.run(std::slice::from_ref(&newest), &spec).await?;

        let latest = latest_timestamp(&records);
        self.cursor = match (self.cursor, latest) {
            (Some(cursor), Some(latest)) => Some(cursor.max(latest)),
            (None, Some(latest)) => Some(latest),
            (Some(cursor), None) => Some(cursor),
            (None, None) => Some(Utc::now()),
        };

        tracing::debug!(index = %newest.name, records = records.len(), cursor = ?self.cursor, "Polled");
        Ok(records)
    }

    /// Poll forever, handing every new record to `sink`
    ///
    /// Only returns when polling failed `max_attempts` times in a row or the
    /// sink could not be written to.
    pub async fn run<F>(&mut self, mut sink: F) -> Result<Infallible, FollowError>
    where
        F: FnMut(&LogRecord) -> io::Result<()> + Send,
    {
        loop {
            match self.poll_once().await {
                Ok(records) => {
                    self.consecutive_failures = 0;
                    for record in &records {
                        sink(record)?;
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= self.config.max_attempts {
                        tracing::error!(
                            attempts = self.consecutive_failures,
                            error = %e,
                            "Exceeded total number of retries"
                        );
                        return Err(FollowError::RetriesExhausted {
                            attempts: self.consecutive_failures,
                            last: e,
                        });
                    }

                    tracing::warn!(
                        attempt = self.consecutive_failures,
                        error = %e,
                        "Follow query failed, retrying in {:?}",
                        self.config.retry_backoff
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }
    }
}
