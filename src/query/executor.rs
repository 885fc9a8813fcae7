//! Multi-Index Query Executor
//!
//! Walks an ordered list of indices one at a time, issuing one search per
//! index, until the result budget is spent:
//!
//! ```text
//! [A, B, C], max_results = 150
//!   A → 100 records (remaining 50)
//!   B → 50 records  (remaining 0)
//!   C → never queried
//! ```
//!
//! Each request asks for at most the remaining budget, so the total never
//! exceeds `max_results`. Field projection is applied per record, always
//! keeping `@timestamp`.

use crate::backend::Backend;
use crate::index::IndexMeta;
use crate::query::error::{QueryError, QueryResult};
use crate::query::{LogRecord, QuerySpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to do when a single index fails mid-scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Fail the whole scan with the first index error
    #[default]
    AbortOnError,
    /// Log the failure and continue with the next index
    SkipFailedIndices,
}

/// Runs a query across many indices within a result budget
pub struct QueryExecutor {
    backend: Arc<dyn Backend>,
    policy: ScanPolicy,
}

impl QueryExecutor {
    /// Create a new executor with the default (abort) policy
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            policy: ScanPolicy::default(),
        }
    }

    /// Builder method: set the scan policy
    pub fn policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `spec` across `indices`
    ///
    /// `indices` are expected most-recent first. When `spec` asks the
    /// backend for the oldest records first, they are walked in reverse.
    /// The returned batch is ordered by `@timestamp` in `spec`'s
    /// presentation order.
    pub async fn run(&self, indices: &[IndexMeta], spec: &QuerySpec) -> QueryResult<Vec<LogRecord>> {
        let ordered: Box<dyn Iterator<Item = &IndexMeta> + '_> = if spec.query_ascending {
            Box::new(indices.iter().rev())
        } else {
            Box::new(indices.iter())
        };

        let mut records: Vec<LogRecord> = Vec::new();

        for index in ordered {
            let remaining = spec.max_results.saturating_sub(records.len());
            if remaining == 0 {
                break;
            }

            tracing::info!(index = %index.name, remaining, "Querying index");

            match self.backend.search(&index.name, &spec.with_limit(remaining)).await {
                Ok(mut hits) => {
                    hits.truncate(remaining);
                    tracing::debug!(index = %index.name, hits = hits.len(), "Index returned");
                    records.extend(hits.into_iter().map(|r| r.project(&spec.select_fields)));
                }
                Err(source) => match self.policy {
                    ScanPolicy::AbortOnError => {
                        return Err(QueryError::Search {
                            index: index.name.clone(),
                            source,
                        });
                    }
                    ScanPolicy::SkipFailedIndices => {
                        tracing::warn!(index = %index.name, error = %source, "Skipping failed index");
                    }
                },
            }
        }

        sort_records(&mut records, spec.sort_descending);
        Ok(records)
    }
}

/// Stable sort by `@timestamp`; records without one sort first (ascending)
pub fn sort_records(records: &mut [LogRecord], descending: bool) {
    if descending {
        records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    } else {
        records.sort_by_key(LogRecord::timestamp);
    }
}
