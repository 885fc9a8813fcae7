//! Search Backend
//!
//! The engine talks to the log store only through the [`Backend`] trait:
//!
//! - **discover**: which time-partitioned indices exist, with their time bounds
//! - **search**: one query against one index
//! - **list_index_patterns**: the index patterns an environment defines
//!
//! [`KibanaBackend`] is the HTTP implementation; tests substitute in-memory
//! doubles.

mod error;
mod kibana;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{BackendError, BackendResult};
pub use kibana::{parse_msearch_response, KibanaBackend, KibanaConfig};

use crate::index::{DiscoveryError, IndexMeta};
use crate::query::{LogRecord, QuerySpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Capabilities the query engine needs from a log store
#[async_trait]
pub trait Backend: Send + Sync {
    /// Indices matching `pattern` whose `@timestamp` range overlaps `[after, before]`,
    /// ordered by name, descending
    async fn discover(
        &self,
        pattern: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<IndexMeta>, DiscoveryError>;

    /// Run `spec` against a single index, returning hits in backend order
    async fn search(&self, index: &str, spec: &QuerySpec) -> BackendResult<Vec<LogRecord>>;

    /// Names of the index patterns the backend knows about
    async fn list_index_patterns(&self) -> BackendResult<Vec<String>>;
}
