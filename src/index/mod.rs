//! Index Discovery and Caching
//!
//! Log data lives in time-partitioned indices (one per day or period). Before
//! querying, the engine needs to know which of them exist:
//!
//! - **IndexDiscovery**: asks the backend, orders the result
//! - **IndexCache**: 4 hour on-disk snapshot of a discovery
//! - **IndexPatternCache**: 24 hour on-disk snapshot of an environment's index patterns
//!
//! # Architecture
//!
//! ```text
//! IndexCache.get()
//!        ↓ stale / missing
//! IndexDiscovery.fetch() → Backend.discover(pattern, now-90d, now)
//!        ↓
//! [turbo-2024.01.03, turbo-2024.01.02, ...]  (name descending)
//! ```

pub mod discovery;
mod error;
mod patterns;

pub use discovery::IndexDiscovery;
pub use error::DiscoveryError;
pub use patterns::IndexPatternListing;

use crate::backend::Backend;
use crate::cache::{safe_filename, SnapshotCache};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How long a discovered index list stays valid
pub const INDEX_CACHE_EXPIRY_HOURS: i64 = 4;

/// How long an environment's index pattern list stays valid
pub const PATTERN_CACHE_EXPIRY_HOURS: i64 = 24;

/// One discovered time-partitioned index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Index name (e.g., "turbo-2024.01.03")
    pub name: String,
    /// Earliest `@timestamp` in the index, epoch millis
    pub min_timestamp: i64,
    /// Latest `@timestamp` in the index, epoch millis
    pub max_timestamp: i64,
}

impl IndexMeta {
    pub fn new(name: impl Into<String>, min_timestamp: i64, max_timestamp: i64) -> Self {
        Self {
            name: name.into(),
            min_timestamp,
            max_timestamp,
        }
    }
}

/// Cached discovery of one index pattern
pub type IndexCache = SnapshotCache<IndexDiscovery>;

/// Cached listing of one environment's index patterns
pub type IndexPatternCache = SnapshotCache<IndexPatternListing>;

/// Cache file for the indices behind `pattern` on the backend at `url`
pub fn index_cache_path(data_dir: &Path, url: &str, pattern: &str) -> PathBuf {
    data_dir.join(format!(
        "{}.index_cache.json",
        safe_filename(&format!("{}_{}", url, pattern))
    ))
}

/// Cache file for an environment's index patterns
pub fn pattern_cache_path(data_dir: &Path, environment: &str) -> PathBuf {
    data_dir.join(format!("{}.cache", safe_filename(environment)))
}

/// Open the 4 hour index cache for `pattern`
pub fn open_index_cache(
    data_dir: &Path,
    url: &str,
    pattern: &str,
    backend: Arc<dyn Backend>,
) -> IndexCache {
    SnapshotCache::open(
        index_cache_path(data_dir, url, pattern),
        Duration::hours(INDEX_CACHE_EXPIRY_HOURS),
        IndexDiscovery::new(backend, pattern),
    )
}

/// Open the 24 hour index pattern cache for `environment`
pub fn open_pattern_cache(
    data_dir: &Path,
    environment: &str,
    backend: Arc<dyn Backend>,
) -> IndexPatternCache {
    SnapshotCache::open(
        pattern_cache_path(data_dir, environment),
        Duration::hours(PATTERN_CACHE_EXPIRY_HOURS),
        IndexPatternListing::new(backend, environment),
    )
}
