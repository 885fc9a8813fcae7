//! Snapshot Caching
//!
//! Expensive backend lookups (which indices exist, which index patterns an
//! environment defines) change slowly, so their results are cached on disk
//! with a staleness window:
//!
//! - **SnapshotCache**: one persisted snapshot plus an expiry
//! - **SnapshotSource**: the lookup the cache delegates to on a miss
//!
//! Cache failures are never fatal; the worst case is a cold cache.

mod error;
mod snapshot;

pub use error::{CacheError, CacheResult};
pub use snapshot::{load_snapshot, Snapshot, SnapshotCache, SnapshotSource};

/// Make an arbitrary string safe to use as a file name
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
