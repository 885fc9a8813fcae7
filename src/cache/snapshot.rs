//! TTL Snapshot Cache
//!
//! Holds the last successful result of an expensive lookup together with the
//! time it was fetched, persisted to a single JSON file.
//!
//! # Lifecycle
//!
//! ```text
//! open()  → load file (missing: cold, corrupt: warn + cold)
//! get()   → fresh?  yes → cached data, no I/O
//!                   no  → source.fetch() → ok  → new snapshot → flush (tmp + rename)
//!                                        → err → propagate, old snapshot kept
//! ```

use crate::cache::error::{CacheError, CacheResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Something whose result is worth caching
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// What gets cached
    type Data: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Why a fetch failed
    type Error: std::error::Error + Send + Sync + 'static;

    /// Human-readable description for log lines
    fn describe(&self) -> String;

    /// Perform the lookup
    async fn fetch(&self) -> Result<Self::Data, Self::Error>;
}

/// A timestamped cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// When the data was fetched
    pub fetched_at: DateTime<Utc>,
    /// The cached data
    pub data: T,
}

impl<T> Snapshot<T> {
    pub fn new(fetched_at: DateTime<Utc>, data: T) -> Self {
        Self { fetched_at, data }
    }

    /// Whether this snapshot is still valid at `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        now < self.fetched_at + expiry
    }
}

/// Persisted snapshot cache with a fixed expiry
pub struct SnapshotCache<S: SnapshotSource> {
    path: PathBuf,
    expiry: Duration,
    source: S,
    snapshot: Option<Snapshot<S::Data>>,
}

impl<S: SnapshotSource> SnapshotCache<S> {
    /// Open the cache stored at `path`
    ///
    /// Never fails: an unreadable snapshot is logged and the cache starts cold.
    pub fn open(path: impl Into<PathBuf>, expiry: Duration, source: S) -> Self {
        let path = path.into();
        let snapshot = match load_snapshot(&path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable cache");
                None
            }
        };

        Self {
            path,
            expiry,
            source,
            snapshot,
        }
    }

    /// Whether cached data exists and has not expired
    pub fn has_fresh_cache(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Whether cached data exists and is valid at `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot
            .as_ref()
            .map(|s| s.is_fresh_at(now, self.expiry))
            .unwrap_or(false)
    }

    /// Get the data, fetching it if the cache is stale, empty or `force` is set
    pub async fn get(&mut self, force: bool) -> Result<S::Data, S::Error> {
        self.get_at(force, Utc::now()).await
    }

    /// `get` against an explicit clock reading
    pub async fn get_at(&mut self, force: bool, now: DateTime<Utc>) -> Result<S::Data, S::Error> {
        if !force {
            if let Some(snapshot) = self.snapshot.as_ref().filter(|s| s.is_fresh_at(now, self.expiry)) {
                tracing::debug!(source = %self.source.describe(), "Using cached snapshot");
                return Ok(snapshot.data.clone());
            }
        }

        tracing::info!(source = %self.source.describe(), force, "Fetching fresh snapshot");
        let data = self.source.fetch().await?;

        self.snapshot = Some(Snapshot::new(now, data.clone()));
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "Caching snapshot failed");
        }

        Ok(data)
    }

    /// Persist the current snapshot
    ///
    /// Writes a sibling temp file and renames it over the target, so a
    /// failed write leaves the previous snapshot intact.
    pub fn flush(&self) -> CacheResult<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(snapshot)?;
        write_atomic(&self.path, &bytes)
    }

    /// Current snapshot, fresh or not
    pub fn snapshot(&self) -> Option<&Snapshot<S::Data>> {
        self.snapshot.as_ref()
    }

    /// Location of the persisted snapshot
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying source
    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Read a snapshot file; a missing file is `Ok(None)`
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> CacheResult<Option<Snapshot<T>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::Io(e)),
    };

    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let written = write_file(&tmp, bytes);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
