//! # ax
//!
//! Command-line log querying for time-partitioned indices (one index per day
//! or period) stored behind Kibana/Elasticsearch.
//!
//! ## Features
//!
//! - **Index discovery**: finds the indices behind a pattern, cached on disk
//! - **Budgeted queries**: scans indices newest first until enough records are found
//! - **Follow mode**: tails new records behind a moving cursor, with retry and backoff
//! - **Environments**: named backend configurations in `ax.toml`
//!
//! ## Modules
//!
//! - [`backend`]: the `Backend` capability and its Kibana implementation
//! - [`cache`]: generic on-disk snapshot cache with expiry
//! - [`index`]: index discovery and the index caches
//! - [`query`]: query spec, request builder, executor and follow loop
//! - [`config`]: configuration file and runtime resolution
//! - [`output`]: record formatting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ax::backend::{Backend, KibanaBackend, KibanaConfig};
//! use ax::index::open_index_cache;
//! use ax::query::{QueryExecutor, QuerySpec};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend: Arc<dyn Backend> = Arc::new(KibanaBackend::new(KibanaConfig {
//!         base_url: "https://kibana.example.com".to_string(),
//!         ..KibanaConfig::default()
//!     })?);
//!
//!     let data_dir = ax::config::data_dir();
//!     let mut cache = open_index_cache(&data_dir, "https://kibana.example.com", "logs-*", backend.clone());
//!     let indices = cache.get(false).await?;
//!
//!     let spec = QuerySpec::new("error").limit(50);
//!     let records = QueryExecutor::new(backend).run(&indices, &spec).await?;
//!
//!     println!("Found {} records", records.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod index;
pub mod output;
pub mod query;

// Re-export top-level types for convenience
pub use backend::{Backend, BackendError, KibanaBackend, KibanaConfig};

pub use cache::{CacheError, SnapshotCache, SnapshotSource};

pub use index::{DiscoveryError, IndexCache, IndexDiscovery, IndexMeta};

pub use query::{
    FollowConfig, FollowError, Follower, LogRecord, QueryError, QueryExecutor, QueryFilter,
    QuerySpec, RangeMode, ScanPolicy,
};

pub use config::{Config, ConfigError, ConfigOverrides, LoggingConfig, RuntimeConfig};

pub use output::OutputFormat;
