//! Query Engine
//!
//! Turns a [`QuerySpec`] into backend requests and results:
//!
//! - **Builder**: one multi-search request per index
//! - **Executor**: scans ordered indices within a result budget
//! - **Follower**: polls the newest index behind a moving cursor
//!
//! # Examples
//!
//! ## One-shot query
//!
//! ```rust,ignore
//! use ax::query::{QueryExecutor, QuerySpec, QueryFilter};
//!
//! let spec = QuerySpec::new("error")
//!     .filter(QueryFilter::new("service", "api"))
//!     .select(["message", "level"])
//!     .limit(150);
//!
//! let indices = cache.get(false).await?;
//! let records = QueryExecutor::new(backend).run(&indices, &spec).await?;
//! ```
//!
//! ## Tailing
//!
//! ```rust,ignore
//! let mut follower = Follower::new(cache, QueryExecutor::new(backend), spec);
//! follower.run(|record| print(record)).await?;
//! ```

pub mod builder;
mod error;
mod executor;
mod follow;
mod record;
mod spec;
mod time;

pub use error::{FollowError, QueryError, QueryResult};
pub use executor::{sort_records, QueryExecutor, ScanPolicy};
pub use follow::{FollowConfig, Follower};
pub use record::{latest_timestamp, LogRecord, TIMESTAMP_FIELD};
pub use spec::{
    build_filters, parse_max_results, QueryFilter, QuerySpec, RangeMode, DEFAULT_MAX_RESULTS,
    MATCH_ALL,
};
pub use time::{parse_time, parse_time_at};
