//! Query error types
//!
//! Defines the error conditions of one-shot queries and of the follow loop.

use crate::backend::BackendError;
use crate::index::DiscoveryError;
use thiserror::Error;

/// Errors that can occur while running a query
#[derive(Error, Debug)]
pub enum QueryError {
    /// A per-index search failed
    #[error("Query against index {index} failed: {source}")]
    Search {
        index: String,
        #[source]
        source: BackendError,
    },

    /// The index list could not be refreshed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// There is nothing to query
    #[error("No indices match {0}")]
    NoIndices(String),
}

impl QueryError {
    /// Raw response body behind this error, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Search { source, .. } => source.body(),
            Self::Discovery(e) => e.body(),
            Self::NoIndices(_) => None,
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// The follow loop only ever stops with an error
#[derive(Error, Debug)]
pub enum FollowError {
    #[error("Giving up after {attempts} consecutive failed attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: QueryError,
    },

    /// Records could not be written out
    #[error("Writing records failed: {0}")]
    Sink(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::Search {
            index: "turbo-2024.01.01".to_string(),
            source: BackendError::Search {
                message: "shard failure".to_string(),
                body: "{}".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Query against index turbo-2024.01.01 failed: Search failed: shard failure"
        );
        assert_eq!(err.body(), Some("{}"));
    }

    #[test]
    fn test_follow_error_display() {
        let err = FollowError::RetriesExhausted {
            attempts: 10,
            last: QueryError::NoIndices("turbo-*".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Giving up after 10 consecutive failed attempts: No indices match turbo-*"
        );
    }
}
