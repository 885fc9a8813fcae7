//! Snapshot cache error types
//!
//! Cache errors never fail a lookup: a snapshot that cannot be read or
//! written only costs a re-discovery.

use thiserror::Error;

/// Errors that can occur when reading or writing a persisted snapshot
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Result type alias for cache persistence
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));
        assert_eq!(cache_err.to_string(), "IO error: denied");
    }
}
