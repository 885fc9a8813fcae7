//! Index discovery error types

use crate::backend::BackendError;
use thiserror::Error;

/// The backend could not tell us which indices exist
#[derive(Error, Debug)]
#[error("Index discovery for {pattern} failed: {source}")]
pub struct DiscoveryError {
    /// Index pattern that was being discovered
    pub pattern: String,
    #[source]
    pub source: BackendError,
}

impl DiscoveryError {
    pub fn new(pattern: impl Into<String>, source: BackendError) -> Self {
        Self {
            pattern: pattern.into(),
            source,
        }
    }

    /// Raw response body, when the failure came from a response
    pub fn body(&self) -> Option<&str> {
        self.source.body()
    }
}
