//! Index pattern listing
//!
//! The set of index patterns defined for an environment. Changes rarely, so it
//! is cached for a day.

use crate::backend::{Backend, BackendError};
use crate::cache::SnapshotSource;
use async_trait::async_trait;
use std::sync::Arc;

/// Lists the index patterns configured in the backend
pub struct IndexPatternListing {
    backend: Arc<dyn Backend>,
    environment: String,
}

impl IndexPatternListing {
    pub fn new(backend: Arc<dyn Backend>, environment: impl Into<String>) -> Self {
        Self {
            backend,
            environment: environment.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for IndexPatternListing {
    type Data = Vec<String>;
    type Error = BackendError;

    fn describe(&self) -> String {
        format!("index patterns of {}", self.environment)
    }

    async fn fetch(&self) -> Result<Vec<String>, BackendError> {
        let mut patterns = self.backend.list_index_patterns().await?;
        patterns.sort();
        Ok(patterns)
    }
}
