//! Index Discovery
//!
//! Finds the time-partitioned indices behind an index pattern using a
//! field-statistics request on `@timestamp`. An index qualifies when its time
//! range overlaps the requested window:
//!
//! ```text
//! index.min <= before  AND  index.max >= after
//! ```
//!
//! Results are ordered by name, descending. With date-stamped names
//! (`turbo-2024.01.03`) that puts the most recent index first.

use crate::backend::{Backend, BackendError, BackendResult};
use crate::cache::SnapshotSource;
use crate::index::{DiscoveryError, IndexMeta};
use crate::query::TIMESTAMP_FIELD;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// How far back discovery looks
pub const DISCOVERY_LOOKBACK_DAYS: i64 = 90;

/// Body of the field-stats request for `[after, before]`
pub fn field_stats_request(after: DateTime<Utc>, before: DateTime<Utc>) -> Value {
    json!({
        "fields": [TIMESTAMP_FIELD],
        "index_constraints": {
            TIMESTAMP_FIELD: {
                "max_value": {
                    "gte": after.timestamp_millis(),
                    "format": "epoch_millis",
                },
                "min_value": {
                    "lte": before.timestamp_millis(),
                    "format": "epoch_millis",
                },
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct FieldStatsResponse {
    indices: HashMap<String, IndexFields>,
}

#[derive(Debug, Deserialize)]
struct IndexFields {
    #[serde(default)]
    fields: HashMap<String, FieldStats>,
}

#[derive(Debug, Deserialize)]
struct FieldStats {
    #[serde(default)]
    min_value: Value,
    #[serde(default)]
    max_value: Value,
}

/// Decode a field-stats response into ordered index metadata
pub fn parse_field_stats(body: &str) -> BackendResult<Vec<IndexMeta>> {
    let data: FieldStatsResponse = serde_json::from_str(body).map_err(|e| BackendError::Decode {
        message: e.to_string(),
        body: body.to_string(),
    })?;

    let mut indices: Vec<IndexMeta> = data
        .indices
        .into_iter()
        .map(|(name, index)| {
            let (min, max) = index
                .fields
                .get(TIMESTAMP_FIELD)
                .map(|stats| (epoch_millis(&stats.min_value), epoch_millis(&stats.max_value)))
                .unwrap_or((0, 0));
            IndexMeta::new(name, min, max)
        })
        .collect();

    sort_indices(&mut indices);
    Ok(indices)
}

/// Order indices by name, descending; equal names keep their relative order
pub fn sort_indices(indices: &mut [IndexMeta]) {
    indices.sort_by(|a, b| b.name.cmp(&a.name));
}

/// Field-stats bounds come back as epoch millis, occasionally as strings
fn epoch_millis(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            })
            .unwrap_or(0),
        _ => 0,
    }
}

/// Discovers the indices behind one pattern over a trailing window
pub struct IndexDiscovery {
    backend: Arc<dyn Backend>,
    pattern: String,
    lookback: Duration,
}

impl IndexDiscovery {
    pub fn new(backend: Arc<dyn Backend>, pattern: impl Into<String>) -> Self {
        Self {
            backend,
            pattern: pattern.into(),
            lookback: Duration::days(DISCOVERY_LOOKBACK_DAYS),
        }
    }

    /// Builder method: override the lookback window
    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Index pattern being discovered
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Discover indices overlapping `[after, before]`
    pub async fn discover(
        &self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<IndexMeta>, DiscoveryError> {
        let mut indices = self.backend.discover(&self.pattern, after, before).await?;
        sort_indices(&mut indices);
        tracing::debug!(pattern = %self.pattern, count = indices.len(), "Discovered indices");
        Ok(indices)
    }
}

#[async_trait]
impl SnapshotSource for IndexDiscovery {
    type Data = Vec<IndexMeta>;
    type Error = DiscoveryError;

    fn describe(&self) -> String {
        format!("indices matching {}", self.pattern)
    }

    async fn fetch(&self) -> Result<Vec<IndexMeta>, DiscoveryError> {
        let before = Utc::now();
        self.discover(before - self.lookback, before).await
    }
}
