//! In-memory backend for unit tests

use crate::backend::{Backend, BackendError, BackendResult};
use crate::index::{DiscoveryError, IndexMeta};
use crate::query::{LogRecord, QuerySpec, RangeMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted backend: fixed indices, per-index documents, injectable failures
#[derive(Default)]
pub struct ScriptedBackend {
    pub indices: Mutex<Vec<IndexMeta>>,
    pub documents: Mutex<HashMap<String, Vec<LogRecord>>>,
    pub failing: Mutex<HashSet<String>>,
    pub fail_all: AtomicBool,
    pub searches: Mutex<Vec<(String, QuerySpec)>>,
    pub discover_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index holding `records`
    pub fn with_index(self, name: &str, records: Vec<LogRecord>) -> Self {
        self.push_index(name, records);
        self
    }

    pub fn push_index(&self, name: &str, records: Vec<LogRecord>) {
        let millis: Vec<i64> = records
            .iter()
            .filter_map(|r| r.timestamp())
            .map(|t| t.timestamp_millis())
            .collect();
        let meta = IndexMeta::new(
            name,
            millis.iter().copied().min().unwrap_or(0),
            millis.iter().copied().max().unwrap_or(0),
        );
        self.indices.lock().unwrap().push(meta);
        self.documents
            .lock()
            .unwrap()
            .insert(name.to_string(), records);
    }

    /// Append records to an existing index
    pub fn append(&self, name: &str, records: Vec<LogRecord>) {
        self.documents
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .extend(records);
    }

    pub fn fail_index(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Indices searched so far, in call order
    pub fn searched(&self) -> Vec<String> {
        self.searches
            .lock()
            .unwrap()
            .iter()
            .map(|(index, _)| index.clone())
            .collect()
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    fn matches(record: &LogRecord, spec: &QuerySpec) -> bool {
        let Some(ts) = record.timestamp() else {
            return spec.after.is_none() && spec.before.is_none();
        };
        let after_ok = match (spec.after, spec.range_mode) {
            (None, _) => true,
            (Some(after), RangeMode::Inclusive) => ts >= after,
            (Some(after), RangeMode::ExclusiveLower) => ts > after,
        };
        let before_ok = spec.before.map_or(true, |before| ts <= before);
        after_ok && before_ok
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn discover(
        &self,
        pattern: &str,
        _after: DateTime<Utc>,
        _before: DateTime<Utc>,
    ) -> Result<Vec<IndexMeta>, DiscoveryError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DiscoveryError::new(
                pattern,
                BackendError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                },
            ));
        }
        Ok(self.indices.lock().unwrap().clone())
    }

    async fn search(&self, index: &str, spec: &QuerySpec) -> BackendResult<Vec<LogRecord>> {
        self.searches
            .lock()
            .unwrap()
            .push((index.to_string(), spec.clone()));

        if self.fail_all.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(index) {
            return Err(BackendError::Status {
                status: 500,
                body: format!("{index} is broken"),
            });
        }

        let mut hits: Vec<LogRecord> = self
            .documents
            .lock()
            .unwrap()
            .get(index)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| Self::matches(r, spec))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by_key(|r| r.timestamp());
        if !spec.query_ascending {
            hits.reverse();
        }
        hits.truncate(spec.max_results);
        Ok(hits)
    }

    async fn list_index_patterns(&self) -> BackendResult<Vec<String>> {
        Ok(vec!["turbo-*".to_string()])
    }
}
