//! End-to-end tests of discovery caching, budgeted queries and follow mode
//! against an in-memory backend.

use ax::backend::{Backend, BackendError, BackendResult};
use ax::index::{open_index_cache, DiscoveryError, IndexMeta};
use ax::query::{FollowConfig, FollowError, Follower, LogRecord, QueryExecutor, QuerySpec, RangeMode};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0).unwrap() + Duration::seconds(secs)
}

fn record(secs: i64, message: &str) -> LogRecord {
    LogRecord::default()
        .field("@timestamp", at(secs).to_rfc3339())
        .field("message", message)
        .field("host", "web-1")
}

/// Daily indices kept in memory; counts discover and search calls
#[derive(Default)]
struct MemoryBackend {
    indices: Mutex<BTreeMap<String, Vec<LogRecord>>>,
    discoveries: AtomicUsize,
    searches: AtomicUsize,
    down: Mutex<bool>,
}

impl MemoryBackend {
    fn insert(&self, index: &str, records: Vec<LogRecord>) {
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .extend(records);
    }

    fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    fn outage(&self) -> BackendError {
        BackendError::Status {
            status: 502,
            body: "<html>Bad Gateway</html>".to_string(),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn discover(
        &self,
        pattern: &str,
        _after: DateTime<Utc>,
        _before: DateTime<Utc>,
    ) -> Result<Vec<IndexMeta>, DiscoveryError> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() {
            return Err(DiscoveryError::new(pattern, self.outage()));
        }
        // Names descending: newest day first
        Ok(self
            .indices
            .lock()
            .unwrap()
            .keys()
            .rev()
            .map(|name| IndexMeta::new(name.clone(), 0, 0))
            .collect())
    }

    async fn search(&self, index: &str, spec: &QuerySpec) -> BackendResult<Vec<LogRecord>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() {
            return Err(self.outage());
        }

        let mut hits: Vec<LogRecord> = self
            .indices
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| {
                let ts = r.timestamp().unwrap();
                let lower = match (spec.after, spec.range_mode) {
                    (None, _) => true,
                    (Some(a), RangeMode::Inclusive) => ts >= a,
                    (Some(a), RangeMode::ExclusiveLower) => ts > a,
                };
                lower && spec.before.map_or(true, |b| ts <= b)
            })
            .collect();

        hits.sort_by_key(|r| r.timestamp());
        if spec.backend_order() == "desc" {
            hits.reverse();
        }
        hits.truncate(spec.max_results);
        Ok(hits)
    }

    async fn list_index_patterns(&self) -> BackendResult<Vec<String>> {
        Ok(vec!["logs-*".to_string()])
    }
}

fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::default());
    for (day, base) in [("logs-2024.01.01", 0), ("logs-2024.01.02", 1_000), ("logs-2024.01.03", 2_000)] {
        backend.insert(
            day,
            (0..100).map(|i| record(base + i, &format!("{day} #{i}"))).collect(),
        );
    }
    backend
}

#[tokio::test]
async fn test_discovery_is_cached_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();

    let mut cache = open_index_cache(dir.path(), "http://kibana", "logs-*", backend.clone());
    let indices = cache.get(false).await.unwrap();
    assert_eq!(indices[0].name, "logs-2024.01.03");
    assert_eq!(backend.discoveries.load(Ordering::SeqCst), 1);

    // A second process reading the same file does not rediscover
    let mut reopened = open_index_cache(dir.path(), "http://kibana", "logs-*", backend.clone());
    assert!(reopened.has_fresh_cache());
    assert_eq!(reopened.get(false).await.unwrap(), indices);
    assert_eq!(backend.discoveries.load(Ordering::SeqCst), 1);

    // Unless forced
    reopened.get(true).await.unwrap();
    assert_eq!(backend.discoveries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();

    let mut cache = open_index_cache(dir.path(), "http://kibana", "logs-*", backend.clone());
    let indices = cache.get(false).await.unwrap();

    backend.set_down(true);
    let err = cache.get(true).await.unwrap_err();
    assert_eq!(err.pattern, "logs-*");
    assert_eq!(err.body(), Some("<html>Bad Gateway</html>"));

    let reopened = open_index_cache(dir.path(), "http://kibana", "logs-*", backend.clone());
    assert_eq!(reopened.snapshot().unwrap().data, indices);
}

#[tokio::test]
async fn test_query_spends_budget_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();
    let mut cache = open_index_cache(dir.path(), "http://kibana", "logs-*", backend.clone());
    let indices = cache.get(false).await.unwrap();

    let spec = QuerySpec::new("*").limit(150).select(["message"]);
    let records = QueryExecutor::new(backend.clone())
        .run(&indices, &spec)
        .await
        .unwrap();

    assert_eq!(records.len(), 150);
    assert_eq!(backend.searches.load(Ordering::SeqCst), 2);
    // Chronological presentation: 50 newest of day 2, then all of day 3
    assert_eq!(records[0].timestamp(), Some(at(1_050)));
    assert_eq!(records[149].timestamp(), Some(at(2_099)));
    assert!(records.iter().all(|r| r.get("host").is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_follow_tails_then_gives_up_during_outage() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();
    let cache = open_index_cache(dir.path(), "http://kibana", "logs-*", backend.clone());
    let spec = QuerySpec::new("*").limit(10).follow(true);
    let mut follower = Follower::new(cache, QueryExecutor::new(backend.clone()), spec).config(FollowConfig {
        max_attempts: 4,
        ..FollowConfig::default()
    });

    let feeder = {
        let backend = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(6)).await;
            backend.insert("logs-2024.01.03", vec![record(3_000, "late arrival")]);
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            backend.set_down(true);
        })
    };

    let mut seen: Vec<String> = Vec::new();
    let err = follower
        .run(|r| {
            seen.push(r.get("message").and_then(|m| m.as_str()).unwrap_or_default().to_string());
            Ok(())
        })
        .await
        .unwrap_err();
    feeder.await.unwrap();

    // First poll: the 10 newest records of the newest index, then the late one
    assert_eq!(seen.len(), 11);
    assert_eq!(seen[0], "logs-2024.01.03 #90");
    assert_eq!(seen[9], "logs-2024.01.03 #99");
    assert_eq!(seen[10], "late arrival");
    assert_eq!(follower.cursor(), Some(at(3_000)));
    assert!(matches!(err, FollowError::RetriesExhausted { attempts: 4, .. }));
}
