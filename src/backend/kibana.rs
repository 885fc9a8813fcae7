//! Kibana REST Client
//!
//! Talks to Elasticsearch through Kibana's proxy endpoints:
//!
//! ```text
//! POST {url}/elasticsearch/{pattern}/_field_stats?level=indices   discovery
//! POST {url}/elasticsearch/_msearch                               search (NDJSON)
//! POST {url}/es_admin/.kibana/index-pattern/_search               index patterns
//! HEAD {url}/app/kibana                                           version detection
//! ```

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::Backend;
use crate::index::{discovery, DiscoveryError, IndexMeta};
use crate::query::{builder, LogRecord, QuerySpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const NDJSON: &str = "application/x-ldjson";
const JSON: &str = "application/json";
const VERSION_HEADER: &str = "kbn-version";

/// Connection settings for a Kibana instance
#[derive(Debug, Clone)]
pub struct KibanaConfig {
    /// Base URL (e.g., "https://kibana.example.com")
    pub base_url: String,
    /// Value for the `Authorization` header, passed through verbatim
    pub auth_header: String,
    /// Value for the `kbn-version` header
    pub kibana_version: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for KibanaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5601".to_string(),
            auth_header: String::new(),
            kibana_version: String::new(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Kibana-proxied Elasticsearch backend
pub struct KibanaBackend {
    client: Client,
    config: KibanaConfig,
    headers: HeaderMap,
}

impl KibanaBackend {
    /// Create a new client with the given configuration
    ///
    /// Fails when the auth header or version cannot be sent as a header value.
    pub fn new(mut config: KibanaConfig) -> BackendResult<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let headers = request_headers(&config)?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            config,
            headers,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &KibanaConfig {
        &self.config
    }

    /// Ask Kibana for its version when none was configured
    ///
    /// Failure is not fatal; requests then go out with an empty version.
    pub async fn detect_version(&mut self) {
        if !self.config.kibana_version.is_empty() {
            return;
        }

        let url = format!("{}/app/kibana", self.config.base_url);
        match self.client.head(&url).headers(self.headers.clone()).send().await {
            Ok(response) => {
                if let Some(value) = response.headers().get(VERSION_HEADER) {
                    if let Ok(version) = value.to_str() {
                        tracing::debug!(version, "Detected Kibana version");
                        self.config.kibana_version = version.to_string();
                        self.headers.insert(VERSION_HEADER, value.clone());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not detect Kibana version");
            }
        }
    }

    /// POST `body` and return the response text, failing on non-success status
    async fn post(&self, url: &str, body: String, content_type: &'static str) -> BackendResult<String> {
        tracing::trace!(url, body = %body, "POST");

        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl Backend for KibanaBackend {
    async fn discover(
        &self,
        pattern: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<IndexMeta>, DiscoveryError> {
        let url = format!(
            "{}/elasticsearch/{}/_field_stats?level=indices",
            self.config.base_url,
            encode_index_path(pattern)
        );
        let request = discovery::field_stats_request(after, before);

        let body = self
            .post(&url, request.to_string(), NDJSON)
            .await
            .map_err(|e| DiscoveryError::new(pattern, e))?;

        discovery::parse_field_stats(&body).map_err(|e| DiscoveryError::new(pattern, e))
    }

    async fn search(&self, index: &str, spec: &QuerySpec) -> BackendResult<Vec<LogRecord>> {
        let url = format!("{}/elasticsearch/_msearch", self.config.base_url);
        let request = builder::build(index, spec);

        let body = self.post(&url, request.to_ndjson()?, NDJSON).await?;
        parse_msearch_response(&body)
    }

    async fn list_index_patterns(&self) -> BackendResult<Vec<String>> {
        let url = format!(
            "{}/es_admin/.kibana/index-pattern/_search?stored_fields=",
            self.config.base_url
        );
        let request = json!({
            "query": { "match_all": {} },
            "size": 10000,
        });

        let body = self.post(&url, request.to_string(), JSON).await?;
        parse_index_pattern_response(&body)
    }
}

/// Headers sent with every request
fn request_headers(config: &KibanaConfig) -> BackendResult<HeaderMap> {
    let header_value = |name: &str, value: &str| {
        HeaderValue::from_str(value).map_err(|e| BackendError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        })
    };

    let mut headers = HeaderMap::new();
    if !config.auth_header.is_empty() {
        headers.insert(AUTHORIZATION, header_value("Authorization", &config.auth_header)?);
    }
    headers.insert(VERSION_HEADER, header_value(VERSION_HEADER, &config.kibana_version)?);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    Ok(headers)
}

/// Percent-encode an index pattern for use as a path segment, keeping
/// wildcards and comma-separated lists intact
fn encode_index_path(pattern: &str) -> String {
    urlencoding::encode(pattern)
        .replace("%2A", "*")
        .replace("%2C", ",")
}

// ============================================
// Response DTOs
// ============================================

#[derive(Debug, Deserialize)]
struct MultiSearchResponse {
    #[serde(default)]
    responses: Vec<SearchResponse>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Option<Hits>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct IndexPatternResponse {
    hits: IndexPatternHits,
}

#[derive(Debug, Deserialize)]
struct IndexPatternHits {
    #[serde(default)]
    hits: Vec<IndexPatternHit>,
}

#[derive(Debug, Deserialize)]
struct IndexPatternHit {
    #[serde(rename = "_id")]
    id: String,
}

fn decode<'a, T: Deserialize<'a>>(body: &'a str) -> BackendResult<T> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode {
        message: e.to_string(),
        body: body.to_string(),
    })
}

/// Extract the documents of the first (and only) response of a multi-search
pub fn parse_msearch_response(body: &str) -> BackendResult<Vec<LogRecord>> {
    let data: MultiSearchResponse = decode(body)?;

    let response = data
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Decode {
            message: "multi-search response contains no responses".to_string(),
            body: body.to_string(),
        })?;

    if let Some(error) = response.error {
        let message = error
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(BackendError::Search {
            message,
            body: body.to_string(),
        });
    }

    Ok(response
        .hits
        .map(|hits| hits.hits)
        .unwrap_or_default()
        .into_iter()
        .map(|hit| LogRecord::new(hit.source))
        .collect())
}

fn parse_index_pattern_response(body: &str) -> BackendResult<Vec<String>> {
    let data: IndexPatternResponse = decode(body)?;
    Ok(data.hits.hits.into_iter().map(|hit| hit.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KibanaConfig::default();
        assert_eq!(config.base_url, "http://localhost:5601");
        assert!(config.auth_header.is_empty());
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let backend = KibanaBackend::new(KibanaConfig {
            base_url: "https://kibana.example.com/".to_string(),
            ..KibanaConfig::default()
        })
        .unwrap();
        assert_eq!(backend.config().base_url, "https://kibana.example.com");
    }

    #[test]
    fn test_auth_headers_pass_through() {
        let backend = KibanaBackend::new(KibanaConfig {
            auth_header: "Basic dXNlcjpwYXNz".to_string(),
            kibana_version: "5.2.2".to_string(),
            ..KibanaConfig::default()
        })
        .unwrap();

        assert_eq!(backend.headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
        assert_eq!(backend.headers[VERSION_HEADER], "5.2.2");
    }

    #[test]
    fn test_empty_auth_header_is_omitted() {
        let backend = KibanaBackend::new(KibanaConfig::default()).unwrap();
        assert!(backend.headers.get(AUTHORIZATION).is_none());
        assert_eq!(backend.headers[VERSION_HEADER], "");
    }

    #[test]
    fn test_invalid_header_values_are_rejected() {
        let err = KibanaBackend::new(KibanaConfig {
            auth_header: "Basic a\nb".to_string(),
            ..KibanaConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, BackendError::InvalidHeader { ref name, .. } if name == "Authorization"));
        assert_eq!(err.body(), None);

        let err = KibanaBackend::new(KibanaConfig {
            kibana_version: "5.2\r\n".to_string(),
            ..KibanaConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, BackendError::InvalidHeader { ref name, .. } if name == VERSION_HEADER));
    }

    #[test]
    fn test_encode_index_path() {
        assert_eq!(encode_index_path("turbo-*"), "turbo-*");
        assert_eq!(encode_index_path("a-*,b-*"), "a-*,b-*");
        assert_eq!(encode_index_path("logs/x"), "logs%2Fx");
    }

    #[test]
    fn test_parse_msearch_hits() {
        let body = r#"{"responses":[{"hits":{"total":2,"hits":[
            {"_id":"1","_source":{"@timestamp":"2024-01-01T00:00:02Z","message":"b"}},
            {"_id":"2","_source":{"@timestamp":"2024-01-01T00:00:01Z","message":"a"}}
        ]}}]}"#;

        let records = parse_msearch_response(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("message"), Some(&json!("b")));
        assert_eq!(records[1].get("message"), Some(&json!("a")));
    }

    #[test]
    fn test_parse_msearch_error_entry() {
        let body = r#"{"responses":[{"error":{"type":"search_phase_execution_exception","reason":"all shards failed"},"status":400}]}"#;

        let err = parse_msearch_response(body).unwrap_err();
        match err {
            BackendError::Search { message, body: raw } => {
                assert_eq!(message, "all shards failed");
                assert_eq!(raw, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_msearch_garbage() {
        let err = parse_msearch_response("<html>502</html>").unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
        assert_eq!(err.body(), Some("<html>502</html>"));

        let err = parse_msearch_response(r#"{"responses":[]}"#).unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
    }

    #[test]
    fn test_parse_index_patterns() {
        let body = r#"{"hits":{"hits":[{"_id":"turbo-*"},{"_id":"nginx-*"}]}}"#;
        assert_eq!(
            parse_index_pattern_response(body).unwrap(),
            vec!["turbo-*", "nginx-*"]
        );
    }
}
