//! Query Builder
//!
//! Translates a `QuerySpec` into a multi-search request for a single index.
//! Pure: no I/O, no clock.
//!
//! # Request Shape
//!
//! ```text
//! {"index":["turbo-2024.01.03"],"ignore_unavailable":true}
//! {"size":200,"sort":[{"@timestamp":{"order":"desc","unmapped_type":"boolean"}}],
//!  "query":{"bool":{"must":[{"query_string":{...}},{"range":{...}},{"match":{...}}]}}}
//! ```

use crate::query::record::TIMESTAMP_FIELD;
use crate::query::spec::QuerySpec;
use serde_json::{json, Map, Value};

/// One header/body pair of a multi-search request
#[derive(Debug, Clone, PartialEq)]
pub struct MultiSearchRequest {
    pub header: Value,
    pub body: Value,
}

impl MultiSearchRequest {
    /// Encode as newline-delimited JSON, one document per line
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        encode_ndjson(&[&self.header, &self.body])
    }
}

/// Encode documents as newline-delimited JSON with a trailing newline
pub fn encode_ndjson(documents: &[&Value]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for doc in documents {
        out.push_str(&serde_json::to_string(doc)?);
        out.push('\n');
    }
    Ok(out)
}

/// Build the search request for `index`
///
/// `size` is `spec.max_results` verbatim; the executor is responsible for the
/// cross-index budget.
pub fn build(index: &str, spec: &QuerySpec) -> MultiSearchRequest {
    let header = json!({
        "index": [index],
        "ignore_unavailable": true,
    });

    let body = json!({
        "size": spec.max_results,
        "sort": [
            {
                TIMESTAMP_FIELD: {
                    "order": spec.backend_order(),
                    "unmapped_type": "boolean",
                }
            }
        ],
        "query": {
            "bool": {
                "must": must_clauses(spec),
            }
        },
    });

    MultiSearchRequest { header, body }
}

/// All clauses of the boolean query, combined with AND
fn must_clauses(spec: &QuerySpec) -> Vec<Value> {
    let mut clauses = vec![json!({
        "query_string": {
            "analyze_wildcard": true,
            "query": spec.text,
        }
    })];

    if let Some(range) = range_clause(spec) {
        clauses.push(range);
    }

    for filter in &spec.filters {
        let mut field = Map::new();
        field.insert(
            filter.field_name.clone(),
            json!({
                "query": filter.value,
                "type": "phrase",
            }),
        );
        clauses.push(json!({ "match": field }));
    }

    clauses
}

fn range_clause(spec: &QuerySpec) -> Option<Value> {
    if spec.after.is_none() && spec.before.is_none() {
        return None;
    }

    let mut bounds = Map::new();
    bounds.insert("format".to_string(), json!("epoch_millis"));
    if let Some(after) = spec.after {
        bounds.insert(
            spec.range_mode.lower_operator().to_string(),
            json!(after.timestamp_millis()),
        );
    }
    if let Some(before) = spec.before {
        bounds.insert(
            spec.range_mode.upper_operator().to_string(),
            json!(before.timestamp_millis()),
        );
    }

    Some(json!({
        "range": {
            TIMESTAMP_FIELD: Value::Object(bounds),
        }
    }))
}
