//! Result records
//!
//! A `LogRecord` is one schemaless document returned by the backend. The only
//! field the engine interprets is `@timestamp`, used for ordering and for the
//! follow cursor.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field every record carries and every query sorts on
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// A single log document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

impl LogRecord {
    /// Wrap an already-decoded JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from a JSON value; non-objects yield `None`
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Builder method: set a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// All fields in document order
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Raw `@timestamp` value
    pub fn raw_timestamp(&self) -> Option<&Value> {
        self.0.get(TIMESTAMP_FIELD)
    }

    /// Parsed `@timestamp`
    ///
    /// Accepts RFC 3339 strings (the backend's default rendering) and
    /// numeric epoch milliseconds.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.raw_timestamp()? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        }
    }

    /// Keep only `fields`, plus `@timestamp`
    ///
    /// An empty field list returns the record unchanged. Selected fields the
    /// record lacks are present as `null`.
    pub fn project(self, fields: &[String]) -> Self {
        if fields.is_empty() {
            return self;
        }

        let mut projected = Map::new();
        if let Some(ts) = self.0.get(TIMESTAMP_FIELD) {
            projected.insert(TIMESTAMP_FIELD.to_string(), ts.clone());
        }
        for field in fields {
            let value = self.0.get(field).cloned().unwrap_or(Value::Null);
            projected.insert(field.clone(), value);
        }
        Self(projected)
    }
}

/// Latest timestamp among `records`, ignoring records without a parseable one
pub fn latest_timestamp<'a, I>(records: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    records.into_iter().filter_map(LogRecord::timestamp).max()
}
