//! Record Output
//!
//! Renders records on stdout in one of several formats:
//!
//! - **text**: `[timestamp] message key=value ...`, one line per record
//! - **json**: one document per line
//! - **json-pretty**: indented documents
//! - **yaml**: `---` separated documents
//!
//! Also computes the `--count-distinct` tally.

use crate::query::{LogRecord, TIMESTAMP_FIELD};
use clap::ValueEnum;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

const MESSAGE_FIELD: &str = "message";

/// Output format for records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
    Yaml,
}

/// Write one record in `format`
pub fn write_record<W: Write>(out: &mut W, record: &LogRecord, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", format_text(record)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, record)?;
            writeln!(out)
        }
        OutputFormat::JsonPretty => {
            serde_json::to_writer_pretty(&mut *out, record)?;
            writeln!(out)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(record)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            write!(out, "---\n{}", yaml)
        }
    }
}

/// Single-line rendering: timestamp, message, then the remaining fields
/// sorted by name with JSON-encoded values
pub fn format_text(record: &LogRecord) -> String {
    let mut line = String::new();

    if let Some(ts) = record.raw_timestamp() {
        line.push('[');
        line.push_str(&scalar(ts));
        line.push_str("] ");
    }
    if let Some(message) = record.get(MESSAGE_FIELD) {
        line.push_str(&scalar(message));
        line.push(' ');
    }

    let rest: BTreeMap<&String, &Value> = record
        .fields()
        .iter()
        .filter(|(k, _)| k.as_str() != TIMESTAMP_FIELD && k.as_str() != MESSAGE_FIELD)
        .collect();
    for (key, value) in rest {
        line.push_str(key);
        line.push('=');
        line.push_str(&value.to_string());
        line.push(' ');
    }

    line.truncate(line.trim_end().len());
    line
}

/// Strings bare, everything else as JSON
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One row of the count-distinct table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctCount {
    pub count: usize,
    /// The record without `@timestamp`, JSON encoded with sorted keys
    pub message: String,
}

/// Tally records that are identical apart from their timestamp
///
/// Sorted by count, descending; ties by message, ascending.
pub fn count_distinct(records: &[LogRecord]) -> Vec<DistinctCount> {
    let mut tally: HashMap<String, usize> = HashMap::new();
    for record in records {
        let fields: BTreeMap<&String, &Value> = record
            .fields()
            .iter()
            .filter(|(k, _)| k.as_str() != TIMESTAMP_FIELD)
            .collect();
        let key = serde_json::to_string(&fields).unwrap_or_default();
        *tally.entry(key).or_default() += 1;
    }

    let mut counts: Vec<DistinctCount> = tally
        .into_iter()
        .map(|(message, count)| DistinctCount { count, message })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
    counts
}

/// Write the count-distinct table
pub fn write_counts<W: Write>(out: &mut W, counts: &[DistinctCount]) -> io::Result<()> {
    writeln!(out, "{:>7}  Message", "Count")?;
    for row in counts {
        writeln!(out, "{:>7}  {}", row.count, row.message)?;
    }
    Ok(())
}
