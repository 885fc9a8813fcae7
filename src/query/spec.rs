//! Structural query description
//!
//! `QuerySpec` is what the CLI hands to the engine: free text, a time window,
//! field filters, projection and ordering. It is immutable per invocation; the
//! follow loop derives new specs from a base spec with `with_cursor`.

use crate::config::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default free-text query: match everything
pub const MATCH_ALL: &str = "*";

/// Default result budget
pub const DEFAULT_MAX_RESULTS: usize = 200;

/// Exact-phrase constraint on a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field_name: String,
    pub value: String,
}

impl QueryFilter {
    pub fn new(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: value.into(),
        }
    }

    /// Parse a `field:value` clause
    ///
    /// Only the first `:` separates field from value, so values may contain
    /// colons themselves.
    pub fn parse(clause: &str) -> Result<Self, ConfigError> {
        match clause.split_once(':') {
            Some((field, value)) => Ok(Self::new(field, value)),
            None => Err(ConfigError::InvalidFilter(clause.to_string())),
        }
    }
}

/// Parse every `--where` clause, failing on the first malformed one
pub fn build_filters<S: AsRef<str>>(wheres: &[S]) -> Result<Vec<QueryFilter>, ConfigError> {
    wheres
        .iter()
        .map(|clause| QueryFilter::parse(clause.as_ref()))
        .collect()
}

/// Parse a result budget; zero would never return anything
pub fn parse_max_results(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidLimit(value.to_string())),
    }
}

/// How `after`/`before` translate into range operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    /// `gte` / `lte`: one-shot queries
    #[default]
    Inclusive,
    /// `gt` / `lte`: follow mode, so the last-seen record is not returned again
    ExclusiveLower,
}

impl RangeMode {
    /// Operator used for the lower bound
    pub fn lower_operator(&self) -> &'static str {
        match self {
            Self::Inclusive => "gte",
            Self::ExclusiveLower => "gt",
        }
    }

    /// Operator used for the upper bound
    pub fn upper_operator(&self) -> &'static str {
        "lte"
    }
}

/// A complete query request
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Opaque free-text query passed through to the backend
    pub text: String,
    /// Lower time bound
    pub after: Option<DateTime<Utc>>,
    /// Upper time bound
    pub before: Option<DateTime<Utc>>,
    /// Field filters, all of which must match
    pub filters: Vec<QueryFilter>,
    /// Fields to keep in results (empty = all)
    pub select_fields: Vec<String>,
    /// Total number of records across all indices
    pub max_results: usize,
    /// Present results newest first
    pub sort_descending: bool,
    /// Ask the backend for the oldest matching records instead of the newest
    pub query_ascending: bool,
    /// Keep polling for new records
    pub follow: bool,
    /// Inclusive or exclusive lower bound
    pub range_mode: RangeMode,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            text: MATCH_ALL.to_string(),
            after: None,
            before: None,
            filters: Vec::new(),
            select_fields: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            sort_descending: false,
            query_ascending: false,
            follow: false,
            range_mode: RangeMode::Inclusive,
        }
    }
}

impl QuerySpec {
    /// Create a spec for free text; blank text becomes the match-all wildcard
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.trim().is_empty() {
            MATCH_ALL.to_string()
        } else {
            text
        };
        Self {
            text,
            ..Self::default()
        }
    }

    /// Builder method: lower time bound
    pub fn after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    /// Builder method: upper time bound
    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// Builder method: add a filter
    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Builder method: project onto these fields
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.select_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: result budget
    pub fn limit(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Builder method: present newest first
    pub fn descending(mut self, descending: bool) -> Self {
        self.sort_descending = descending;
        self
    }

    /// Builder method: follow mode
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Spec for the next follow cycle: everything strictly after `cursor`
    pub fn with_cursor(&self, cursor: Option<DateTime<Utc>>) -> Self {
        Self {
            after: cursor,
            before: None,
            range_mode: RangeMode::ExclusiveLower,
            ..self.clone()
        }
    }

    /// Same spec with a different result budget
    pub fn with_limit(&self, max_results: usize) -> Self {
        Self {
            max_results,
            ..self.clone()
        }
    }

    /// Sort direction requested from the backend
    pub fn backend_order(&self) -> &'static str {
        if self.query_ascending {
            "asc"
        } else {
            "desc"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_filters() {
        let filters = build_filters(&["level:error"]).unwrap();
        assert_eq!(filters, vec![QueryFilter::new("level", "error")]);
        assert_eq!(filters[0].field_name, "level");
        assert_eq!(filters[0].value, "error");
    }

    #[test]
    fn test_build_filters_rejects_missing_separator() {
        let err = build_filters(&["malformed"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFilter(ref c) if c == "malformed"));
    }

    #[test]
    fn test_filter_value_may_contain_colons() {
        let filter = QueryFilter::parse("url:http://example.com:8080").unwrap();
        assert_eq!(filter.field_name, "url");
        assert_eq!(filter.value, "http://example.com:8080");
    }

    #[test]
    fn test_parse_max_results() {
        assert_eq!(parse_max_results("1").unwrap(), 1);
        assert_eq!(parse_max_results("500").unwrap(), 500);
        for bad in ["0", "-5", "ten", ""] {
            let err = parse_max_results(bad).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidLimit(ref v) if v == bad));
        }
    }

    #[test]
    fn test_blank_text_matches_all() {
        assert_eq!(QuerySpec::new("  ").text, MATCH_ALL);
        assert_eq!(QuerySpec::new("status:500").text, "status:500");
    }

    #[test]
    fn test_with_cursor_switches_to_exclusive() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let base = QuerySpec::new("*").after(t0).before(t1).limit(50);

        let next = base.with_cursor(Some(t1));
        assert_eq!(next.after, Some(t1));
        assert_eq!(next.before, None);
        assert_eq!(next.range_mode, RangeMode::ExclusiveLower);
        assert_eq!(next.max_results, 50);
        // base is untouched
        assert_eq!(base.range_mode, RangeMode::Inclusive);
        assert_eq!(base.before, Some(t1));
    }

    #[test]
    fn test_range_operators() {
        assert_eq!(RangeMode::Inclusive.lower_operator(), "gte");
        assert_eq!(RangeMode::ExclusiveLower.lower_operator(), "gt");
        assert_eq!(RangeMode::ExclusiveLower.upper_operator(), "lte");
    }
}
