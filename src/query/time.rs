//! Time expression parsing for `--after` / `--before`
//!
//! Supported forms:
//!
//! ```text
//! 2024-01-02T03:04:05Z        RFC 3339
//! 2024-01-02 03:04:05         naive, UTC
//! 2024-01-02T03:04:05         naive, UTC
//! 2024-01-02                  midnight UTC
//! 1704164645 / 1704164645678  unix seconds / milliseconds
//! now, now-15m, 2h            relative to now ("2h" means two hours ago)
//! ```

use crate::config::ConfigError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Unix timestamps above this are taken to be milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Parse a time expression relative to the current time
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, ConfigError> {
    parse_time_at(s, Utc::now())
}

/// Parse a time expression relative to `now`
pub fn parse_time_at(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidTime(s.to_string());

    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    if let Ok(ts) = s.parse::<i64>() {
        let parsed = if ts.abs() >= MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(ts).single()
        } else {
            Utc.timestamp_opt(ts, 0).single()
        };
        return parsed.ok_or_else(invalid);
    }

    let re = regex::Regex::new(r"^(?:now\s*-\s*)?(\d+)\s*([smhdw])$").map_err(|_| invalid())?;
    if let Some(caps) = re.captures(s) {
        let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
        let ago = match &caps[2] {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            "w" => Duration::try_weeks(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        return now.checked_sub_signed(ago).ok_or_else(invalid);
    }

    Err(invalid())
}
