//! Wall-clock helpers.
//!
//! Persisted records carry timestamps as fractional unix seconds; store keys
//! carry them as zero-padded microseconds so lexical order is time order.

use chrono::{SecondsFormat, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as fractional seconds since the unix epoch.
#[must_use]
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Current time as an RFC 3339 string with microsecond precision.
#[must_use]
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Sortable key fragment for a unix timestamp.
#[must_use]
pub fn key_stamp(unix_secs: f64) -> String {
    format!("{:020}", (unix_secs * 1_000_000.0) as u64)
}
