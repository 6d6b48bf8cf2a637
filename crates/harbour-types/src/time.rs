//! Record timestamps.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Returns the current time, strictly increasing across calls in this
/// process at microsecond resolution.
///
/// Two records created by the same process therefore never share a `when`,
/// even if the wall clock stalls or steps backwards.
pub fn monotonic_now() -> DateTime<Utc> {
    let wall = Utc::now().timestamp_micros();
    let mut prev = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(prev.saturating_add(1));
        match LAST_MICROS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
            Err(actual) => prev = actual,
        }
    }
}

/// Formats a timestamp as fixed-width RFC 3339 with microseconds and a `Z`
/// suffix, so that string order equals chronological order.
pub fn to_sortable(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses an RFC 3339 timestamp, or a naive ISO 8601 date-time which is
/// taken to be UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimestampError(s.to_string()))
}

/// Error returned for a string that is not a recognised timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed timestamp: {0}")]
pub struct TimestampError(pub String);
