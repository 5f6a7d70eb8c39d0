//! Time helpers for the Picker API.
//!
//! The Picker API encodes durations the way protobuf's `Duration` JSON mapping
//! does: a decimal number of seconds followed by a literal `s` (`"5s"`,
//! `"1800s"`, occasionally `"2.5s"`). Timestamps are RFC 3339 strings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

/// Maximum number of fractional digits a duration string may carry (nanoseconds).
const MAX_FRACTION_DIGITS: usize = 9;

/// Errors produced while parsing a picker duration string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    /// The string was empty (or only whitespace).
    #[error("duration string is empty")]
    Empty,

    /// The string did not end with the `s` unit.
    #[error("duration `{0}` is missing the trailing `s` unit")]
    MissingUnit(String),

    /// The numeric part was not a non-negative decimal number.
    #[error("duration `{0}` is not a valid number of seconds")]
    InvalidNumber(String),

    /// The duration does not fit in 64-bit milliseconds.
    #[error("duration `{0}` is out of range")]
    OutOfRange(String),
}

/// Parses a picker duration string such as `"5s"` into a [`Duration`].
pub fn parse_picker_duration(value: &str) -> Result<Duration, DurationParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let number = trimmed
        .strip_suffix('s')
        .ok_or_else(|| DurationParseError::MissingUnit(value.to_string()))?;

    let invalid = || DurationParseError::InvalidNumber(value.to_string());

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
        || fraction.len() > MAX_FRACTION_DIGITS
    {
        return Err(invalid());
    }

    let secs: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| DurationParseError::OutOfRange(value.to_string()))?
    };

    let nanos: u32 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = MAX_FRACTION_DIGITS)
            .parse()
            .map_err(|_| invalid())?
    };

    Ok(Duration::new(secs, nanos))
}

/// Parses a picker duration string into whole milliseconds.
///
/// `"5s"` yields `5000`, `"1800s"` yields `1_800_000`.
pub fn picker_duration_millis(value: &str) -> Result<u64, DurationParseError> {
    let duration = parse_picker_duration(value)?;
    u64::try_from(duration.as_millis()).map_err(|_| DurationParseError::OutOfRange(value.to_string()))
}

/// Parses an RFC 3339 timestamp into UTC, logging and discarding malformed input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| warn!(value, error = %e, "failed to parse timestamp"))
        .ok()
}
