//! Parsing of the `grpc-timeout` request header.
//!
//! The header carries `<digits><unit>` where the unit is one of `n`
//! (nanoseconds), `u` (microseconds), `m` (milliseconds), `S` (seconds),
//! `M` (minutes) or `H` (hours). Values are converted to whole milliseconds,
//! truncating sub-millisecond precision.

use std::num::ParseIntError;

use thiserror::Error;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;

/// Error returned when a timeout header carries a malformed numeric prefix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid timeout value {value:?}")]
pub struct TimeoutError {
    value: String,
    #[source]
    source: ParseIntError,
}

impl TimeoutError {
    /// The raw header value that failed to parse.
    #[must_use]
    pub fn value(&self) -> &str { &self.value }
}

/// Parse a timeout header value into milliseconds.
///
/// Returns `Ok(None)` when the value is empty, contains the literal `null`,
/// or ends in an unknown unit. Sub-millisecond units truncate toward zero and
/// large minute/hour values saturate at `u64::MAX`.
///
/// ```
/// use tricall::timeout::parse_timeout_millis;
///
/// assert_eq!(parse_timeout_millis("3S"), Ok(Some(3_000)));
/// assert_eq!(parse_timeout_millis("1500u"), Ok(Some(1)));
/// assert_eq!(parse_timeout_millis("10x"), Ok(None));
/// ```
///
/// # Errors
///
/// Returns [`TimeoutError`] if the digits before the unit do not form an
/// unsigned integer.
pub fn parse_timeout_millis(raw: &str) -> Result<Option<u64>, TimeoutError> {
    if raw.is_empty() || raw.contains("null") {
        return Ok(None);
    }
    let Some(unit) = raw.chars().next_back() else {
        return Ok(None);
    };
    let digits = &raw[..raw.len() - unit.len_utf8()];
    let value: u64 = digits.parse().map_err(|source| TimeoutError {
        value: raw.to_owned(),
        source,
    })?;
    let millis = match unit {
        'n' => value / 1_000_000,
        'u' => value / 1_000,
        'm' => value,
        'S' => value.saturating_mul(MILLIS_PER_SECOND),
        'M' => value.saturating_mul(MILLIS_PER_MINUTE),
        'H' => value.saturating_mul(MILLIS_PER_HOUR),
        _ => return Ok(None),
    };
    Ok(Some(millis))
}
