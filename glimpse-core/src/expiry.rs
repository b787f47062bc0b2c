//! Parsing of user-supplied expiration values.
//!
//! Uploads accept either a relative duration (`1h`, `24h`, `7d`, `2w`, `1y`)
//! or an absolute instant in several common formats. Everything is
//! normalized to UTC, and instants at or before `now` are rejected.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Absolute formats tried in order after RFC 3339 fails.
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// Largest plausible Unix timestamp in seconds (year 2100); larger bare
/// numbers are interpreted as milliseconds.
const MAX_UNIX_SECONDS: i64 = 4_102_444_800;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpiryError {
    /// The input matched no supported duration or instant format.
    #[error("unable to parse expiration time: {0}")]
    Unparseable(String),

    /// The parsed instant is not in the future.
    #[error("expiration time must be in the future")]
    InPast,
}

/// Parse an expiration input into a UTC instant strictly after `now`.
///
/// Durations are applied relative to `now`. Whitespace is trimmed. An empty
/// input is `Unparseable`; the caller decides what absence means (the upload
/// surface defaults to `now + 24h`).
pub fn parse_expiry(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ExpiryError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExpiryError::Unparseable(input.to_owned()));
    }

    let instant = parse_duration(input, now)
        .or_else(|| parse_absolute(input))
        .or_else(|| parse_unix(input))
        .ok_or_else(|| ExpiryError::Unparseable(input.to_owned()))?;

    if instant <= now {
        return Err(ExpiryError::InPast);
    }
    Ok(instant)
}

/// Parse `<n><unit>` with units `s m h d w y`. Returns `None` when the input
/// is not duration-shaped; a negative count still parses (and is rejected by
/// the past check in [`parse_expiry`]).
fn parse_duration(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let unit = input.chars().last()?;
    let count: i64 = input[..input.len() - unit.len_utf8()].parse().ok()?;

    let seconds = match unit {
        's' => count,
        'm' => count.checked_mul(60)?,
        'h' => count.checked_mul(3_600)?,
        'd' => count.checked_mul(86_400)?,
        'w' => count.checked_mul(7 * 86_400)?,
        'y' => count.checked_mul(365 * 86_400)?,
        _ => return None,
    };

    now.checked_add_signed(chrono::Duration::seconds(seconds))
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Some(instant.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    // Date-only inputs expire at midnight UTC.
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

fn parse_unix(input: &str) -> Option<DateTime<Utc>> {
    let value: i64 = input.parse().ok()?;
    if !(0..=MAX_UNIX_SECONDS * 1_000).contains(&value) {
        return None;
    }

    if value > MAX_UNIX_SECONDS {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}
