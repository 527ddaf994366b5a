//! Display formatting for request timestamps.

use chrono::{DateTime, NaiveDateTime, Timelike};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Render a backend timestamp as `at H:MM, D.M.YYYY`.
///
/// Timestamps carrying an offset are shown in that offset; naive ones as
/// written. Returns `None` when the input is not a recognised timestamp.
#[must_use]
pub fn format_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let naive = match DateTime::parse_from_rfc3339(raw) {
        Ok(with_offset) => with_offset.naive_local(),
        Err(_) => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?,
    };
    Some(format!(
        "at {}:{:02}, {}",
        naive.hour(),
        naive.minute(),
        naive.format("%-d.%-m.%Y")
    ))
}

/// [`format_timestamp`] with a placeholder for missing or unparseable input.
#[must_use]
pub fn display_timestamp(raw: Option<&str>) -> String {
    raw.and_then(format_timestamp)
        .unwrap_or_else(|| "-".to_string())
}
