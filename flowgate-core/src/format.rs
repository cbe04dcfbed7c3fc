//! Display formatting for times and durations
//!
//! The state machines work on `DateTime`/`Duration` values only; strings are
//! produced here, at the edge.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use std::fmt::Display;

const MILLIS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Wall-clock time of day, `HH:MM:SS`
pub fn fmt_hms<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%H:%M:%S").to_string()
}

/// Date and time with milliseconds, `YYYY-mm-dd HH:MM:SS.mmm`
pub fn fmt_millis<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format(MILLIS_FORMAT).to_string()
}

/// Elapsed time as `HH:MM:SS`; hours are not wrapped at 24
///
/// Sub-second remainders are truncated and negative spans shown as zero.
pub fn fmt_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (hours, rem) = (secs / 3600, secs % 3600);
    format!("{:02}:{:02}:{:02}", hours, rem / 60, rem % 60)
}

/// Normalise a sensor or gateway timestamp to `YYYY-mm-dd HH:MM:SS.mmm`
///
/// Accepts either a space or `T` separator and any fractional precision.
/// Anything unparsable is returned unchanged.
pub fn normalize_timestamp(raw: &str) -> String {
    let candidate = raw.trim().replacen('T', " ", 1);
    match NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(parsed) => parsed.format(MILLIS_FORMAT).to_string(),
        Err(_) => raw.to_string(),
    }
}
