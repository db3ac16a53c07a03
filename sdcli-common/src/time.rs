//! Day-stamp utilities
//!
//! Analytics endpoints address days as `YYYYMMDD` integers.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a date as a `YYYYMMDD` day stamp
pub fn day_stamp(date: NaiveDate) -> u32 {
    date.year().unsigned_abs() * 10_000 + date.month() * 100 + date.day()
}

/// Parse and validate a `YYYYMMDD` day stamp
pub fn parse_day_stamp(s: &str) -> Result<u32> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid day stamp '{}': {}", s, e)))?;
    Ok(day_stamp(date))
}

/// Inclusive window covering the last `days` days up to `today`
pub fn past_days_window(today: NaiveDate, days: u32) -> (u32, u32) {
    let from = today - Duration::days(i64::from(days));
    (day_stamp(from), day_stamp(today))
}

/// Resolve a query window from either explicit stamps or a day count
///
/// Explicit stamps win; a missing end defaults to today, a missing start to
/// `days` before the end.
pub fn resolve_window(
    today: NaiveDate,
    days: u32,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(u32, u32)> {
    let (default_from, default_to) = past_days_window(today, days);
    let from = from.map(parse_day_stamp).transpose()?.unwrap_or(default_from);
    let to = to.map(parse_day_stamp).transpose()?.unwrap_or(default_to);

    if from > to {
        return Err(Error::InvalidInput(format!(
            "Start of window ({}) is after its end ({})",
            from, to
        )));
    }
    Ok((from, to))
}
