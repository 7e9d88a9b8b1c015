//! Calendar arithmetic over UTC instants.
//!
//! ## Summary
//! Every function here is pure. Comparisons and stepping happen on UTC instants;
//! civil-calendar peculiarities such as daylight saving are not special-cased.
//! Callers that need "now" pass it in from a [`crate::clock::Clock`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc, Weekday};

use crate::error::{CoreError, CoreResult};

/// First day of a recurrence week. Week buckets for weekly intervals start here.
pub const WEEK_START: Weekday = Weekday::Sun;

/// Ordering of one instant relative to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Before,
    Equal,
    After,
}

/// Unit for [`add_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    Day,
    Week,
}

/// ## Summary
/// Compares `a` against `b`.
#[must_use]
pub fn compare_instant(a: DateTime<Utc>, b: DateTime<Utc>) -> Relation {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => Relation::Before,
        std::cmp::Ordering::Equal => Relation::Equal,
        std::cmp::Ordering::Greater => Relation::After,
    }
}

/// ## Summary
/// Steps `date` forward (or backward for negative `n`) by `n` units.
///
/// ## Errors
/// Returns `CoreError::InvalidDate` if the result leaves chrono's representable range.
pub fn add_interval(date: DateTime<Utc>, unit: IntervalUnit, n: i64) -> CoreResult<DateTime<Utc>> {
    let days = match unit {
        IntervalUnit::Day => Some(n),
        IntervalUnit::Week => n.checked_mul(7),
    };

    days.and_then(TimeDelta::try_days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| CoreError::InvalidDate(format!("{date} + {n} {unit:?} is out of range")))
}

/// ## Summary
/// Returns the first instant strictly after `date` (same clock time) whose weekday is in
/// `allowed`, skipping `interval - 1` whole weeks every time a week boundary is crossed.
///
/// With `interval == 1` this is simply the next allowed weekday. Weeks start on
/// [`WEEK_START`].
///
/// ## Errors
/// Returns `CoreError::InvalidInput` if `allowed` is empty or `interval` is zero, and
/// `CoreError::InvalidDate` if stepping leaves the representable range.
pub fn next_matching_weekday(
    date: DateTime<Utc>,
    allowed: &[Weekday],
    interval: u32,
) -> CoreResult<DateTime<Utc>> {
    if allowed.is_empty() {
        return Err(CoreError::InvalidInput(
            "weekday set must not be empty".to_string(),
        ));
    }
    if interval == 0 {
        return Err(CoreError::InvalidInput(
            "interval must be at least 1".to_string(),
        ));
    }

    let mut candidate = add_interval(date, IntervalUnit::Day, 1)?;
    for _ in 0..7 {
        if candidate.weekday() == WEEK_START && interval > 1 {
            candidate = add_interval(candidate, IntervalUnit::Week, i64::from(interval - 1))?;
        }
        if allowed.contains(&candidate.weekday()) {
            return Ok(candidate);
        }
        candidate = add_interval(candidate, IntervalUnit::Day, 1)?;
    }

    Err(CoreError::InvariantViolation(
        "no allowed weekday found within one week",
    ))
}

/// ## Summary
/// Returns `date` itself if its weekday is allowed, otherwise the next allowed weekday.
///
/// ## Errors
/// Same as [`next_matching_weekday`].
pub fn first_matching_weekday(
    date: DateTime<Utc>,
    allowed: &[Weekday],
) -> CoreResult<DateTime<Utc>> {
    if allowed.contains(&date.weekday()) {
        Ok(date)
    } else {
        next_matching_weekday(date, allowed, 1)
    }
}

/// ## Summary
/// Parses an instant from RFC 3339, or from `YYYY-MM-DDTHH:MM:SS` read as UTC.
///
/// ## Errors
/// Returns `CoreError::InvalidDate` if neither form matches.
pub fn parse_instant(value: &str) -> CoreResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| CoreError::InvalidDate(format!("'{value}': {e}")))
}

/// ## Summary
/// Moves `instant` onto `date`, keeping its clock time.
#[must_use]
pub fn with_date(instant: DateTime<Utc>, date: NaiveDate) -> DateTime<Utc> {
    date.and_time(instant.time()).and_utc()
}

/// Whether both instants share the same UTC clock time.
#[must_use]
pub fn same_time_of_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.time() == b.time()
}

/// Whether `start` and `end` fall on different UTC calendar days.
#[must_use]
pub fn spans_multiple_days(start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start.date_naive() != end.date_naive()
}
