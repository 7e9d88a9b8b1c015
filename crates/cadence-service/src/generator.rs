//! Occurrence expansion.
//!
//! ## Summary
//! A validated pattern is rendered as an RFC 5545 rule (`DTSTART` plus `RRULE`) and
//! expanded with the `rrule` crate. Weeks start on Sunday, so weekly intervals count
//! Sunday-based week buckets. The expansion is pure: the same pattern and base window
//! always yield the same windows.

use chrono::{DateTime, Utc, Weekday};
use rrule::RRuleSet;

use cadence_core::calendar::{self, WEEK_START};
use cadence_core::model::{EndCondition, Frequency, OccurrenceWindow, RecurrencePattern};

use crate::error::GenerationError;

/// ## Summary
/// Expands `pattern` into ordered occurrence windows carrying the clock times and
/// duration of `base`.
///
/// The first occurrence falls on the pattern's `recurring_start_date`, moved forward to
/// the first allowed weekday for weekly patterns.
///
/// ## Errors
/// Returns `GenerationError` if the pattern is contradictory, if the rule cannot be
/// built, or if it expands past `limit` occurrences.
#[tracing::instrument(skip(pattern), fields(frequency = %pattern.frequency, interval = pattern.interval))]
pub fn expand(
    pattern: &RecurrencePattern,
    base: OccurrenceWindow,
    limit: u16,
) -> Result<Vec<OccurrenceWindow>, GenerationError> {
    check_contract(pattern, base)?;

    let duration = base.duration();
    let mut seed = calendar::with_date(base.start, pattern.recurring_start_date);
    if pattern.frequency == Frequency::Weekly {
        seed = calendar::first_matching_weekday(seed, &pattern.days_of_week)?;
    }

    if let EndCondition::EndDate(end_date) = pattern.end_condition {
        if end_date < seed {
            tracing::debug!(%seed, %end_date, "End date precedes the first occurrence");
            return Ok(Vec::new());
        }
    }

    let rule_text = build_rule_text(pattern, seed);
    tracing::trace!(rule = %rule_text, "Built recurrence rule");

    let rule_set = rule_text
        .parse::<RRuleSet>()
        .map_err(|e| GenerationError::Rule(e.to_string()))?;
    let result = rule_set.all(limit.saturating_add(1));

    if result.dates.len() > usize::from(limit) {
        tracing::error!(limit, "Recurrence expanded past the occurrence limit");
        return Err(GenerationError::LimitExceeded { limit });
    }

    let windows: Vec<OccurrenceWindow> = result
        .dates
        .iter()
        .map(|dt| {
            let start = dt.with_timezone(&Utc);
            OccurrenceWindow::new(start, start + duration)
        })
        .collect();

    check_ordering(&windows)?;

    tracing::debug!(occurrences = windows.len(), "Pattern expanded");
    Ok(windows)
}

fn check_contract(
    pattern: &RecurrencePattern,
    base: OccurrenceWindow,
) -> Result<(), GenerationError> {
    if pattern.interval == 0 {
        return Err(GenerationError::InvalidInterval);
    }
    match pattern.frequency {
        Frequency::Weekly if pattern.days_of_week.is_empty() => {
            return Err(GenerationError::EmptyWeekdays);
        }
        Frequency::Daily if !pattern.days_of_week.is_empty() => {
            return Err(GenerationError::UnexpectedWeekdays);
        }
        _ => {}
    }
    if pattern.end_condition == EndCondition::Occurrences(0) {
        return Err(GenerationError::ZeroOccurrences);
    }
    if base.end <= base.start {
        return Err(GenerationError::InvalidDuration);
    }
    Ok(())
}

/// Windows must be strictly ordered and must not overlap.
pub(crate) fn check_ordering(windows: &[OccurrenceWindow]) -> Result<(), GenerationError> {
    for (index, pair) in windows.windows(2).enumerate() {
        if pair[1].start < pair[0].end {
            return Err(GenerationError::Overlap { index: index + 1 });
        }
    }
    Ok(())
}

fn build_rule_text(pattern: &RecurrencePattern, seed: DateTime<Utc>) -> String {
    let mut parts = vec![
        format!(
            "FREQ={}",
            match pattern.frequency {
                Frequency::Daily => "DAILY",
                Frequency::Weekly => "WEEKLY",
            }
        ),
        format!("INTERVAL={}", pattern.interval),
    ];

    if pattern.frequency == Frequency::Weekly {
        let days: Vec<&str> = pattern.days_of_week.iter().map(|d| weekday_code(*d)).collect();
        parts.push(format!("BYDAY={}", days.join(",")));
        parts.push(format!("WKST={}", weekday_code(WEEK_START)));
    }

    match pattern.end_condition {
        EndCondition::Occurrences(count) => parts.push(format!("COUNT={count}")),
        EndCondition::EndDate(until) => {
            parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
    }

    format!(
        "DTSTART:{}\nRRULE:{}",
        seed.format("%Y%m%dT%H%M%SZ"),
        parts.join(";")
    )
}

const fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, TimeDelta, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn weekly(days: Vec<Weekday>, interval: u32, start: NaiveDate, end: EndCondition) -> RecurrencePattern {
        RecurrencePattern {
            frequency: Frequency::Weekly,
            interval,
            days_of_week: days,
            recurring_start_date: start,
            end_condition: end,
        }
    }

    fn base() -> OccurrenceWindow {
        OccurrenceWindow::new(at(2024, 12, 18, 17, 0), at(2024, 12, 18, 18, 30))
    }

    #[test_log::test]
    fn weekly_wednesday_friday_example() {
        let pattern = weekly(
            vec![Weekday::Wed, Weekday::Fri],
            1,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::Occurrences(4),
        );

        let windows = expand(&pattern, base(), 730).unwrap();
        let starts: Vec<_> = windows.iter().map(|w| w.start).collect();
        assert_eq!(
            starts,
            vec![
                at(2024, 12, 18, 17, 0),
                at(2024, 12, 20, 17, 0),
                at(2024, 12, 25, 17, 0),
                at(2024, 12, 27, 17, 0),
            ]
        );
        assert!(windows.iter().all(|w| w.duration() == TimeDelta::minutes(90)));
    }

    #[test]
    fn daily_pattern_steps_by_interval() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Daily,
            interval: 3,
            days_of_week: Vec::new(),
            recurring_start_date: NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            end_condition: EndCondition::Occurrences(6),
        };

        let windows = expand(&pattern, base(), 730).unwrap();
        assert_eq!(windows.len(), 6);
        for pair in windows.windows(2) {
            assert_eq!(pair[1].start - pair[0].start, TimeDelta::days(3));
        }
    }

    #[test]
    fn weekly_interval_skips_whole_weeks() {
        let pattern = weekly(
            vec![Weekday::Wed, Weekday::Fri],
            2,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::Occurrences(6),
        );

        let windows = expand(&pattern, base(), 730).unwrap();
        let dates: Vec<_> = windows.iter().map(|w| w.start.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
            ]
        );
    }

    #[test]
    fn weekly_expansion_agrees_with_calendar_stepping() {
        let days = vec![Weekday::Mon, Weekday::Thu, Weekday::Sat];
        let pattern = weekly(
            days.clone(),
            3,
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            EndCondition::Occurrences(12),
        );
        let base = OccurrenceWindow::new(at(2025, 3, 3, 8, 0), at(2025, 3, 3, 9, 0));

        let windows = expand(&pattern, base, 730).unwrap();

        let mut expected = vec![base.start];
        while expected.len() < 12 {
            let last = *expected.last().unwrap();
            expected.push(calendar::next_matching_weekday(last, &days, 3).unwrap());
        }
        let starts: Vec<_> = windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, expected);
        assert!(windows.iter().all(|w| days.contains(&w.start.weekday())));
    }

    #[test]
    fn nominal_start_weekday_does_not_change_the_sequence() {
        let days = vec![Weekday::Wed, Weekday::Fri];
        let from_wednesday = weekly(
            days.clone(),
            1,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::Occurrences(4),
        );
        let from_monday = weekly(
            days,
            1,
            NaiveDate::from_ymd_opt(2024, 12, 16).unwrap(),
            EndCondition::Occurrences(4),
        );

        assert_eq!(
            expand(&from_wednesday, base(), 730).unwrap(),
            expand(&from_monday, base(), 730).unwrap()
        );
    }

    #[test]
    fn end_date_is_inclusive() {
        let pattern = weekly(
            vec![Weekday::Wed, Weekday::Fri],
            1,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::EndDate(at(2024, 12, 27, 18, 30)),
        );

        let windows = expand(&pattern, base(), 730).unwrap();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[3].start, at(2024, 12, 27, 17, 0));
    }

    #[test]
    fn end_date_before_first_occurrence_yields_nothing() {
        let pattern = weekly(
            vec![Weekday::Fri],
            1,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::EndDate(at(2024, 12, 19, 18, 30)),
        );

        assert!(expand(&pattern, base(), 730).unwrap().is_empty());
    }

    #[test]
    fn expansion_is_bounded() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Daily,
            interval: 1,
            days_of_week: Vec::new(),
            recurring_start_date: NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            end_condition: EndCondition::EndDate(at(2026, 12, 18, 18, 30)),
        };

        assert!(matches!(
            expand(&pattern, base(), 100),
            Err(GenerationError::LimitExceeded { limit: 100 })
        ));
    }

    #[test]
    fn contradictory_patterns_are_contract_violations() {
        let mut pattern = weekly(
            Vec::new(),
            1,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::Occurrences(2),
        );
        assert!(matches!(
            expand(&pattern, base(), 730),
            Err(GenerationError::EmptyWeekdays)
        ));

        pattern.days_of_week = vec![Weekday::Wed];
        pattern.interval = 0;
        assert!(matches!(
            expand(&pattern, base(), 730),
            Err(GenerationError::InvalidInterval)
        ));
    }

    #[test]
    fn expansion_is_repeatable() {
        let pattern = weekly(
            vec![Weekday::Tue, Weekday::Sun],
            2,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap(),
            EndCondition::Occurrences(9),
        );
        assert_eq!(
            expand(&pattern, base(), 730).unwrap(),
            expand(&pattern, base(), 730).unwrap()
        );
    }
}
