//! Recurrence validation.
//!
//! ## Summary
//! Every rule is a separate check that appends to a shared violation list, so one pass
//! reports every problem with a draft. [`validate_draft`] composes them for creation;
//! the propagation engine calls the individual checks for the fields an edit touches.

use chrono::{DateTime, Datelike, Utc, Weekday};

use cadence_core::calendar::{self, Relation, compare_instant};
use cadence_core::model::{EndCondition, Frequency, RecurrencePattern, RegistrationWindow};

use crate::draft::{EndConditionInput, EventDraft, PatternInput, RegistrationInput, ValidatedDraft};
use crate::error::{Rule, Violation};

/// Largest step the recurrence expander accepts.
pub const MAX_INTERVAL: u32 = 0xFFFF;

/// Reference values the rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    pub now: DateTime<Utc>,
    /// Creation time of the event; lower bound of its registration window.
    pub created_at: DateTime<Utc>,
    pub max_occurrences: u16,
}

/// ## Summary
/// Runs every rule against a creation draft.
///
/// ## Errors
/// Returns all violations found. Nothing is returned partially validated.
pub fn validate_draft(
    draft: &EventDraft,
    ctx: &ValidationContext,
) -> Result<ValidatedDraft, Vec<Violation>> {
    let mut violations = Vec::new();

    let start = parse_instant_field(&draft.start_date_time, "startDateTime", &mut violations);
    let end = parse_instant_field(&draft.end_date_time, "endDateTime", &mut violations);

    check_window(start, end, draft.is_recurring, Some(ctx.now), &mut violations);

    let recurrence = if draft.is_recurring {
        check_pattern(
            draft.recurrence.as_ref(),
            start,
            end,
            ctx,
            &mut violations,
        )
    } else {
        check_no_pattern(draft.recurrence.as_ref(), &mut violations);
        None
    };

    let registration = check_registration(
        draft.registration.as_ref(),
        draft.detail.is_restricted,
        ctx.created_at,
        start,
        ctx.now,
        &mut violations,
    );
    check_attendees(
        draft.attendees.as_deref(),
        draft.detail.is_restricted,
        &mut violations,
    );

    match (start, end) {
        (Some(start), Some(end)) if violations.is_empty() => Ok(ValidatedDraft {
            detail: draft.detail.clone(),
            start_date_time: start,
            end_date_time: end,
            recurrence,
            registration,
            created_by: draft.created_by.clone(),
        }),
        _ => {
            tracing::warn!(violations = violations.len(), "Draft rejected");
            Err(violations)
        }
    }
}

/// ## Summary
/// Parses an instant, recording an `InvalidDate` violation on failure.
pub fn parse_instant_field(
    value: &str,
    field: &'static str,
    violations: &mut Vec<Violation>,
) -> Option<DateTime<Utc>> {
    match calendar::parse_instant(value) {
        Ok(instant) => Some(instant),
        Err(e) => {
            violations.push(Violation::new(Rule::InvalidDate, field, e.to_string()));
            None
        }
    }
}

/// ## Summary
/// Checks the event window: recurring events stay within one calendar day, end follows
/// start, and with `now` given both lie strictly in the future.
pub fn check_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    is_recurring: bool,
    now: Option<DateTime<Utc>>,
    violations: &mut Vec<Violation>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if is_recurring && calendar::spans_multiple_days(start, end) {
            violations.push(Violation::new(
                Rule::MultiDayRecurring,
                "isRecurring",
                "an event spanning several days cannot recur",
            ));
        }
        if compare_instant(end, start) != Relation::After {
            violations.push(Violation::new(
                Rule::Schedule,
                "endDateTime",
                "must be after startDateTime",
            ));
        }
    }

    let Some(now) = now else {
        return;
    };
    if start.is_some_and(|s| compare_instant(s, now) != Relation::After) {
        violations.push(Violation::new(
            Rule::Schedule,
            "startDateTime",
            "must be in the future",
        ));
    }
    if end.is_some_and(|e| compare_instant(e, now) != Relation::After) {
        violations.push(Violation::new(
            Rule::Schedule,
            "endDateTime",
            "must be in the future",
        ));
    }
}

/// ## Summary
/// Validates and normalizes a recurrence pattern for an event spanning `start..end`.
///
/// Weekly patterns without weekdays default to the start's weekday, and a missing
/// `recurringStartDate` defaults to the start's date. Returns `None` if any pattern
/// rule fails.
pub fn check_pattern(
    input: Option<&PatternInput>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    ctx: &ValidationContext,
    violations: &mut Vec<Violation>,
) -> Option<RecurrencePattern> {
    let Some(input) = input.filter(|p| !p.is_empty()) else {
        violations.push(Violation::new(
            Rule::Pattern,
            "recurrence",
            "a recurring event requires a recurrence pattern",
        ));
        return None;
    };
    let before = violations.len();

    let frequency = input.frequency;
    if frequency.is_none() {
        violations.push(Violation::new(
            Rule::Pattern,
            "recurrence.frequency",
            "is required",
        ));
    }

    let interval = input.interval.unwrap_or(1);
    if interval == 0 {
        violations.push(Violation::new(
            Rule::Pattern,
            "recurrence.interval",
            "must be at least 1",
        ));
    } else if interval > MAX_INTERVAL {
        violations.push(Violation::new(
            Rule::Pattern,
            "recurrence.interval",
            format!("must be at most {MAX_INTERVAL}"),
        ));
    }

    let days = input.days_of_week.clone().unwrap_or_default();
    let days_of_week = match frequency {
        Some(Frequency::Daily) if !days.is_empty() => {
            violations.push(Violation::new(
                Rule::Pattern,
                "recurrence.daysOfWeek",
                "only weekly patterns may list weekdays",
            ));
            Vec::new()
        }
        Some(Frequency::Weekly) if days.is_empty() => {
            start.map(|s| vec![s.weekday()]).unwrap_or_default()
        }
        Some(Frequency::Weekly) => normalize_weekdays(days),
        _ => Vec::new(),
    };

    let recurring_start_date = match (input.recurring_start_date, start) {
        (Some(date), Some(start)) if date < start.date_naive() => {
            violations.push(Violation::new(
                Rule::Pattern,
                "recurrence.recurringStartDate",
                "must not precede the event start",
            ));
            None
        }
        (Some(date), _) => Some(date),
        (None, start) => start.map(|s| s.date_naive()),
    };

    let end_condition = check_end_condition(
        input.end_condition.as_ref(),
        start,
        end,
        ctx,
        violations,
    );

    if violations.len() > before {
        return None;
    }

    Some(RecurrencePattern {
        frequency: frequency?,
        interval,
        days_of_week,
        recurring_start_date: recurring_start_date?,
        end_condition: end_condition?,
    })
}

fn normalize_weekdays(mut days: Vec<Weekday>) -> Vec<Weekday> {
    days.sort_by_key(Weekday::num_days_from_sunday);
    days.dedup();
    days
}

fn check_end_condition(
    input: Option<&EndConditionInput>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    ctx: &ValidationContext,
    violations: &mut Vec<Violation>,
) -> Option<EndCondition> {
    const FIELD: &str = "recurrence.endCondition";

    let input = input.cloned().unwrap_or_default();
    match (input.end_date.as_deref(), input.occurrences.as_ref()) {
        (Some(_), Some(_)) => {
            violations.push(Violation::new(
                Rule::Pattern,
                FIELD,
                "set either endDate or occurrences, not both",
            ));
            None
        }
        (None, None) => {
            violations.push(Violation::new(
                Rule::Pattern,
                FIELD,
                "one of endDate or occurrences is required",
            ));
            None
        }
        (Some(raw), None) => {
            let before = violations.len();
            let end_date = parse_instant_field(raw, "recurrence.endCondition.endDate", violations)?;
            check_end_date(end_date, start, end, ctx.now, violations);
            (violations.len() == before).then_some(EndCondition::EndDate(end_date))
        }
        (None, Some(raw)) => {
            let Some(count) = parse_occurrences(raw) else {
                violations.push(Violation::new(
                    Rule::Pattern,
                    "recurrence.endCondition.occurrences",
                    format!("'{raw}' is not a positive integer"),
                ));
                return None;
            };
            if count > u32::from(ctx.max_occurrences) {
                violations.push(Violation::new(
                    Rule::Limit,
                    "recurrence.endCondition.occurrences",
                    format!("must not exceed {}", ctx.max_occurrences),
                ));
                return None;
            }
            Some(EndCondition::Occurrences(count))
        }
    }
}

/// ## Summary
/// Checks an end date against the reference clock and the event window. The end date
/// must carry the event's end clock time.
pub fn check_end_date(
    end_date: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
) {
    const FIELD: &str = "recurrence.endCondition.endDate";

    if compare_instant(end_date, now) != Relation::After {
        violations.push(Violation::new(Rule::Pattern, FIELD, "must be in the future"));
    }
    if start.is_some_and(|s| compare_instant(end_date, s) != Relation::After) {
        violations.push(Violation::new(
            Rule::Pattern,
            FIELD,
            "must be after the event start",
        ));
    }
    if end.is_some_and(|e| !calendar::same_time_of_day(end_date, e)) {
        violations.push(Violation::new(
            Rule::Pattern,
            FIELD,
            "must have the same time of day as the event end",
        ));
    }
}

fn parse_occurrences(value: &serde_json::Value) -> Option<u32> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
}

/// ## Summary
/// Rejects any populated pattern on a non-recurring event. An empty object is fine.
pub fn check_no_pattern(input: Option<&PatternInput>, violations: &mut Vec<Violation>) {
    if input.is_some_and(|p| !p.is_empty()) {
        violations.push(Violation::new(
            Rule::UnexpectedPattern,
            "recurrence",
            "a non-recurring event must not carry a recurrence pattern",
        ));
    }
}

/// ## Summary
/// Checks the registration window against the restricted flag, the reference clock and
/// `[created_at, event_start]`.
pub fn check_registration(
    input: Option<&RegistrationInput>,
    is_restricted: bool,
    created_at: DateTime<Utc>,
    event_start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
) -> Option<RegistrationWindow> {
    let input = input.filter(|r| !r.is_empty());

    if is_restricted {
        if input.is_some() {
            violations.push(Violation::new(
                Rule::Registration,
                "registration",
                "restricted events must not carry a registration window",
            ));
        }
        return None;
    }

    let Some(input) = input else {
        violations.push(Violation::new(
            Rule::Registration,
            "registration",
            "unrestricted events require a registration window",
        ));
        return None;
    };

    let before = violations.len();
    let start = input
        .start
        .as_deref()
        .and_then(|s| parse_instant_field(s, "registration.start", violations));
    let end = input
        .end
        .as_deref()
        .and_then(|e| parse_instant_field(e, "registration.end", violations));

    if let (Some(start), Some(end)) = (start, end) {
        if start < now {
            violations.push(Violation::new(
                Rule::Registration,
                "registration.start",
                "must not be in the past",
            ));
        }
        if end < now {
            violations.push(Violation::new(
                Rule::Registration,
                "registration.end",
                "must not be in the past",
            ));
        }
        if start > end {
            violations.push(Violation::new(
                Rule::Registration,
                "registration",
                "start must not be after end",
            ));
        }
        if start < created_at || event_start.is_some_and(|event_start| end > event_start) {
            violations.push(Violation::new(
                Rule::Registration,
                "registration",
                "must fall between event creation and event start",
            ));
        }
    }

    (violations.len() == before).then_some(RegistrationWindow { start, end })
}

/// ## Summary
/// Attendee lists are only meaningful for restricted events.
pub fn check_attendees(
    attendees: Option<&[String]>,
    is_restricted: bool,
    violations: &mut Vec<Violation>,
) {
    if attendees.is_some() && !is_restricted {
        violations.push(Violation::new(
            Rule::Attendees,
            "attendees",
            "unrestricted events must not carry an attendee list",
        ));
    }
}

/// ## Summary
/// Moves an end date onto the clock time of `end`, keeping its calendar day.
#[must_use]
pub fn align_end_date(end_date: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    calendar::with_date(end, end_date.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DetailDraft;
    use chrono::{NaiveDate, TimeZone};

    fn ctx() -> ValidationContext {
        let now = Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap();
        ValidationContext {
            now,
            created_at: now,
            max_occurrences: 730,
        }
    }

    fn weekly_draft() -> EventDraft {
        let mut detail = DetailDraft::titled("Choir practice");
        detail.is_restricted = true;
        EventDraft {
            detail,
            start_date_time: "2024-12-18T17:00:00Z".to_string(),
            end_date_time: "2024-12-18T18:30:00Z".to_string(),
            is_recurring: true,
            recurrence: Some(PatternInput {
                frequency: Some(Frequency::Weekly),
                interval: Some(1),
                days_of_week: Some(vec![Weekday::Fri, Weekday::Wed]),
                recurring_start_date: NaiveDate::from_ymd_opt(2024, 12, 18),
                end_condition: Some(EndConditionInput::occurrences(4)),
            }),
            registration: None,
            attendees: Some(vec!["alto@example.com".to_string()]),
            created_by: Some("director".to_string()),
        }
    }

    fn rules(result: Result<ValidatedDraft, Vec<Violation>>) -> Vec<Rule> {
        result.unwrap_err().into_iter().map(|v| v.rule).collect()
    }

    #[test_log::test]
    fn valid_weekly_draft_is_normalized() {
        let validated = validate_draft(&weekly_draft(), &ctx()).unwrap();
        let pattern = validated.recurrence.unwrap();
        assert_eq!(pattern.days_of_week, vec![Weekday::Wed, Weekday::Fri]);
        assert_eq!(pattern.end_condition, EndCondition::Occurrences(4));
        assert_eq!(validated.registration, None);
    }

    #[test]
    fn weekly_without_days_defaults_to_start_weekday() {
        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.days_of_week = None;
            p.recurring_start_date = None;
        }
        let pattern = validate_draft(&draft, &ctx()).unwrap().recurrence.unwrap();
        assert_eq!(pattern.days_of_week, vec![Weekday::Wed]);
        assert_eq!(
            pattern.recurring_start_date,
            NaiveDate::from_ymd_opt(2024, 12, 18).unwrap()
        );
    }

    #[test]
    fn multi_day_recurring_event_is_rejected() {
        let mut draft = weekly_draft();
        draft.end_date_time = "2024-12-19T10:00:00Z".to_string();
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::MultiDayRecurring]);
    }

    #[test]
    fn end_date_must_share_end_time_of_day() {
        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.end_condition = Some(EndConditionInput::end_date("2025-01-31T18:00:00Z"));
        }
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Pattern]);

        if let Some(p) = draft.recurrence.as_mut() {
            p.end_condition = Some(EndConditionInput::end_date("2025-01-31T18:30:00Z"));
        }
        let pattern = validate_draft(&draft, &ctx()).unwrap().recurrence.unwrap();
        assert_eq!(
            pattern.end_date(),
            Some(Utc.with_ymd_and_hms(2025, 1, 31, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn end_condition_must_be_exactly_one() {
        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.end_condition = Some(EndConditionInput {
                end_date: Some("2025-01-31T18:30:00Z".to_string()),
                occurrences: Some(serde_json::json!(3)),
            });
        }
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Pattern]);

        if let Some(p) = draft.recurrence.as_mut() {
            p.end_condition = None;
        }
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Pattern]);
    }

    #[test]
    fn occurrences_must_be_a_positive_integer() {
        for bad in [
            serde_json::json!(0),
            serde_json::json!(-2),
            serde_json::json!(1.5),
            serde_json::json!("many"),
        ] {
            let mut draft = weekly_draft();
            if let Some(p) = draft.recurrence.as_mut() {
                p.end_condition = Some(EndConditionInput {
                    end_date: None,
                    occurrences: Some(bad),
                });
            }
            assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Pattern]);
        }

        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.end_condition = Some(EndConditionInput {
                end_date: None,
                occurrences: Some(serde_json::json!("6")),
            });
        }
        let pattern = validate_draft(&draft, &ctx()).unwrap().recurrence.unwrap();
        assert_eq!(pattern.occurrences(), Some(6));
    }

    #[test]
    fn occurrence_count_is_bounded() {
        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.end_condition = Some(EndConditionInput::occurrences(731));
        }
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Limit]);
    }

    #[test_log::test]
    fn interval_outside_the_expander_range_is_a_violation() {
        for interval in [MAX_INTERVAL + 1, 100_000, u32::MAX] {
            let mut draft = weekly_draft();
            if let Some(p) = draft.recurrence.as_mut() {
                p.interval = Some(interval);
            }
            let violations = validate_draft(&draft, &ctx()).unwrap_err();
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].rule, Rule::Pattern);
            assert_eq!(violations[0].field, "recurrence.interval");
        }

        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.interval = Some(MAX_INTERVAL);
        }
        assert!(validate_draft(&draft, &ctx()).is_ok());
    }

    #[test]
    fn daily_pattern_rejects_weekdays() {
        let mut draft = weekly_draft();
        if let Some(p) = draft.recurrence.as_mut() {
            p.frequency = Some(Frequency::Daily);
        }
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Pattern]);
    }

    #[test]
    fn non_recurring_event_accepts_only_an_empty_pattern() {
        let mut draft = weekly_draft();
        draft.is_recurring = false;
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::UnexpectedPattern]);

        draft.recurrence = Some(PatternInput::default());
        let validated = validate_draft(&draft, &ctx()).unwrap();
        assert!(!validated.is_recurring());
    }

    #[test]
    fn registration_follows_the_restricted_flag() {
        let mut draft = weekly_draft();
        draft.registration = Some(RegistrationInput {
            start: Some("2024-12-02T09:00:00Z".to_string()),
            end: None,
        });
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Registration]);

        draft.detail.is_restricted = false;
        draft.attendees = None;
        draft.registration = None;
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Registration]);

        draft.registration = Some(RegistrationInput {
            start: Some("2024-12-02T09:00:00Z".to_string()),
            end: Some("2024-12-18T12:00:00Z".to_string()),
        });
        let validated = validate_draft(&draft, &ctx()).unwrap();
        assert!(validated.registration.is_some());
    }

    #[test]
    fn registration_window_must_close_before_the_event_starts() {
        let mut draft = weekly_draft();
        draft.detail.is_restricted = false;
        draft.attendees = None;
        draft.registration = Some(RegistrationInput {
            start: Some("2024-12-20T09:00:00Z".to_string()),
            end: Some("2024-12-19T12:00:00Z".to_string()),
        });
        assert_eq!(
            rules(validate_draft(&draft, &ctx())),
            vec![Rule::Registration, Rule::Registration]
        );
    }

    #[test]
    fn attendees_are_rejected_on_unrestricted_events() {
        let mut draft = weekly_draft();
        draft.detail.is_restricted = false;
        draft.registration = Some(RegistrationInput {
            start: None,
            end: Some("2024-12-10T12:00:00Z".to_string()),
        });
        assert_eq!(rules(validate_draft(&draft, &ctx())), vec![Rule::Attendees]);
    }

    #[test]
    fn every_violation_is_reported_at_once() {
        let mut draft = weekly_draft();
        draft.start_date_time = "2024-11-30T17:00:00Z".to_string();
        draft.end_date_time = "not a date".to_string();
        draft.detail.is_restricted = false;

        let found = rules(validate_draft(&draft, &ctx()));
        assert!(found.contains(&Rule::InvalidDate));
        assert!(found.contains(&Rule::Schedule));
        assert!(found.contains(&Rule::Registration));
        assert!(found.contains(&Rule::Attendees));
    }
}
