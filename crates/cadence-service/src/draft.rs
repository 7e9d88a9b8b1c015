//! Raw request shapes handed to the engine, and their validated forms.
//!
//! Instants and occurrence counts arrive unparsed so that the validator can report a
//! malformed value as a rule violation alongside every other problem.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use cadence_core::model::{
    EndCondition, EventKind, EventStatus, Frequency, OccurrenceWindow, RecurrencePattern,
    RegistrationWindow,
};

/// Content fields of a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailDraft {
    pub title: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    #[serde(default)]
    pub kind: EventKind,
    #[serde(default)]
    pub is_restricted: bool,
    pub location: Option<String>,
    pub online_provider: Option<String>,
    pub capacity: Option<i32>,
    pub recordings: Option<serde_json::Value>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
}

impl DetailDraft {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            short_description: None,
            kind: EventKind::default(),
            is_restricted: false,
            location: None,
            online_provider: None,
            capacity: None,
            recordings: None,
            status: EventStatus::default(),
            metadata: empty_object(),
        }
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// End condition as submitted. Exactly one field must be set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndConditionInput {
    pub end_date: Option<String>,
    /// Accepts a JSON number or a numeric string.
    pub occurrences: Option<serde_json::Value>,
}

impl EndConditionInput {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end_date.is_none() && self.occurrences.is_none()
    }

    #[must_use]
    pub fn end_date(value: impl Into<String>) -> Self {
        Self {
            end_date: Some(value.into()),
            occurrences: None,
        }
    }

    #[must_use]
    pub fn occurrences(count: u32) -> Self {
        Self {
            end_date: None,
            occurrences: Some(serde_json::Value::from(count)),
        }
    }
}

impl From<EndCondition> for EndConditionInput {
    fn from(condition: EndCondition) -> Self {
        match condition {
            EndCondition::EndDate(end) => Self::end_date(end.to_rfc3339()),
            EndCondition::Occurrences(count) => Self::occurrences(count),
        }
    }
}

/// Recurrence pattern as submitted, possibly partial.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInput {
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
    pub days_of_week: Option<Vec<Weekday>>,
    pub recurring_start_date: Option<NaiveDate>,
    pub end_condition: Option<EndConditionInput>,
}

impl PatternInput {
    /// Whether no field is populated. An empty pattern counts as absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequency.is_none()
            && self.interval.is_none()
            && self.days_of_week.as_ref().is_none_or(Vec::is_empty)
            && self.recurring_start_date.is_none()
            && self.end_condition.as_ref().is_none_or(EndConditionInput::is_empty)
    }

    /// ## Summary
    /// Overlays the populated fields of `delta` on top of `self`.
    #[must_use]
    pub fn merge(&self, delta: &Self) -> Self {
        Self {
            frequency: delta.frequency.or(self.frequency),
            interval: delta.interval.or(self.interval),
            days_of_week: delta
                .days_of_week
                .clone()
                .or_else(|| self.days_of_week.clone()),
            recurring_start_date: delta.recurring_start_date.or(self.recurring_start_date),
            end_condition: delta
                .end_condition
                .clone()
                .filter(|c| !c.is_empty())
                .or_else(|| self.end_condition.clone()),
        }
    }

    /// Whether `delta` touches any field that changes the generated sequence.
    #[must_use]
    pub fn changes_expansion(&self, delta: &Self) -> bool {
        let merged = self.merge(delta);
        merged.frequency != self.frequency
            || merged.interval != self.interval
            || merged.days_of_week != self.days_of_week
            || merged.end_condition != self.end_condition
    }
}

impl From<&RecurrencePattern> for PatternInput {
    fn from(pattern: &RecurrencePattern) -> Self {
        Self {
            frequency: Some(pattern.frequency),
            interval: Some(pattern.interval),
            days_of_week: Some(pattern.days_of_week.clone()),
            recurring_start_date: Some(pattern.recurring_start_date),
            end_condition: Some(pattern.end_condition.into()),
        }
    }
}

/// Registration window as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInput {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RegistrationInput {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl From<RegistrationWindow> for RegistrationInput {
    fn from(window: RegistrationWindow) -> Self {
        Self {
            start: window.start.map(|s| s.to_rfc3339()),
            end: window.end.map(|e| e.to_rfc3339()),
        }
    }
}

/// A creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub detail: DetailDraft,
    pub start_date_time: String,
    pub end_date_time: String,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence: Option<PatternInput>,
    pub registration: Option<RegistrationInput>,
    pub attendees: Option<Vec<String>>,
    pub created_by: Option<String>,
}

/// A draft that passed every validation rule, with instants parsed and the pattern
/// normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDraft {
    pub detail: DetailDraft,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub recurrence: Option<RecurrencePattern>,
    pub registration: Option<RegistrationWindow>,
    pub created_by: Option<String>,
}

impl ValidatedDraft {
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    #[must_use]
    pub fn base_window(&self) -> OccurrenceWindow {
        OccurrenceWindow::new(self.start_date_time, self.end_date_time)
    }
}

/// Output of `ValidateAndExpand`: the validated draft and its occurrence windows.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedDraft {
    pub draft: ValidatedDraft,
    pub windows: Vec<OccurrenceWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_counts_as_absent() {
        assert!(PatternInput::default().is_empty());
        assert!(
            PatternInput {
                days_of_week: Some(Vec::new()),
                end_condition: Some(EndConditionInput::default()),
                ..PatternInput::default()
            }
            .is_empty()
        );
        assert!(
            !PatternInput {
                interval: Some(2),
                ..PatternInput::default()
            }
            .is_empty()
        );
    }

    #[test]
    fn merge_prefers_delta_fields() {
        let base = PatternInput {
            frequency: Some(Frequency::Weekly),
            interval: Some(1),
            days_of_week: Some(vec![Weekday::Mon]),
            recurring_start_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            end_condition: Some(EndConditionInput::occurrences(10)),
        };
        let delta = PatternInput {
            days_of_week: Some(vec![Weekday::Tue, Weekday::Thu]),
            end_condition: Some(EndConditionInput::default()),
            ..PatternInput::default()
        };

        let merged = base.merge(&delta);
        assert_eq!(merged.days_of_week, Some(vec![Weekday::Tue, Weekday::Thu]));
        assert_eq!(merged.interval, Some(1));
        assert_eq!(merged.end_condition, Some(EndConditionInput::occurrences(10)));
        assert!(base.changes_expansion(&delta));
        assert!(!base.changes_expansion(&PatternInput {
            interval: Some(1),
            ..PatternInput::default()
        }));
    }

    #[test]
    fn draft_deserializes_from_camel_case() {
        let draft: EventDraft = serde_json::from_value(serde_json::json!({
            "detail": { "title": "Yoga", "isRestricted": true },
            "startDateTime": "2024-12-18T17:00:00Z",
            "endDateTime": "2024-12-18T18:00:00Z",
            "isRecurring": true,
            "recurrence": {
                "frequency": "weekly",
                "interval": 1,
                "daysOfWeek": ["Wed", "Fri"],
                "recurringStartDate": "2024-12-18",
                "endCondition": { "occurrences": 4 }
            }
        }))
        .unwrap();

        assert!(draft.detail.is_restricted);
        assert_eq!(draft.detail.metadata, serde_json::json!({}));
        let pattern = draft.recurrence.unwrap();
        assert_eq!(pattern.days_of_week, Some(vec![Weekday::Wed, Weekday::Fri]));
        assert_eq!(
            pattern.end_condition.unwrap().occurrences,
            Some(serde_json::json!(4))
        );
    }
}
