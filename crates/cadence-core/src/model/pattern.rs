use std::fmt;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// How often a series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What terminates a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum EndCondition {
    /// Last instant an occurrence may start at. Carries the event's end clock time.
    EndDate(DateTime<Utc>),
    /// Total number of occurrences in the series.
    Occurrences(u32),
}

/// A validated recurrence pattern as stored on the series root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    pub interval: u32,
    /// Allowed weekdays for weekly patterns; empty for daily ones.
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    pub recurring_start_date: NaiveDate,
    pub end_condition: EndCondition,
}

impl RecurrencePattern {
    #[must_use]
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        match self.end_condition {
            EndCondition::EndDate(end) => Some(end),
            EndCondition::Occurrences(_) => None,
        }
    }

    #[must_use]
    pub fn occurrences(&self) -> Option<u32> {
        match self.end_condition {
            EndCondition::Occurrences(count) => Some(count),
            EndCondition::EndDate(_) => None,
        }
    }
}
