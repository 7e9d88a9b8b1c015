use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pattern::RecurrencePattern;
use super::repetition::OccurrenceWindow;
use crate::error::{CoreError, CoreResult};

/// Registration window for unrestricted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl RegistrationWindow {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// The recurrence root of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub event_detail_id: Uuid,
    pub is_recurring: bool,
    pub recurrence: Option<RecurrencePattern>,
    /// Denormalized end of the series, for range filtering.
    pub recurrence_end_date: Option<DateTime<Utc>>,
    /// Window of the first occurrence; its length is the series' base duration.
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub registration: Option<RegistrationWindow>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn base_window(&self) -> OccurrenceWindow {
        OccurrenceWindow::new(self.start_date_time, self.end_date_time)
    }

    /// ## Summary
    /// Checks the recurring-flag/pattern invariant.
    ///
    /// ## Errors
    /// Returns `CoreError::InvariantViolation` if a non-recurring event stores a pattern
    /// or a recurring one does not.
    pub fn check_invariants(&self) -> CoreResult<()> {
        match (self.is_recurring, self.recurrence.is_some()) {
            (true, false) => Err(CoreError::InvariantViolation(
                "recurring event without a recurrence pattern",
            )),
            (false, true) => Err(CoreError::InvariantViolation(
                "non-recurring event with a recurrence pattern",
            )),
            _ if self.start_date_time >= self.end_date_time => Err(
                CoreError::InvariantViolation("event starts at or after its end"),
            ),
            _ => Ok(()),
        }
    }
}
