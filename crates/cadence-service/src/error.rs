use std::fmt;

use cadence_core::error::CoreError;
use cadence_core::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Which validation rule a [`Violation`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// A value did not parse as an instant.
    InvalidDate,
    /// Recurring events must start and end on the same calendar day.
    MultiDayRecurring,
    /// Start/end ordering, future-ness and duration.
    Schedule,
    /// Recurrence pattern shape and end condition.
    Pattern,
    /// A non-recurring event carries a populated pattern.
    UnexpectedPattern,
    /// Registration window rules.
    Registration,
    /// Attendee lists on unrestricted events.
    Attendees,
    /// The series would expand past the configured occurrence limit.
    Limit,
}

/// One broken validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: Rule,
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(rule: Rule, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A mutation refused because of the state it targets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("event {event_id} is archived")]
    Archived { event_id: Uuid },

    #[error("occurrence {occurrence_id} has already ended")]
    OccurrenceEnded { occurrence_id: Uuid },

    #[error("cannot make a series with {occurrences} occurrences non-recurring")]
    RecurrenceToggle { occurrences: usize },

    #[error("cannot make an event recurring without a recurrence pattern")]
    RecurringWithoutPattern,

    #[error("{field} can only be changed for a whole series")]
    SeriesFieldOnOccurrence { field: &'static str },
}

/// The generator was handed a pattern validation should have rejected.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("interval must be at least 1")]
    InvalidInterval,

    #[error("weekly pattern has no weekdays")]
    EmptyWeekdays,

    #[error("daily pattern must not list weekdays")]
    UnexpectedWeekdays,

    #[error("occurrence count must be at least 1")]
    ZeroOccurrences,

    #[error("occurrence window must end after it starts")]
    InvalidDuration,

    #[error("expansion exceeds {limit} occurrences")]
    LimitExceeded { limit: u16 },

    #[error("occurrence {index} overlaps or precedes the previous one")]
    Overlap { index: usize },

    #[error("windows do not match the event: {0}")]
    WindowMismatch(&'static str),

    #[error("recurrence rule error: {0}")]
    Rule(String),

    #[error(transparent)]
    Calendar(#[from] CoreError),
}

/// Service layer errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<Violation>),

    #[error("Request rejected: {}", join(.0))]
    Guard(Vec<GuardViolation>),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    /// Whether the caller can fix the request and retry.
    #[must_use]
    pub const fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Guard(_) | Self::NotFound(_)
        )
    }

    /// Violations carried by a validation error, empty for other kinds.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }

    /// Guard violations carried by a guard error, empty for other kinds.
    #[must_use]
    pub fn guard_violations(&self) -> &[GuardViolation] {
        match self {
            Self::Guard(violations) => violations,
            _ => &[],
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            other => Self::Store(other),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
