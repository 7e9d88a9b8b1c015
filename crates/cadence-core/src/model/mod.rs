//! The three-entity event aggregate.
//!
//! ## Summary
//! An [`Event`] is the recurrence root, an [`EventDetail`] holds the content shared by
//! every occurrence, and each [`EventRepetition`] is one concrete occurrence. Rows refer
//! to each other by id only; the [`Aggregate`] view assembles them.

mod aggregate;
mod detail;
mod event;
mod pattern;
mod repetition;

pub use aggregate::Aggregate;
pub use detail::{EventDetail, EventKind, EventStatus};
pub use event::{Event, RegistrationWindow};
pub use pattern::{EndCondition, Frequency, RecurrencePattern};
pub use repetition::{EventRepetition, OccurrenceWindow, OnlineMeeting};
