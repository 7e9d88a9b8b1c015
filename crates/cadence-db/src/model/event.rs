use diesel::{pg::Pg, prelude::*};

use cadence_core::model::{Event, RecurrencePattern, RegistrationWindow};

use crate::db::schema;
use crate::error::{DbError, DbResult};

/// Recurrence root of a series
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset)]
#[diesel(table_name = schema::event)]
#[diesel(check_for_backend(Pg))]
#[diesel(treat_none_as_null = true)]
pub struct EventRow {
    pub id: uuid::Uuid,
    pub event_detail_id: uuid::Uuid,
    pub is_recurring: bool,
    pub recurrence: Option<serde_json::Value>,
    pub recurrence_end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub start_date_time: chrono::DateTime<chrono::Utc>,
    pub end_date_time: chrono::DateTime<chrono::Utc>,
    pub registration_start: Option<chrono::DateTime<chrono::Utc>>,
    pub registration_end: Option<chrono::DateTime<chrono::Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl EventRow {
    /// ## Summary
    /// Builds a row from a domain event, encoding the pattern as JSONB.
    ///
    /// ## Errors
    /// Returns `DbError::InvalidRow` if the pattern cannot be serialized.
    pub fn from_event(event: &Event) -> DbResult<Self> {
        let recurrence = event
            .recurrence
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::invalid_row("event", e))?;
        let registration = event.registration.unwrap_or_default();

        Ok(Self {
            id: event.id,
            event_detail_id: event.event_detail_id,
            is_recurring: event.is_recurring,
            recurrence,
            recurrence_end_date: event.recurrence_end_date,
            start_date_time: event.start_date_time,
            end_date_time: event.end_date_time,
            registration_start: registration.start,
            registration_end: registration.end,
            created_by: event.created_by.clone(),
            updated_by: event.updated_by.clone(),
            created_at: event.created_at,
            updated_at: event.updated_at,
        })
    }
}

impl TryFrom<EventRow> for Event {
    type Error = DbError;

    fn try_from(row: EventRow) -> DbResult<Self> {
        let recurrence = row
            .recurrence
            .map(serde_json::from_value::<RecurrencePattern>)
            .transpose()
            .map_err(|e| DbError::invalid_row("event", e))?;
        let registration = RegistrationWindow {
            start: row.registration_start,
            end: row.registration_end,
        };

        Ok(Self {
            id: row.id,
            event_detail_id: row.event_detail_id,
            is_recurring: row.is_recurring,
            recurrence,
            recurrence_end_date: row.recurrence_end_date,
            start_date_time: row.start_date_time,
            end_date_time: row.end_date_time,
            registration: (!registration.is_empty()).then_some(registration),
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
