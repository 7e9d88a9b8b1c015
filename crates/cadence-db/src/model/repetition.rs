use diesel::{pg::Pg, prelude::*};

use cadence_core::model::{EventRepetition, OnlineMeeting};

use crate::db::schema;
use crate::error::{DbError, DbResult};

/// One materialized occurrence
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset)]
#[diesel(table_name = schema::event_repetition)]
#[diesel(check_for_backend(Pg))]
#[diesel(treat_none_as_null = true)]
pub struct EventRepetitionRow {
    pub id: uuid::Uuid,
    pub event_id: uuid::Uuid,
    pub event_detail_id: uuid::Uuid,
    pub start_date_time: chrono::DateTime<chrono::Utc>,
    pub end_date_time: chrono::DateTime<chrono::Utc>,
    pub online_meeting: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl EventRepetitionRow {
    /// ## Errors
    /// Returns `DbError::InvalidRow` if the meeting binding cannot be serialized.
    pub fn from_repetition(repetition: &EventRepetition) -> DbResult<Self> {
        let online_meeting = repetition
            .online_meeting
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::invalid_row("event_repetition", e))?;

        Ok(Self {
            id: repetition.id,
            event_id: repetition.event_id,
            event_detail_id: repetition.event_detail_id,
            start_date_time: repetition.start_date_time,
            end_date_time: repetition.end_date_time,
            online_meeting,
            created_at: repetition.created_at,
            updated_at: repetition.updated_at,
        })
    }
}

impl TryFrom<EventRepetitionRow> for EventRepetition {
    type Error = DbError;

    fn try_from(row: EventRepetitionRow) -> DbResult<Self> {
        let online_meeting = row
            .online_meeting
            .map(serde_json::from_value::<OnlineMeeting>)
            .transpose()
            .map_err(|e| DbError::invalid_row("event_repetition", e))?;

        Ok(Self {
            id: row.id,
            event_id: row.event_id,
            event_detail_id: row.event_detail_id,
            start_date_time: row.start_date_time,
            end_date_time: row.end_date_time,
            online_meeting,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
