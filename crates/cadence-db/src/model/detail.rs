use diesel::{pg::Pg, prelude::*};

use cadence_core::model::EventDetail;

use crate::db::enums::{DetailKind, DetailStatus};
use crate::db::schema;

/// Shared content of a series, or a fork of it
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset)]
#[diesel(table_name = schema::event_detail)]
#[diesel(check_for_backend(Pg))]
#[diesel(treat_none_as_null = true)]
pub struct EventDetailRow {
    pub id: uuid::Uuid,
    pub title: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub kind: DetailKind,
    pub is_restricted: bool,
    pub location: Option<String>,
    pub online_provider: Option<String>,
    pub capacity: Option<i32>,
    pub recordings: Option<serde_json::Value>,
    pub status: DetailStatus,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&EventDetail> for EventDetailRow {
    fn from(detail: &EventDetail) -> Self {
        Self {
            id: detail.id,
            title: detail.title.clone(),
            description: detail.description.clone(),
            short_description: detail.short_description.clone(),
            kind: detail.kind.into(),
            is_restricted: detail.is_restricted,
            location: detail.location.clone(),
            online_provider: detail.online_provider.clone(),
            capacity: detail.capacity,
            recordings: detail.recordings.clone(),
            status: detail.status.into(),
            metadata: detail.metadata.clone(),
            created_at: detail.created_at,
            updated_at: detail.updated_at,
        }
    }
}

impl From<EventDetailRow> for EventDetail {
    fn from(row: EventDetailRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            short_description: row.short_description,
            kind: row.kind.into(),
            is_restricted: row.is_restricted,
            location: row.location,
            online_provider: row.online_provider,
            capacity: row.capacity,
            recordings: row.recordings,
            status: row.status.into(),
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
