//! Query composition for `event_repetition`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::schema::event_repetition;
use crate::model::repetition::EventRepetitionRow;

/// ## Summary
/// Fetches an occurrence by id.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn by_id(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> QueryResult<Option<EventRepetitionRow>> {
    event_repetition::table
        .find(id)
        .select(EventRepetitionRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Lists the occurrences of an event ordered by start, optionally only those starting at
/// or after `after`.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn by_event(
    conn: &mut AsyncPgConnection,
    event_id: Uuid,
    after: Option<DateTime<Utc>>,
) -> QueryResult<Vec<EventRepetitionRow>> {
    let mut query = event_repetition::table
        .filter(event_repetition::event_id.eq(event_id))
        .select(EventRepetitionRow::as_select())
        .into_boxed();

    if let Some(after) = after {
        query = query.filter(event_repetition::start_date_time.ge(after));
    }

    query
        .order((
            event_repetition::start_date_time.asc(),
            event_repetition::id.asc(),
        ))
        .load(conn)
        .await
}

/// ## Summary
/// Inserts multiple occurrences in a batch.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn insert_batch(
    conn: &mut AsyncPgConnection,
    rows: &[EventRepetitionRow],
) -> QueryResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    diesel::insert_into(event_repetition::table)
        .values(rows)
        .execute(conn)
        .await?;
    Ok(())
}

/// ## Summary
/// Overwrites every column of an existing occurrence.
///
/// ## Errors
/// Returns `diesel::result::Error::NotFound` if no row has the occurrence's id.
pub async fn update(conn: &mut AsyncPgConnection, row: &EventRepetitionRow) -> QueryResult<()> {
    let affected = diesel::update(event_repetition::table.find(row.id))
        .set(row)
        .execute(conn)
        .await?;
    if affected == 0 {
        return Err(diesel::result::Error::NotFound);
    }
    Ok(())
}

/// ## Summary
/// Points an occurrence at another detail.
///
/// ## Errors
/// Returns `diesel::result::Error::NotFound` if the occurrence does not exist.
pub async fn repoint(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    event_detail_id: Uuid,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let affected = diesel::update(event_repetition::table.find(id))
        .set((
            event_repetition::event_detail_id.eq(event_detail_id),
            event_repetition::updated_at.eq(now),
        ))
        .execute(conn)
        .await?;
    if affected == 0 {
        return Err(diesel::result::Error::NotFound);
    }
    Ok(())
}

/// ## Summary
/// Deletes the given occurrences of one event.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn delete_by_ids(
    conn: &mut AsyncPgConnection,
    event_id: Uuid,
    ids: &[Uuid],
) -> QueryResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    diesel::delete(
        event_repetition::table
            .filter(event_repetition::event_id.eq(event_id))
            .filter(event_repetition::id.eq_any(ids)),
    )
    .execute(conn)
    .await
}

/// ## Summary
/// Returns the distinct detail ids referenced by an event's occurrences.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn detail_ids_for_event(
    conn: &mut AsyncPgConnection,
    event_id: Uuid,
) -> QueryResult<Vec<Uuid>> {
    event_repetition::table
        .filter(event_repetition::event_id.eq(event_id))
        .select(event_repetition::event_detail_id)
        .distinct()
        .load(conn)
        .await
}
