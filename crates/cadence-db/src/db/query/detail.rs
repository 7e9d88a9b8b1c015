//! Query composition for `event_detail`.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::schema::event_detail;
use crate::model::detail::EventDetailRow;

/// ## Summary
/// Fetches a detail by id.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn by_id(conn: &mut AsyncPgConnection, id: Uuid) -> QueryResult<Option<EventDetailRow>> {
    event_detail::table
        .find(id)
        .select(EventDetailRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Fetches every detail whose id is in `ids`.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn by_ids(conn: &mut AsyncPgConnection, ids: &[Uuid]) -> QueryResult<Vec<EventDetailRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    event_detail::table
        .filter(event_detail::id.eq_any(ids))
        .select(EventDetailRow::as_select())
        .load(conn)
        .await
}

/// ## Summary
/// Inserts multiple details in a batch.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn insert_batch(conn: &mut AsyncPgConnection, details: &[EventDetailRow]) -> QueryResult<()> {
    if details.is_empty() {
        return Ok(());
    }

    diesel::insert_into(event_detail::table)
        .values(details)
        .execute(conn)
        .await?;
    Ok(())
}

/// ## Summary
/// Overwrites every column of an existing detail.
///
/// ## Errors
/// Returns `diesel::result::Error::NotFound` if no row has the detail's id.
pub async fn update(conn: &mut AsyncPgConnection, detail: &EventDetailRow) -> QueryResult<()> {
    let affected = diesel::update(event_detail::table.find(detail.id))
        .set(detail)
        .execute(conn)
        .await?;
    if affected == 0 {
        return Err(diesel::result::Error::NotFound);
    }
    Ok(())
}

/// ## Summary
/// Deletes the details whose id is in `ids`.
///
/// ## Errors
/// Returns an error if the database operation fails, including when a detail is still
/// referenced.
pub async fn delete_by_ids(conn: &mut AsyncPgConnection, ids: &[Uuid]) -> QueryResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    diesel::delete(event_detail::table.filter(event_detail::id.eq_any(ids)))
        .execute(conn)
        .await
}
