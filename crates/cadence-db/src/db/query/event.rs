//! Query composition for `event`.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::schema::event;
use crate::model::event::EventRow;

/// ## Summary
/// Fetches an event root by id.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn by_id(conn: &mut AsyncPgConnection, id: Uuid) -> QueryResult<Option<EventRow>> {
    event::table
        .find(id)
        .select(EventRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Inserts an event root.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn insert(conn: &mut AsyncPgConnection, row: &EventRow) -> QueryResult<()> {
    diesel::insert_into(event::table)
        .values(row)
        .execute(conn)
        .await?;
    Ok(())
}

/// ## Summary
/// Overwrites every column of an existing event root.
///
/// ## Errors
/// Returns `diesel::result::Error::NotFound` if no row has the event's id.
pub async fn update(conn: &mut AsyncPgConnection, row: &EventRow) -> QueryResult<()> {
    let affected = diesel::update(event::table.find(row.id))
        .set(row)
        .execute(conn)
        .await?;
    if affected == 0 {
        return Err(diesel::result::Error::NotFound);
    }
    Ok(())
}

/// ## Summary
/// Deletes an event root. Its occurrences cascade.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn delete_by_id(conn: &mut AsyncPgConnection, id: Uuid) -> QueryResult<usize> {
    diesel::delete(event::table.find(id)).execute(conn).await
}
