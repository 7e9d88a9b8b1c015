//! `PostgreSQL` implementation of the aggregate store.

use chrono::{DateTime, Utc};
use diesel_async::AsyncConnection;
use diesel_async::scoped_futures::ScopedFutureExt;
use futures::FutureExt;
use uuid::Uuid;

use cadence_core::model::{Aggregate, Event, EventDetail, EventRepetition};
use cadence_core::store::{
    AggregateStore, ChangeSet, CreatedAggregate, NewAggregate, StoreError, StoreFuture,
};

use crate::db::DbProvider;
use crate::db::connection::DbPool;
use crate::db::query;
use crate::error::{DbError, DbResult};
use crate::model::detail::EventDetailRow;
use crate::model::event::EventRow;
use crate::model::repetition::EventRepetitionRow;

/// Aggregate store backed by diesel-async. Every mutation runs in one transaction.
#[derive(Debug, Clone)]
pub struct PgAggregateStore<P = DbPool> {
    provider: P,
}

impl<P: DbProvider> PgAggregateStore<P> {
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    #[tracing::instrument(skip_all, fields(event_id = %aggregate.event.id, occurrences = aggregate.occurrences.len()))]
    async fn create(&self, aggregate: NewAggregate) -> DbResult<CreatedAggregate> {
        let created = CreatedAggregate::from(&aggregate);
        let detail = EventDetailRow::from(&aggregate.detail);
        let event = EventRow::from_event(&aggregate.event)?;
        let occurrences = aggregate
            .occurrences
            .iter()
            .map(EventRepetitionRow::from_repetition)
            .collect::<DbResult<Vec<_>>>()?;

        let mut conn = self.provider.get_connection().await?;
        conn.transaction::<_, DbError, _>(move |tx| {
            async move {
                query::detail::insert_batch(tx, std::slice::from_ref(&detail)).await?;
                query::event::insert(tx, &event).await?;
                query::repetition::insert_batch(tx, &occurrences).await?;
                tracing::trace!(rows = occurrences.len(), "Inserted occurrence rows");
                Ok(())
            }
            .scope_boxed()
        })
        .await?;

        tracing::debug!("Aggregate created");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn load(&self, event_id: Uuid) -> DbResult<Aggregate> {
        let mut conn = self.provider.get_connection().await?;

        let event_row = query::event::by_id(&mut conn, event_id)
            .await?
            .ok_or(StoreError::event_not_found(event_id))?;
        let event = Event::try_from(event_row)?;

        let detail = query::detail::by_id(&mut conn, event.event_detail_id)
            .await?
            .map(EventDetail::from)
            .ok_or_else(|| {
                StoreError::Integrity(format!(
                    "event {event_id} references missing detail {}",
                    event.event_detail_id
                ))
            })?;

        let occurrences = query::repetition::by_event(&mut conn, event_id, None)
            .await?
            .into_iter()
            .map(EventRepetition::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        let mut fork_ids: Vec<Uuid> = occurrences
            .iter()
            .map(|o| o.event_detail_id)
            .filter(|id| *id != detail.id)
            .collect();
        fork_ids.sort_unstable();
        fork_ids.dedup();

        let forks = query::detail::by_ids(&mut conn, &fork_ids)
            .await?
            .into_iter()
            .map(EventDetail::from)
            .collect();

        Ok(Aggregate::new(detail, event, occurrences, forks))
    }

    #[tracing::instrument(skip(self))]
    async fn occurrence(&self, occurrence_id: Uuid) -> DbResult<EventRepetition> {
        let mut conn = self.provider.get_connection().await?;
        let row = query::repetition::by_id(&mut conn, occurrence_id)
            .await?
            .ok_or(StoreError::occurrence_not_found(occurrence_id))?;
        EventRepetition::try_from(row)
    }

    #[tracing::instrument(skip(self))]
    async fn occurrences(
        &self,
        event_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<EventRepetition>> {
        let mut conn = self.provider.get_connection().await?;
        if query::event::by_id(&mut conn, event_id).await?.is_none() {
            return Err(StoreError::event_not_found(event_id).into());
        }

        query::repetition::by_event(&mut conn, event_id, after)
            .await?
            .into_iter()
            .map(EventRepetition::try_from)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn fork(
        &self,
        occurrence_id: Uuid,
        fork_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<EventDetail> {
        let mut conn = self.provider.get_connection().await?;
        conn.transaction::<_, DbError, _>(move |tx| {
            async move {
                let occurrence = query::repetition::by_id(tx, occurrence_id)
                    .await?
                    .ok_or(StoreError::occurrence_not_found(occurrence_id))?;
                let source = query::detail::by_id(tx, occurrence.event_detail_id)
                    .await?
                    .map(EventDetail::from)
                    .ok_or_else(|| {
                        StoreError::Integrity(format!(
                            "occurrence {occurrence_id} references missing detail {}",
                            occurrence.event_detail_id
                        ))
                    })?;

                let fork = source.fork(fork_id, now);
                query::detail::insert_batch(tx, &[EventDetailRow::from(&fork)]).await?;
                query::repetition::repoint(tx, occurrence_id, fork_id, now).await?;

                tracing::debug!(source_detail_id = %source.id, "Detail forked");
                Ok(fork)
            }
            .scope_boxed()
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(event_id = %changes.event_id))]
    async fn apply(&self, changes: ChangeSet) -> DbResult<()> {
        let event_id = changes.event_id;
        let fork_rows: Vec<EventDetailRow> = changes
            .forks
            .iter()
            .map(|f| EventDetailRow::from(&f.detail))
            .collect();
        let repoints: Vec<(Uuid, Uuid, DateTime<Utc>)> = changes
            .forks
            .iter()
            .map(|f| (f.occurrence_id, f.detail.id, f.detail.updated_at))
            .collect();
        let detail_rows: Vec<EventDetailRow> = changes
            .updated_details
            .iter()
            .map(EventDetailRow::from)
            .collect();
        let event_row = changes.event.as_ref().map(EventRow::from_event).transpose()?;
        let updated_rows = changes
            .updated_occurrences
            .iter()
            .map(EventRepetitionRow::from_repetition)
            .collect::<DbResult<Vec<_>>>()?;
        let inserted_rows = changes
            .inserted_occurrences
            .iter()
            .map(EventRepetitionRow::from_repetition)
            .collect::<DbResult<Vec<_>>>()?;
        let deleted_occurrences = changes.deleted_occurrences;
        let deleted_details = changes.deleted_details;

        let mut conn = self.provider.get_connection().await?;
        conn.transaction::<_, DbError, _>(move |tx| {
            async move {
                if query::event::by_id(tx, event_id).await?.is_none() {
                    return Err(StoreError::event_not_found(event_id).into());
                }

                query::detail::insert_batch(tx, &fork_rows).await?;
                for (occurrence_id, detail_id, at) in repoints {
                    query::repetition::repoint(tx, occurrence_id, detail_id, at).await?;
                }
                for row in &detail_rows {
                    query::detail::update(tx, row).await?;
                }
                if let Some(row) = &event_row {
                    query::event::update(tx, row).await?;
                }

                let deleted =
                    query::repetition::delete_by_ids(tx, event_id, &deleted_occurrences).await?;
                if deleted != deleted_occurrences.len() {
                    return Err(StoreError::Integrity(format!(
                        "expected to delete {} occurrences, deleted {deleted}",
                        deleted_occurrences.len()
                    ))
                    .into());
                }

                for row in &updated_rows {
                    query::repetition::update(tx, row).await?;
                }
                query::repetition::insert_batch(tx, &inserted_rows).await?;
                query::detail::delete_by_ids(tx, &deleted_details).await?;

                tracing::trace!(
                    forks = fork_rows.len(),
                    updated = updated_rows.len(),
                    inserted = inserted_rows.len(),
                    deleted = deleted_occurrences.len(),
                    "Change set applied"
                );
                Ok(())
            }
            .scope_boxed()
        })
        .await?;

        tracing::debug!("Change set committed");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, event_id: Uuid) -> DbResult<()> {
        let mut conn = self.provider.get_connection().await?;
        conn.transaction::<_, DbError, _>(move |tx| {
            async move {
                let event = query::event::by_id(tx, event_id)
                    .await?
                    .ok_or(StoreError::event_not_found(event_id))?;

                let mut detail_ids = query::repetition::detail_ids_for_event(tx, event_id).await?;
                if !detail_ids.contains(&event.event_detail_id) {
                    detail_ids.push(event.event_detail_id);
                }

                query::event::delete_by_id(tx, event_id).await?;
                let removed = query::detail::delete_by_ids(tx, &detail_ids).await?;
                tracing::trace!(details = removed, "Removed details");
                Ok(())
            }
            .scope_boxed()
        })
        .await?;

        tracing::debug!("Aggregate deleted");
        Ok(())
    }
}

impl<P: DbProvider> AggregateStore for PgAggregateStore<P> {
    fn create_aggregate(&self, aggregate: NewAggregate) -> StoreFuture<'_, CreatedAggregate> {
        self.create(aggregate).map(|r| r.map_err(StoreError::from)).boxed()
    }

    fn load_aggregate(&self, event_id: Uuid) -> StoreFuture<'_, Aggregate> {
        self.load(event_id).map(|r| r.map_err(StoreError::from)).boxed()
    }

    fn load_occurrence(&self, occurrence_id: Uuid) -> StoreFuture<'_, EventRepetition> {
        self.occurrence(occurrence_id)
            .map(|r| r.map_err(StoreError::from))
            .boxed()
    }

    fn list_occurrences(
        &self,
        event_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> StoreFuture<'_, Vec<EventRepetition>> {
        self.occurrences(event_id, after)
            .map(|r| r.map_err(StoreError::from))
            .boxed()
    }

    fn fork_detail_for_occurrence(
        &self,
        occurrence_id: Uuid,
        fork_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, EventDetail> {
        self.fork(occurrence_id, fork_id, now)
            .map(|r| r.map_err(StoreError::from))
            .boxed()
    }

    fn commit(&self, changes: ChangeSet) -> StoreFuture<'_, ()> {
        self.apply(changes).map(|r| r.map_err(StoreError::from)).boxed()
    }

    fn delete_aggregate(&self, event_id: Uuid) -> StoreFuture<'_, ()> {
        self.remove(event_id).map(|r| r.map_err(StoreError::from)).boxed()
    }
}
