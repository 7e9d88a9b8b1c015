//! In-process aggregate store.
//!
//! ## Summary
//! Keeps the three tables in hash maps behind one `RwLock`. Writes are staged on a copy
//! of the tables and swapped in only when every part succeeds, so a failed write leaves
//! nothing behind. Referential checks mirror the foreign keys of the `PostgreSQL` schema.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use cadence_core::model::{Aggregate, Event, EventDetail, EventRepetition};
use cadence_core::store::{
    AggregateStore, ChangeSet, CreatedAggregate, NewAggregate, StoreError, StoreFuture,
    StoreResult,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    details: HashMap<Uuid, EventDetail>,
    events: HashMap<Uuid, Event>,
    repetitions: HashMap<Uuid, EventRepetition>,
}

impl Tables {
    fn aggregate(&self, event_id: Uuid) -> StoreResult<Aggregate> {
        let event = self
            .events
            .get(&event_id)
            .cloned()
            .ok_or(StoreError::event_not_found(event_id))?;
        let detail = self.detail(event.event_detail_id)?.clone();
        let occurrences: Vec<EventRepetition> = self
            .repetitions
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();

        let mut fork_ids: Vec<Uuid> = occurrences
            .iter()
            .map(|o| o.event_detail_id)
            .filter(|id| *id != detail.id)
            .collect();
        fork_ids.sort_unstable();
        fork_ids.dedup();
        let forks = fork_ids
            .into_iter()
            .map(|id| self.detail(id).cloned())
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Aggregate::new(detail, event, occurrences, forks))
    }

    fn detail(&self, id: Uuid) -> StoreResult<&EventDetail> {
        self.details
            .get(&id)
            .ok_or_else(|| StoreError::Integrity(format!("missing event detail {id}")))
    }

    fn owned_repetition(&mut self, event_id: Uuid, id: Uuid) -> StoreResult<&mut EventRepetition> {
        self.repetitions
            .get_mut(&id)
            .filter(|r| r.event_id == event_id)
            .ok_or(StoreError::occurrence_not_found(id))
    }

    fn insert_detail(&mut self, detail: EventDetail) -> StoreResult<()> {
        if self.details.contains_key(&detail.id) {
            return Err(StoreError::Integrity(format!(
                "duplicate event detail {}",
                detail.id
            )));
        }
        self.details.insert(detail.id, detail);
        Ok(())
    }

    fn check_repetition(&self, row: &EventRepetition) -> StoreResult<()> {
        if !self.events.contains_key(&row.event_id) {
            return Err(StoreError::Integrity(format!(
                "occurrence {} references missing event {}",
                row.id, row.event_id
            )));
        }
        self.detail(row.event_detail_id)?;
        if row.start_date_time >= row.end_date_time {
            return Err(StoreError::Integrity(format!(
                "occurrence {} ends before it starts",
                row.id
            )));
        }
        Ok(())
    }

    fn insert_repetition(&mut self, row: EventRepetition) -> StoreResult<()> {
        if self.repetitions.contains_key(&row.id) {
            return Err(StoreError::Integrity(format!("duplicate occurrence {}", row.id)));
        }
        self.check_repetition(&row)?;
        self.repetitions.insert(row.id, row);
        Ok(())
    }

    fn create(&mut self, aggregate: NewAggregate) -> StoreResult<()> {
        let NewAggregate {
            detail,
            event,
            occurrences,
        } = aggregate;
        if event.event_detail_id != detail.id {
            return Err(StoreError::Integrity(
                "event does not reference the new detail".to_string(),
            ));
        }
        if self.events.contains_key(&event.id) {
            return Err(StoreError::Integrity(format!("duplicate event {}", event.id)));
        }
        self.insert_detail(detail)?;
        self.events.insert(event.id, event);
        for row in occurrences {
            self.insert_repetition(row)?;
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) -> StoreResult<()> {
        let event_id = changes.event_id;
        if !self.events.contains_key(&event_id) {
            return Err(StoreError::event_not_found(event_id));
        }

        for fork in changes.forks {
            let fork_id = fork.detail.id;
            self.insert_detail(fork.detail)?;
            self.owned_repetition(event_id, fork.occurrence_id)?
                .event_detail_id = fork_id;
        }

        for detail in changes.updated_details {
            let slot = self.details.get_mut(&detail.id).ok_or(StoreError::NotFound {
                entity: "event detail",
                id: detail.id,
            })?;
            *slot = detail;
        }

        if let Some(event) = changes.event {
            if event.id != event_id {
                return Err(StoreError::Integrity(format!(
                    "change set for {event_id} rewrites event {}",
                    event.id
                )));
            }
            self.detail(event.event_detail_id)?;
            self.events.insert(event.id, event);
        }

        for id in changes.deleted_occurrences {
            self.owned_repetition(event_id, id)?;
            self.repetitions.remove(&id);
        }

        for row in changes.updated_occurrences {
            self.check_repetition(&row)?;
            let id = row.id;
            *self.owned_repetition(event_id, id)? = row;
        }

        for row in changes.inserted_occurrences {
            self.insert_repetition(row)?;
        }

        for id in changes.deleted_details {
            let referenced = self.events.values().any(|e| e.event_detail_id == id)
                || self.repetitions.values().any(|r| r.event_detail_id == id);
            if referenced {
                return Err(StoreError::Integrity(format!(
                    "event detail {id} is still referenced"
                )));
            }
            self.details.remove(&id);
        }

        Ok(())
    }

    fn remove(&mut self, event_id: Uuid) -> StoreResult<()> {
        let event = self
            .events
            .remove(&event_id)
            .ok_or(StoreError::event_not_found(event_id))?;

        let mut detail_ids = vec![event.event_detail_id];
        self.repetitions.retain(|_, r| {
            if r.event_id != event_id {
                return true;
            }
            detail_ids.push(r.event_detail_id);
            false
        });
        for id in detail_ids {
            self.details.remove(&id);
        }
        Ok(())
    }
}

/// Aggregate store held in memory, for tests and single-process embedding. Clones share
/// the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_next: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next write fail with a backend error before touching any table.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub async fn detail_count(&self) -> usize {
        self.tables.read().await.details.len()
    }

    pub async fn occurrence_count(&self) -> usize {
        self.tables.read().await.repetitions.len()
    }

    fn check_failure(&self) -> StoreResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            tracing::warn!("Injected store failure");
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }

    /// Runs `write` on a staged copy and publishes it only on success.
    async fn write<F>(&self, write: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Tables) -> StoreResult<()> + Send,
    {
        self.check_failure()?;
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        write(&mut staged)?;
        *tables = staged;
        Ok(())
    }
}

impl AggregateStore for MemoryStore {
    fn create_aggregate(&self, aggregate: NewAggregate) -> StoreFuture<'_, CreatedAggregate> {
        async move {
            let created = CreatedAggregate::from(&aggregate);
            self.write(move |tables| tables.create(aggregate)).await?;
            tracing::debug!(event_id = %created.event_id, occurrences = created.occurrence_ids.len(), "Aggregate created");
            Ok(created)
        }
        .boxed()
    }

    fn load_aggregate(&self, event_id: Uuid) -> StoreFuture<'_, Aggregate> {
        async move { self.tables.read().await.aggregate(event_id) }.boxed()
    }

    fn load_occurrence(&self, occurrence_id: Uuid) -> StoreFuture<'_, EventRepetition> {
        async move {
            self.tables
                .read()
                .await
                .repetitions
                .get(&occurrence_id)
                .cloned()
                .ok_or(StoreError::occurrence_not_found(occurrence_id))
        }
        .boxed()
    }

    fn list_occurrences(
        &self,
        event_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> StoreFuture<'_, Vec<EventRepetition>> {
        async move {
            let tables = self.tables.read().await;
            if !tables.events.contains_key(&event_id) {
                return Err(StoreError::event_not_found(event_id));
            }
            let mut rows: Vec<EventRepetition> = tables
                .repetitions
                .values()
                .filter(|r| r.event_id == event_id)
                .filter(|r| after.is_none_or(|after| r.start_date_time >= after))
                .cloned()
                .collect();
            rows.sort_by_key(|r| (r.start_date_time, r.id));
            Ok(rows)
        }
        .boxed()
    }

    fn fork_detail_for_occurrence(
        &self,
        occurrence_id: Uuid,
        fork_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, EventDetail> {
        async move {
            let mut fork = None;
            self.write(|tables| {
                let row = tables
                    .repetitions
                    .get(&occurrence_id)
                    .ok_or(StoreError::occurrence_not_found(occurrence_id))?;
                let detail = tables.detail(row.event_detail_id)?.fork(fork_id, now);
                let event_id = row.event_id;
                tables.insert_detail(detail.clone())?;
                tables.owned_repetition(event_id, occurrence_id)?.event_detail_id = fork_id;
                fork = Some(detail);
                Ok(())
            })
            .await?;
            fork.ok_or_else(|| StoreError::Backend("fork was not recorded".to_string()))
        }
        .boxed()
    }

    fn commit(&self, changes: ChangeSet) -> StoreFuture<'_, ()> {
        async move {
            let event_id = changes.event_id;
            self.write(move |tables| tables.apply(changes)).await?;
            tracing::debug!(%event_id, "Change set committed");
            Ok(())
        }
        .boxed()
    }

    fn delete_aggregate(&self, event_id: Uuid) -> StoreFuture<'_, ()> {
        async move {
            self.write(move |tables| tables.remove(event_id)).await?;
            tracing::debug!(%event_id, "Aggregate deleted");
            Ok(())
        }
        .boxed()
    }
}
