//! Persistence contract for the event aggregate.
//!
//! ## Summary
//! The engine computes every mutation up front as a [`ChangeSet`] and hands it to an
//! [`AggregateStore`] in one call. Implementations must apply a change set, or a new
//! aggregate, all-or-nothing.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Aggregate, Event, EventDetail, EventRepetition};

/// Errors raised by aggregate store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    #[must_use]
    pub const fn event_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "event",
            id,
        }
    }

    #[must_use]
    pub const fn occurrence_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "occurrence",
            id,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Boxed future returned by store operations, so the trait stays object safe.
pub type StoreFuture<'a, T> = BoxFuture<'a, StoreResult<T>>;

/// Rows of a series about to be created. Identities are assigned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAggregate {
    pub detail: EventDetail,
    pub event: Event,
    /// Ordered by start time ascending.
    pub occurrences: Vec<EventRepetition>,
}

/// Identities of a freshly created series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAggregate {
    pub event_id: Uuid,
    pub detail_id: Uuid,
    pub occurrence_ids: Vec<Uuid>,
}

impl From<&NewAggregate> for CreatedAggregate {
    fn from(aggregate: &NewAggregate) -> Self {
        Self {
            event_id: aggregate.event.id,
            detail_id: aggregate.detail.id,
            occurrence_ids: aggregate.occurrences.iter().map(|o| o.id).collect(),
        }
    }
}

/// A new detail cloned for one occurrence, which is repointed to it.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFork {
    pub occurrence_id: Uuid,
    pub detail: EventDetail,
}

/// Every row mutation of one propagation, applied atomically by [`AggregateStore::commit`].
///
/// Stores apply the parts in this order: forks, detail updates, event update,
/// occurrence deletes, occurrence updates, occurrence inserts, detail deletes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeSet {
    pub event_id: Uuid,
    pub forks: Vec<DetailFork>,
    pub updated_details: Vec<EventDetail>,
    pub event: Option<Event>,
    pub deleted_occurrences: Vec<Uuid>,
    pub updated_occurrences: Vec<EventRepetition>,
    pub inserted_occurrences: Vec<EventRepetition>,
    /// Forked details left without any occurrence.
    pub deleted_details: Vec<Uuid>,
}

impl ChangeSet {
    #[must_use]
    pub fn new(event_id: Uuid) -> Self {
        Self {
            event_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forks.is_empty()
            && self.updated_details.is_empty()
            && self.event.is_none()
            && self.deleted_occurrences.is_empty()
            && self.updated_occurrences.is_empty()
            && self.inserted_occurrences.is_empty()
            && self.deleted_details.is_empty()
    }
}

/// Durable home of event aggregates.
pub trait AggregateStore: Send + Sync {
    /// ## Summary
    /// Inserts the detail, the event and every occurrence in one atomic unit.
    ///
    /// ## Errors
    /// Returns `StoreError` if any insert fails; nothing is persisted in that case.
    fn create_aggregate(&self, aggregate: NewAggregate) -> StoreFuture<'_, CreatedAggregate>;

    /// ## Errors
    /// Returns `StoreError::NotFound` for an unknown event id.
    fn load_aggregate(&self, event_id: Uuid) -> StoreFuture<'_, Aggregate>;

    /// ## Errors
    /// Returns `StoreError::NotFound` for an unknown occurrence id.
    fn load_occurrence(&self, occurrence_id: Uuid) -> StoreFuture<'_, EventRepetition>;

    /// ## Summary
    /// Lists a series' occurrences ordered by start, optionally only those starting at or
    /// after `after`.
    ///
    /// ## Errors
    /// Returns `StoreError::NotFound` for an unknown event id.
    fn list_occurrences(
        &self,
        event_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> StoreFuture<'_, Vec<EventRepetition>>;

    /// ## Summary
    /// Clones the detail an occurrence currently reads from under `fork_id` and
    /// repoints the occurrence to the clone.
    ///
    /// ## Errors
    /// Returns `StoreError::NotFound` for an unknown occurrence id.
    fn fork_detail_for_occurrence(
        &self,
        occurrence_id: Uuid,
        fork_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, EventDetail>;

    /// ## Errors
    /// Returns `StoreError` if any part fails; nothing is persisted in that case.
    fn commit(&self, changes: ChangeSet) -> StoreFuture<'_, ()>;

    /// ## Summary
    /// Removes the event, all of its occurrences and every detail they reference.
    ///
    /// ## Errors
    /// Returns `StoreError::NotFound` for an unknown event id.
    fn delete_aggregate(&self, event_id: Uuid) -> StoreFuture<'_, ()>;
}
