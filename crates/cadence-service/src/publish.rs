//! Post-commit notification hook.
//!
//! The engine calls the publisher after a store commit succeeds. A failing publisher is
//! logged and never undoes the commit.

use futures::future::BoxFuture;
use serde::Serialize;
use uuid::Uuid;

use crate::propagation::{AffectedOccurrences, EditScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// What changed in one committed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotice {
    pub kind: ChangeKind,
    pub event_id: Uuid,
    pub occurrences: AffectedOccurrences,
    /// `None` for creation.
    pub scope: Option<EditScope>,
}

/// Receives change notices, e.g. to fan out attendees or create provider meetings.
pub trait EventPublisher: Send + Sync {
    /// ## Errors
    /// Any error is logged by the engine and otherwise ignored.
    fn publish(&self, notice: ChangeNotice) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Publisher that drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, notice: ChangeNotice) -> BoxFuture<'_, anyhow::Result<()>> {
        tracing::trace!(event_id = %notice.event_id, kind = ?notice.kind, "Dropping change notice");
        Box::pin(async { Ok(()) })
    }
}

impl<P: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<P> {
    fn publish(&self, notice: ChangeNotice) -> BoxFuture<'_, anyhow::Result<()>> {
        (**self).publish(notice)
    }
}
