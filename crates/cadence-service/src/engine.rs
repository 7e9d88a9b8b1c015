//! Entry points of the scheduling engine.
//!
//! ## Summary
//! [`EventEngine`] ties the validator, the generator and the propagation planner to an
//! [`AggregateStore`]. Each mutating call loads what it needs, plans in memory, commits
//! one change set and then notifies the publisher. The clock is read once per call, so
//! every time-relative rule of one request sees the same instant.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cadence_core::clock::{Clock, SystemClock};
use cadence_core::config::EngineConfig;
use cadence_core::model::{
    Aggregate, Event, EventDetail, EventRepetition, OccurrenceWindow,
};
use cadence_core::store::{AggregateStore, CreatedAggregate, NewAggregate};

use crate::draft::{DetailDraft, EventDraft, ExpandedDraft, ValidatedDraft};
use crate::error::{GenerationError, Rule, ServiceError, ServiceResult, Violation};
use crate::generator;
use crate::propagation::{
    self, AffectedOccurrences, DeleteMode, DeletePlan, EditScope, EventDelta, PlanContext,
    UpdatePlan,
};
use crate::publish::{ChangeKind, ChangeNotice, EventPublisher, NoopPublisher};
use crate::validator::{self, ValidationContext};

/// The recurring-event engine.
#[derive(Debug, Clone)]
pub struct EventEngine<S, C = SystemClock, P = NoopPublisher> {
    store: S,
    clock: C,
    publisher: P,
    config: EngineConfig,
}

impl<S: AggregateStore> EventEngine<S> {
    #[must_use]
    pub const fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            clock: SystemClock,
            publisher: NoopPublisher,
            config,
        }
    }
}

impl<S, C, P> EventEngine<S, C, P>
where
    S: AggregateStore,
    C: Clock,
    P: EventPublisher,
{
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> EventEngine<S, C2, P> {
        EventEngine {
            store: self.store,
            clock,
            publisher: self.publisher,
            config: self.config,
        }
    }

    #[must_use]
    pub fn with_publisher<P2: EventPublisher>(self, publisher: P2) -> EventEngine<S, C, P2> {
        EventEngine {
            store: self.store,
            clock: self.clock,
            publisher,
            config: self.config,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn plan_context(&self) -> PlanContext {
        PlanContext {
            now: self.clock.now(),
            max_occurrences: self.config.max_occurrences,
        }
    }

    /// ## Summary
    /// Validates a creation draft and expands it into occurrence windows. Nothing is
    /// persisted.
    ///
    /// ## Errors
    /// Returns `ServiceError::Validation` with every broken rule, including a pattern
    /// that expands past the configured limit or to nothing at all.
    #[tracing::instrument(skip(self, draft), fields(recurring = draft.is_recurring))]
    pub fn validate_and_expand(&self, draft: &EventDraft) -> ServiceResult<ExpandedDraft> {
        let now = self.clock.now();
        let ctx = ValidationContext {
            now,
            created_at: now,
            max_occurrences: self.config.max_occurrences,
        };
        let validated = validator::validate_draft(draft, &ctx).map_err(ServiceError::Validation)?;

        let windows = match &validated.recurrence {
            None => vec![validated.base_window()],
            Some(pattern) => {
                match generator::expand(pattern, validated.base_window(), ctx.max_occurrences) {
                    Ok(windows) => windows,
                    Err(GenerationError::LimitExceeded { limit }) => {
                        return Err(ServiceError::Validation(vec![Violation::new(
                            Rule::Limit,
                            "recurrence",
                            format!("expands past {limit} occurrences"),
                        )]));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Generator rejected a validated pattern");
                        return Err(e.into());
                    }
                }
            }
        };

        if windows.is_empty() {
            return Err(ServiceError::Validation(vec![Violation::new(
                Rule::Pattern,
                "recurrence",
                "produces no occurrences",
            )]));
        }

        tracing::debug!(occurrences = windows.len(), "Draft expanded");
        Ok(ExpandedDraft {
            draft: validated,
            windows,
        })
    }

    /// ## Summary
    /// Persists a validated draft and its windows as one aggregate. Every occurrence
    /// reads from the shared detail.
    ///
    /// ## Errors
    /// Returns `ServiceError::Generation` if the windows do not fit the draft and
    /// `ServiceError::Store` if the insert fails, in which case nothing is persisted.
    #[tracing::instrument(skip(self, draft, windows), fields(occurrences = windows.len()))]
    pub async fn create_series(
        &self,
        draft: ValidatedDraft,
        windows: Vec<OccurrenceWindow>,
    ) -> ServiceResult<CreatedAggregate> {
        check_windows(&draft, &windows)?;

        let now = self.clock.now();
        let aggregate = build_aggregate(draft, &windows, now);
        let created = self.store.create_aggregate(aggregate).await?;

        tracing::info!(
            event_id = %created.event_id,
            occurrences = created.occurrence_ids.len(),
            "Series created"
        );
        self.notify(ChangeNotice {
            kind: ChangeKind::Created,
            event_id: created.event_id,
            occurrences: AffectedOccurrences {
                created: created.occurrence_ids.clone(),
                ..AffectedOccurrences::default()
            },
            scope: None,
        })
        .await;
        Ok(created)
    }

    /// ## Summary
    /// Computes the change set an update would commit, without committing it.
    ///
    /// ## Errors
    /// Same as [`Self::propose_update`], minus store write failures.
    #[tracing::instrument(skip(self, delta))]
    pub async fn plan_update(
        &self,
        event_id: Uuid,
        scope: EditScope,
        delta: &EventDelta,
    ) -> ServiceResult<UpdatePlan> {
        let aggregate = self.store.load_aggregate(event_id).await?;
        propagation::plan_update(&aggregate, scope, delta, &self.plan_context())
    }

    /// ## Summary
    /// Applies `delta` to the occurrences selected by `scope` in one atomic commit.
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound` for unknown ids, `ServiceError::Guard` or
    /// `ServiceError::Validation` for rejected requests and `ServiceError::Store` if the
    /// commit fails. No partial change is ever persisted.
    #[tracing::instrument(skip(self, delta))]
    pub async fn propose_update(
        &self,
        event_id: Uuid,
        scope: EditScope,
        delta: &EventDelta,
    ) -> ServiceResult<AffectedOccurrences> {
        let plan = self.plan_update(event_id, scope, delta).await?;
        if plan.is_empty() {
            tracing::debug!("Nothing to commit");
            return Ok(plan.affected);
        }

        self.store.commit(plan.changes).await?;
        tracing::info!(
            updated = plan.affected.updated.len(),
            created = plan.affected.created.len(),
            deleted = plan.affected.deleted.len(),
            "Update committed"
        );

        self.notify(ChangeNotice {
            kind: ChangeKind::Updated,
            event_id,
            occurrences: plan.affected.clone(),
            scope: Some(scope),
        })
        .await;
        Ok(plan.affected)
    }

    /// ## Summary
    /// Deletes the occurrences selected by `scope`. Soft deletes mark their details
    /// inactive; hard deletes remove rows, and remove the whole aggregate when nothing
    /// would remain.
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound`, `ServiceError::Guard` or `ServiceError::Store`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        event_id: Uuid,
        scope: EditScope,
        mode: DeleteMode,
    ) -> ServiceResult<AffectedOccurrences> {
        let aggregate = self.store.load_aggregate(event_id).await?;
        let affected = match propagation::plan_delete(&aggregate, scope, mode, self.clock.now())? {
            DeletePlan::Commit(plan) => {
                self.store.commit(plan.changes).await?;
                plan.affected
            }
            DeletePlan::DropAggregate(affected) => {
                self.store.delete_aggregate(event_id).await?;
                affected
            }
        };

        tracing::info!(?mode, occurrences = affected.updated.len() + affected.deleted.len(), "Delete committed");
        self.notify(ChangeNotice {
            kind: ChangeKind::Deleted,
            event_id,
            occurrences: affected.clone(),
            scope: Some(scope),
        })
        .await;
        Ok(affected)
    }

    /// ## Summary
    /// Occurrence windows of a series in start order.
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound` for an unknown event.
    pub async fn list_occurrences(&self, event_id: Uuid) -> ServiceResult<Vec<OccurrenceWindow>> {
        Ok(self
            .occurrences(event_id, None)
            .await?
            .iter()
            .map(EventRepetition::window)
            .collect())
    }

    /// ## Summary
    /// Occurrence rows of a series in start order, optionally only those starting at or
    /// after `after`.
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound` for an unknown event.
    pub async fn occurrences(
        &self,
        event_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> ServiceResult<Vec<EventRepetition>> {
        Ok(self.store.list_occurrences(event_id, after).await?)
    }

    /// ## Errors
    /// Returns `ServiceError::NotFound` for an unknown event.
    pub async fn load(&self, event_id: Uuid) -> ServiceResult<Aggregate> {
        Ok(self.store.load_aggregate(event_id).await?)
    }

    async fn notify(&self, notice: ChangeNotice) {
        if !self.config.publish_events {
            return;
        }
        let event_id = notice.event_id;
        if let Err(e) = self.publisher.publish(notice).await {
            tracing::error!(%event_id, error = %e, "Failed to publish change notice");
        }
    }
}

/// Rejects windows that do not belong to `draft`.
fn check_windows(draft: &ValidatedDraft, windows: &[OccurrenceWindow]) -> ServiceResult<()> {
    let base = draft.base_window();
    let Some(first) = windows.first() else {
        return Err(GenerationError::WindowMismatch("no occurrences").into());
    };
    if !draft.is_recurring() && (windows.len() != 1 || *first != base) {
        return Err(GenerationError::WindowMismatch("a single event has exactly its own window").into());
    }
    if first.start < base.start {
        return Err(GenerationError::WindowMismatch("an occurrence starts before the event").into());
    }
    if windows.iter().any(|w| w.duration() != base.duration()) {
        return Err(GenerationError::WindowMismatch("an occurrence changes the event duration").into());
    }
    generator::check_ordering(windows)?;
    Ok(())
}

fn build_detail(draft: DetailDraft, now: DateTime<Utc>) -> EventDetail {
    EventDetail {
        id: Uuid::now_v7(),
        title: draft.title,
        description: draft.description,
        short_description: draft.short_description,
        kind: draft.kind,
        is_restricted: draft.is_restricted,
        location: draft.location,
        online_provider: draft.online_provider,
        capacity: draft.capacity,
        recordings: draft.recordings,
        status: draft.status,
        metadata: draft.metadata,
        created_at: now,
        updated_at: now,
    }
}

fn build_aggregate(
    draft: ValidatedDraft,
    windows: &[OccurrenceWindow],
    now: DateTime<Utc>,
) -> NewAggregate {
    let anchor = windows.first().copied().unwrap_or_else(|| draft.base_window());
    let detail = build_detail(draft.detail, now);
    let recurrence_end_date = draft
        .recurrence
        .as_ref()
        .and_then(|p| propagation::series_end(p, windows.last().copied()));
    let event = Event {
        id: Uuid::now_v7(),
        event_detail_id: detail.id,
        is_recurring: draft.recurrence.is_some(),
        recurrence: draft.recurrence,
        recurrence_end_date,
        start_date_time: anchor.start,
        end_date_time: anchor.end,
        registration: draft.registration,
        created_by: draft.created_by,
        updated_by: None,
        created_at: now,
        updated_at: now,
    };
    let occurrences = windows
        .iter()
        .map(|w| EventRepetition {
            id: Uuid::now_v7(),
            event_id: event.id,
            event_detail_id: detail.id,
            start_date_time: w.start,
            end_date_time: w.end,
            online_meeting: None,
            created_at: now,
            updated_at: now,
        })
        .collect();

    NewAggregate {
        detail,
        event,
        occurrences,
    }
}
