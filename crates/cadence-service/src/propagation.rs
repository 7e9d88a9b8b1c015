//! Update and delete planning for stored aggregates.
//!
//! ## Summary
//! Planning is pure. Given a loaded [`Aggregate`], an [`EditScope`] and a delta, it
//! computes the [`ChangeSet`] a store applies in one transaction. A request that fails a
//! guard or a validation rule produces no change set at all.
//!
//! Series scopes either regenerate the tail of the series (pattern or date changes) or
//! shift it in place (clock time changes on the same date). Occurrences before the
//! anchor are never touched by a series edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_core::model::{
    Aggregate, EndCondition, Event, EventDetail, EventKind, EventRepetition, EventStatus,
    Frequency, OccurrenceWindow, OnlineMeeting, RecurrencePattern, RegistrationWindow,
};
use cadence_core::store::{ChangeSet, DetailFork, StoreError};

use crate::draft::{EndConditionInput, PatternInput, RegistrationInput};
use crate::error::{
    GenerationError, GuardViolation, Rule, ServiceError, ServiceResult, Violation,
};
use crate::generator;
use crate::validator::{self, ValidationContext};

/// Which occurrences an update or delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "occurrenceId", rename_all = "camelCase")]
pub enum EditScope {
    ThisOccurrence(Uuid),
    ThisAndFollowing(Uuid),
    EntireSeries,
}

impl EditScope {
    #[must_use]
    pub const fn occurrence_id(self) -> Option<Uuid> {
        match self {
            Self::ThisOccurrence(id) | Self::ThisAndFollowing(id) => Some(id),
            Self::EntireSeries => None,
        }
    }
}

/// Soft deletes mark details inactive; hard deletes remove rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    #[default]
    Soft,
    Hard,
}

/// Content changes. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailDelta {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub short_description: Option<Option<String>>,
    pub kind: Option<EventKind>,
    pub is_restricted: Option<bool>,
    pub location: Option<Option<String>>,
    pub online_provider: Option<Option<String>>,
    pub capacity: Option<Option<i32>>,
    pub recordings: Option<Option<serde_json::Value>>,
    pub status: Option<EventStatus>,
    pub metadata: Option<serde_json::Value>,
}

impl DetailDelta {
    #[must_use]
    pub fn status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// ## Summary
    /// Writes every populated field onto `detail` and stamps `updated_at`.
    pub fn apply(&self, detail: &mut EventDetail, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let Some(title) = &self.title {
            detail.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            detail.description.clone_from(description);
        }
        if let Some(short_description) = &self.short_description {
            detail.short_description.clone_from(short_description);
        }
        if let Some(kind) = self.kind {
            detail.kind = kind;
        }
        if let Some(is_restricted) = self.is_restricted {
            detail.is_restricted = is_restricted;
        }
        if let Some(location) = &self.location {
            detail.location.clone_from(location);
        }
        if let Some(online_provider) = &self.online_provider {
            detail.online_provider.clone_from(online_provider);
        }
        if let Some(capacity) = self.capacity {
            detail.capacity = capacity;
        }
        if let Some(recordings) = &self.recordings {
            detail.recordings.clone_from(recordings);
        }
        if let Some(status) = self.status {
            detail.status = status;
        }
        if let Some(metadata) = &self.metadata {
            detail.metadata.clone_from(metadata);
        }
        detail.updated_at = now;
    }
}

/// A partial update. Unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDelta {
    pub detail: DetailDelta,
    pub start_date_time: Option<String>,
    pub end_date_time: Option<String>,
    pub online_meeting: Option<Option<OnlineMeeting>>,
    pub is_recurring: Option<bool>,
    pub recurrence: Option<PatternInput>,
    pub registration: Option<RegistrationInput>,
    pub attendees: Option<Vec<String>>,
    pub updated_by: Option<String>,
}

impl EventDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// First populated field that only a series scope may change.
    #[must_use]
    pub fn series_field(&self) -> Option<&'static str> {
        if self.is_recurring.is_some() {
            Some("isRecurring")
        } else if self.recurrence.as_ref().is_some_and(|p| !p.is_empty()) {
            Some("recurrence")
        } else if self.registration.is_some() {
            Some("registration")
        } else if self.detail.is_restricted.is_some() {
            Some("isRestricted")
        } else {
            None
        }
    }
}

/// Occurrence ids touched by a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedOccurrences {
    pub updated: Vec<Uuid>,
    pub created: Vec<Uuid>,
    pub deleted: Vec<Uuid>,
}

impl AffectedOccurrences {
    #[must_use]
    pub fn deleted(ids: Vec<Uuid>) -> Self {
        Self {
            deleted: ids,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.created.is_empty() && self.deleted.is_empty()
    }
}

/// A change set together with the occurrences it touches.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub changes: ChangeSet,
    pub affected: AffectedOccurrences,
}

impl UpdatePlan {
    #[must_use]
    pub fn empty(event_id: Uuid) -> Self {
        Self {
            changes: ChangeSet::new(event_id),
            affected: AffectedOccurrences::default(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Outcome of delete planning.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletePlan {
    /// Apply a change set.
    Commit(UpdatePlan),
    /// Remove the event with all of its occurrences and details.
    DropAggregate(AffectedOccurrences),
}

#[derive(Debug, Clone)]
pub struct PlanContext {
    pub now: DateTime<Utc>,
    pub max_occurrences: u16,
}

/// ## Summary
/// Plans an update of `aggregate` under `scope`.
///
/// ## Errors
/// Returns `ServiceError::NotFound` for an unknown occurrence, `ServiceError::Guard` if
/// the request targets archived or ended state or toggles recurrence illegally,
/// `ServiceError::Validation` if the resulting event breaks a rule, and
/// `ServiceError::Generation` if regeneration hits an internal contract error.
#[tracing::instrument(skip(aggregate, delta, ctx), fields(event_id = %aggregate.event.id))]
pub fn plan_update(
    aggregate: &Aggregate,
    scope: EditScope,
    delta: &EventDelta,
    ctx: &PlanContext,
) -> ServiceResult<UpdatePlan> {
    let index = target_index(aggregate, scope, ctx.now)?;
    check_guards(aggregate, scope, index, delta, ctx.now)?;

    if delta.is_empty() {
        tracing::debug!("Empty delta");
        return Ok(UpdatePlan::empty(aggregate.event.id));
    }

    let plan = match scope {
        EditScope::ThisOccurrence(_) => plan_occurrence_edit(aggregate, index, delta, ctx)?,
        EditScope::ThisAndFollowing(_) | EditScope::EntireSeries => {
            plan_series_edit(aggregate, index, delta, ctx)?
        }
    };

    tracing::debug!(
        updated = plan.affected.updated.len(),
        created = plan.affected.created.len(),
        deleted = plan.affected.deleted.len(),
        "Update planned"
    );
    Ok(plan)
}

/// ## Summary
/// Plans a delete of `aggregate` under `scope`.
///
/// ## Errors
/// Returns `ServiceError::NotFound` for an unknown occurrence and `ServiceError::Guard`
/// if the target is archived or has ended.
#[tracing::instrument(skip(aggregate), fields(event_id = %aggregate.event.id))]
pub fn plan_delete(
    aggregate: &Aggregate,
    scope: EditScope,
    mode: DeleteMode,
    now: DateTime<Utc>,
) -> ServiceResult<DeletePlan> {
    let index = target_index(aggregate, scope, now)?;
    check_guards(aggregate, scope, index, &EventDelta::default(), now)?;

    match mode {
        DeleteMode::Soft => plan_soft_delete(aggregate, scope, index, now).map(DeletePlan::Commit),
        DeleteMode::Hard => plan_hard_delete(aggregate, scope, index, now),
    }
}

/// ## Summary
/// End of the series as stored on the event row: the end date in end-date mode, the
/// last occurrence's end in count mode.
#[must_use]
pub fn series_end(
    pattern: &RecurrencePattern,
    last: Option<OccurrenceWindow>,
) -> Option<DateTime<Utc>> {
    match pattern.end_condition {
        EndCondition::EndDate(end_date) => Some(end_date),
        EndCondition::Occurrences(_) => last.map(|w| w.end),
    }
}

/// A stored registration window must still close by the series start. Bounds that
/// have already passed are not re-checked against the clock.
fn check_registration_fits(
    registration: Option<RegistrationWindow>,
    event_start: DateTime<Utc>,
    violations: &mut Vec<Violation>,
) {
    let Some(window) = registration else {
        return;
    };
    let outside = |bound: Option<DateTime<Utc>>| bound.is_some_and(|b| b > event_start);
    if outside(window.start) || outside(window.end) {
        violations.push(Violation::new(
            Rule::Registration,
            "registration",
            "must fall between event creation and event start",
        ));
    }
}

fn target_index(aggregate: &Aggregate, scope: EditScope, now: DateTime<Utc>) -> ServiceResult<usize> {
    if aggregate.occurrences.is_empty() {
        return Err(ServiceError::Store(StoreError::Integrity(format!(
            "event {} has no occurrences",
            aggregate.event.id
        ))));
    }
    match scope {
        EditScope::ThisOccurrence(id) | EditScope::ThisAndFollowing(id) => aggregate
            .index_of(id)
            .ok_or_else(|| ServiceError::NotFound(format!("occurrence {id}"))),
        // Ended occurrences stay as they are; the series is edited from the first live one.
        EditScope::EntireSeries => Ok(aggregate
            .occurrences
            .iter()
            .position(|o| !o.has_ended(now))
            .unwrap_or(0)),
    }
}

fn check_guards(
    aggregate: &Aggregate,
    scope: EditScope,
    index: usize,
    delta: &EventDelta,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let event = &aggregate.event;
    let target = &aggregate.occurrences[index];
    let mut guards = Vec::new();

    let fork_archived = matches!(scope, EditScope::ThisOccurrence(_))
        && aggregate.detail_for(target).is_some_and(EventDetail::is_archived);
    if aggregate.detail.is_archived() || fork_archived {
        guards.push(GuardViolation::Archived { event_id: event.id });
    }

    if target.has_ended(now) {
        guards.push(GuardViolation::OccurrenceEnded {
            occurrence_id: target.id,
        });
    }

    if let EditScope::ThisOccurrence(_) = scope {
        if let Some(field) = delta.series_field() {
            guards.push(GuardViolation::SeriesFieldOnOccurrence { field });
        }
    }

    match delta.is_recurring {
        Some(false) if event.is_recurring && aggregate.occurrences.len() > 1 => {
            guards.push(GuardViolation::RecurrenceToggle {
                occurrences: aggregate.occurrences.len(),
            });
        }
        Some(true)
            if !event.is_recurring
                && delta.recurrence.as_ref().is_none_or(PatternInput::is_empty) =>
        {
            guards.push(GuardViolation::RecurringWithoutPattern);
        }
        _ => {}
    }

    if guards.is_empty() {
        Ok(())
    } else {
        tracing::warn!(event_id = %event.id, ?guards, "Request rejected by guards");
        Err(ServiceError::Guard(guards))
    }
}

/// Parses the requested window. A lone start keeps the current duration; a lone end
/// keeps the current start.
fn resolve_window(
    delta: &EventDelta,
    current: OccurrenceWindow,
    violations: &mut Vec<Violation>,
) -> Option<OccurrenceWindow> {
    let start = delta
        .start_date_time
        .as_deref()
        .map(|s| validator::parse_instant_field(s, "startDateTime", violations));
    let end = delta
        .end_date_time
        .as_deref()
        .map(|e| validator::parse_instant_field(e, "endDateTime", violations));

    match (start, end) {
        (Some(None), _) | (_, Some(None)) | (None, None) => None,
        (Some(Some(start)), Some(Some(end))) => Some(OccurrenceWindow::new(start, end)),
        (Some(Some(start)), None) => Some(OccurrenceWindow::new(start, start + current.duration())),
        (None, Some(Some(end))) => Some(OccurrenceWindow::new(current.start, end)),
    }
}

fn check_neighbors(
    aggregate: &Aggregate,
    index: usize,
    window: OccurrenceWindow,
    violations: &mut Vec<Violation>,
) {
    if let Some(previous) = index.checked_sub(1).and_then(|i| aggregate.occurrences.get(i)) {
        if window.start < previous.end_date_time {
            violations.push(Violation::new(
                Rule::Schedule,
                "startDateTime",
                "overlaps the previous occurrence",
            ));
        }
    }
    if let Some(next) = aggregate.occurrences.get(index + 1) {
        if window.end > next.start_date_time {
            violations.push(Violation::new(
                Rule::Schedule,
                "endDateTime",
                "overlaps the next occurrence",
            ));
        }
    }
}

fn pattern_changes(current: Option<&RecurrencePattern>, delta: &PatternInput) -> bool {
    let Some(current) = current else {
        return true;
    };
    let current = PatternInput::from(current);
    current.changes_expansion(delta)
        || delta
            .recurring_start_date
            .is_some_and(|date| Some(date) != current.recurring_start_date)
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn plan_occurrence_edit(
    aggregate: &Aggregate,
    index: usize,
    delta: &EventDelta,
    ctx: &PlanContext,
) -> ServiceResult<UpdatePlan> {
    let event = &aggregate.event;
    let mut builder = PlanBuilder::new(aggregate, index, ctx.now);
    let mut violations = Vec::new();
    let mut row = aggregate.occurrences[index].clone();
    let mut row_changed = false;

    if let Some(window) = resolve_window(delta, row.window(), &mut violations) {
        validator::check_window(
            Some(window.start),
            Some(window.end),
            event.is_recurring,
            Some(ctx.now),
            &mut violations,
        );
        if event.is_recurring && window.duration() != event.base_window().duration() {
            violations.push(Violation::new(
                Rule::Schedule,
                "endDateTime",
                "an occurrence must keep the series duration",
            ));
        }
        check_neighbors(aggregate, index, window, &mut violations);
        row.set_window(window);
        row_changed = true;
        if !event.is_recurring {
            builder.set_anchor(window);
        }
    }

    if let Some(meeting) = &delta.online_meeting {
        row.online_meeting.clone_from(meeting);
        row_changed = true;
    }

    if let Some(attendees) = &delta.attendees {
        validator::check_attendees(Some(attendees), aggregate.detail.is_restricted, &mut violations);
    }

    if !violations.is_empty() {
        return Err(ServiceError::Validation(violations));
    }

    if !delta.detail.is_empty() {
        if event.is_recurring {
            builder.edit_occurrence_detail(&mut row, &delta.detail)?;
        } else {
            builder.update_shared_detail(&delta.detail);
        }
        builder.mark_updated(row.id);
    }

    if row_changed {
        row.updated_at = ctx.now;
        builder.mark_updated(row.id);
        builder.changes.updated_occurrences.push(row);
    }

    builder.finish(delta.updated_by.as_deref())
}

fn plan_series_edit(
    aggregate: &Aggregate,
    index: usize,
    delta: &EventDelta,
    ctx: &PlanContext,
) -> ServiceResult<UpdatePlan> {
    let current = &aggregate.event;
    let anchor = aggregate.occurrences[index].window();
    let will_recur = delta.is_recurring.unwrap_or(current.is_recurring);
    let is_restricted = delta
        .detail
        .is_restricted
        .unwrap_or(aggregate.detail.is_restricted);
    let mut builder = PlanBuilder::new(aggregate, index, ctx.now);
    let mut violations = Vec::new();

    let new_window = resolve_window(delta, anchor, &mut violations);
    if let Some(window) = new_window {
        validator::check_window(
            Some(window.start),
            Some(window.end),
            will_recur,
            Some(ctx.now),
            &mut violations,
        );
        if current.is_recurring
            && index > 0
            && window.duration() != current.base_window().duration()
        {
            violations.push(Violation::new(
                Rule::Schedule,
                "endDateTime",
                "only the entire series can change its duration",
            ));
        }
    }
    if !will_recur {
        validator::check_no_pattern(delta.recurrence.as_ref(), &mut violations);
    }

    let window = new_window.unwrap_or(anchor);
    let pattern_delta = delta.recurrence.as_ref().filter(|p| !p.is_empty());
    let date_moved =
        new_window.is_some_and(|w| w.start.date_naive() != anchor.start.date_naive());
    let regenerate = will_recur
        && (!current.is_recurring
            || date_moved
            || pattern_delta.is_some_and(|d| pattern_changes(current.recurrence.as_ref(), d)));

    if !violations.is_empty() {
        return Err(ServiceError::Validation(violations));
    }

    if regenerate {
        builder.regenerate(window, pattern_delta, ctx.max_occurrences, &mut violations)?;
    } else if let Some(window) = new_window {
        builder.retime(window, &mut violations);
    }

    if !will_recur && current.is_recurring {
        builder.event.is_recurring = false;
        builder.event.recurrence = None;
        builder.event.recurrence_end_date = None;
        builder.event_changed = true;
    }

    builder.edit_series_detail(&delta.detail, regenerate);
    builder.revalidate_registration(delta, is_restricted, &mut violations);
    if let Some(attendees) = &delta.attendees {
        validator::check_attendees(Some(attendees), is_restricted, &mut violations);
    }

    if !violations.is_empty() {
        return Err(ServiceError::Validation(violations));
    }
    builder.finish(delta.updated_by.as_deref())
}

fn plan_soft_delete(
    aggregate: &Aggregate,
    scope: EditScope,
    index: usize,
    now: DateTime<Utc>,
) -> ServiceResult<UpdatePlan> {
    let inactive = DetailDelta::status(EventStatus::Inactive);
    let mut builder = PlanBuilder::new(aggregate, index, now);

    match scope {
        EditScope::ThisOccurrence(_) if aggregate.event.is_recurring => {
            let mut row = aggregate.occurrences[index].clone();
            builder.edit_occurrence_detail(&mut row, &inactive)?;
            builder.mark_updated(row.id);
        }
        EditScope::ThisAndFollowing(_) if index > 0 => {
            for row in &aggregate.occurrences[index..] {
                let mut row = row.clone();
                builder.edit_occurrence_detail(&mut row, &inactive)?;
                builder.mark_updated(row.id);
            }
        }
        _ => {
            builder.update_shared_detail(&inactive);
            for fork in &aggregate.forks {
                let mut fork = fork.clone();
                inactive.apply(&mut fork, now);
                builder.changes.updated_details.push(fork);
            }
            for row in &aggregate.occurrences {
                builder.mark_updated(row.id);
            }
        }
    }

    builder.finish(None)
}

fn plan_hard_delete(
    aggregate: &Aggregate,
    scope: EditScope,
    index: usize,
    now: DateTime<Utc>,
) -> ServiceResult<DeletePlan> {
    let drops_everything = match scope {
        EditScope::EntireSeries => true,
        EditScope::ThisAndFollowing(_) => index == 0,
        EditScope::ThisOccurrence(_) => aggregate.occurrences.len() == 1,
    };
    if drops_everything {
        return Ok(DeletePlan::DropAggregate(AffectedOccurrences::deleted(
            aggregate.occurrences.iter().map(|o| o.id).collect(),
        )));
    }

    let mut builder = PlanBuilder::new(aggregate, index, now);
    if let EditScope::ThisOccurrence(_) = scope {
        builder.remove_target();
    } else {
        builder.truncate();
    }
    builder.finish(None).map(DeletePlan::Commit)
}

/// Accumulates the next state of one aggregate while a plan is computed.
struct PlanBuilder<'a> {
    aggregate: &'a Aggregate,
    /// Position of the anchor occurrence.
    index: usize,
    now: DateTime<Utc>,
    event: Event,
    event_changed: bool,
    changes: ChangeSet,
    affected: AffectedOccurrences,
}

impl<'a> PlanBuilder<'a> {
    fn new(aggregate: &'a Aggregate, index: usize, now: DateTime<Utc>) -> Self {
        Self {
            aggregate,
            index,
            now,
            event: aggregate.event.clone(),
            event_changed: false,
            changes: ChangeSet::new(aggregate.event.id),
            affected: AffectedOccurrences::default(),
        }
    }

    fn mark_updated(&mut self, id: Uuid) {
        if !self.affected.updated.contains(&id) {
            self.affected.updated.push(id);
        }
    }

    fn set_anchor(&mut self, window: OccurrenceWindow) {
        self.event.start_date_time = window.start;
        self.event.end_date_time = window.end;
        self.event_changed = true;
    }

    fn update_shared_detail(&mut self, delta: &DetailDelta) {
        let mut shared = self.aggregate.detail.clone();
        delta.apply(&mut shared, self.now);
        self.changes.updated_details.push(shared);
    }

    /// Gives `row` its own copy of the shared detail, or edits the copy it already has.
    fn edit_occurrence_detail(
        &mut self,
        row: &mut EventRepetition,
        delta: &DetailDelta,
    ) -> ServiceResult<()> {
        if self.aggregate.is_forked(row) {
            let Some(fork) = self.aggregate.detail_for(row) else {
                return Err(ServiceError::Store(StoreError::Integrity(format!(
                    "occurrence {} references missing detail {}",
                    row.id, row.event_detail_id
                ))));
            };
            let mut fork = fork.clone();
            delta.apply(&mut fork, self.now);
            self.changes.updated_details.push(fork);
            return Ok(());
        }

        let mut fork = self.aggregate.detail.fork(Uuid::now_v7(), self.now);
        delta.apply(&mut fork, self.now);
        tracing::debug!(occurrence_id = %row.id, fork_id = %fork.id, "Forking shared detail");
        row.event_detail_id = fork.id;
        self.changes.forks.push(DetailFork {
            occurrence_id: row.id,
            detail: fork,
        });
        Ok(())
    }

    /// Updates the shared detail once and every fork at or after the anchor. Rows that
    /// are being regenerated are skipped.
    fn edit_series_detail(&mut self, delta: &DetailDelta, regenerated: bool) {
        if delta.is_empty() {
            return;
        }
        self.update_shared_detail(delta);

        let aggregate = self.aggregate;
        for (i, row) in aggregate.occurrences.iter().enumerate() {
            let in_scope = i >= self.index;
            if regenerated && in_scope {
                continue;
            }
            if !aggregate.is_forked(row) {
                self.mark_updated(row.id);
                continue;
            }
            if !in_scope {
                continue;
            }
            if let Some(fork) = aggregate.detail_for(row) {
                let mut fork = fork.clone();
                delta.apply(&mut fork, self.now);
                self.changes.updated_details.push(fork);
                self.mark_updated(row.id);
            } else {
                tracing::warn!(occurrence_id = %row.id, "Occurrence references a missing fork");
            }
        }
    }

    /// Deletes the anchor and every later occurrence, along with their forks.
    fn drop_following(&mut self) {
        let (kept, following) = self.aggregate.occurrences.split_at(self.index);
        for row in following {
            self.changes.deleted_occurrences.push(row.id);
            self.affected.deleted.push(row.id);
            if self.aggregate.is_forked(row)
                && kept.iter().all(|k| k.event_detail_id != row.event_detail_id)
            {
                self.changes.deleted_details.push(row.event_detail_id);
            }
        }
    }

    /// Replaces the anchor and every later occurrence with a fresh expansion seeded at
    /// `window`.
    fn regenerate(
        &mut self,
        window: OccurrenceWindow,
        pattern_delta: Option<&PatternInput>,
        max_occurrences: u16,
        violations: &mut Vec<Violation>,
    ) -> ServiceResult<()> {
        let current = self.aggregate.event.recurrence.as_ref();
        let Some(pattern) =
            self.merged_pattern(window, pattern_delta, max_occurrences, violations)
        else {
            return Ok(());
        };

        let kept = count_u32(self.index);
        let generation = match pattern.end_condition {
            EndCondition::Occurrences(total) if total <= kept => {
                violations.push(Violation::new(
                    Rule::Pattern,
                    "recurrence.endCondition.occurrences",
                    format!("must exceed the {kept} occurrences before the edited one"),
                ));
                return Ok(());
            }
            EndCondition::Occurrences(total) => RecurrencePattern {
                end_condition: EndCondition::Occurrences(total - kept),
                ..pattern.clone()
            },
            EndCondition::EndDate(_) => pattern.clone(),
        };

        let windows = match generator::expand(&generation, window, max_occurrences) {
            Ok(windows) => windows,
            Err(GenerationError::LimitExceeded { limit }) => {
                violations.push(Violation::new(
                    Rule::Limit,
                    "recurrence",
                    format!("expands past {limit} occurrences"),
                ));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(first) = windows.first() else {
            violations.push(Violation::new(
                Rule::Pattern,
                "recurrence",
                "produces no occurrences",
            ));
            return Ok(());
        };
        if self.index + windows.len() > usize::from(max_occurrences) {
            violations.push(Violation::new(
                Rule::Limit,
                "recurrence",
                format!("the series would exceed {max_occurrences} occurrences"),
            ));
            return Ok(());
        }
        if let Some(last_kept) = self.index.checked_sub(1).map(|i| &self.aggregate.occurrences[i]) {
            if first.start < last_kept.end_date_time {
                violations.push(Violation::new(
                    Rule::Schedule,
                    "startDateTime",
                    "overlaps an earlier occurrence",
                ));
                return Ok(());
            }
        }

        self.drop_following();
        for w in &windows {
            let row = EventRepetition {
                id: Uuid::now_v7(),
                event_id: self.event.id,
                event_detail_id: self.aggregate.detail.id,
                start_date_time: w.start,
                end_date_time: w.end,
                online_meeting: None,
                created_at: self.now,
                updated_at: self.now,
            };
            self.affected.created.push(row.id);
            self.changes.inserted_occurrences.push(row);
        }

        let end_condition = match generation.end_condition {
            EndCondition::Occurrences(_) => EndCondition::Occurrences(kept + count_u32(windows.len())),
            end_date @ EndCondition::EndDate(_) => end_date,
        };
        let recurring_start_date = match current {
            Some(p) if self.index > 0 => p.recurring_start_date,
            _ => pattern.recurring_start_date,
        };
        let stored = RecurrencePattern {
            recurring_start_date,
            end_condition,
            ..pattern
        };

        tracing::debug!(from = self.index, generated = windows.len(), "Regenerating series tail");
        self.event.recurrence_end_date = series_end(&stored, windows.last().copied());
        self.event.recurrence = Some(stored);
        self.event.is_recurring = true;
        self.event_changed = true;
        if self.index == 0 {
            self.set_anchor(*first);
        }
        Ok(())
    }

    /// Overlays the pattern delta on the stored pattern and validates the result for a
    /// series anchored at `window`.
    fn merged_pattern(
        &self,
        window: OccurrenceWindow,
        pattern_delta: Option<&PatternInput>,
        max_occurrences: u16,
        violations: &mut Vec<Violation>,
    ) -> Option<RecurrencePattern> {
        let current = self.aggregate.event.recurrence.as_ref();
        let base = current.map(PatternInput::from).unwrap_or_default();
        let mut merged = match pattern_delta {
            Some(delta) => base.merge(delta),
            None => base,
        };

        if pattern_delta
            .is_some_and(|d| d.frequency == Some(Frequency::Daily) && d.days_of_week.is_none())
        {
            merged.days_of_week = None;
        }
        merged.recurring_start_date = Some(
            pattern_delta
                .and_then(|d| d.recurring_start_date)
                .unwrap_or_else(|| window.start.date_naive()),
        );

        let end_given = pattern_delta
            .and_then(|d| d.end_condition.as_ref())
            .is_some_and(|c| !c.is_empty());
        if !end_given {
            if let Some(end_date) = current.and_then(RecurrencePattern::end_date) {
                let aligned = validator::align_end_date(end_date, window.end);
                merged.end_condition = Some(EndConditionInput::end_date(aligned.to_rfc3339()));
            }
        }

        let ctx = ValidationContext {
            now: self.now,
            created_at: self.aggregate.event.created_at,
            max_occurrences,
        };
        validator::check_pattern(
            Some(&merged),
            Some(window.start),
            Some(window.end),
            &ctx,
            violations,
        )
    }

    /// Shifts the anchor and every later occurrence onto the clock times of `window`.
    fn retime(&mut self, window: OccurrenceWindow, violations: &mut Vec<Violation>) {
        let aggregate = self.aggregate;
        let anchor = aggregate.occurrences[self.index].window();
        let shift = window.start - anchor.start;
        let duration = window.duration();
        let (kept, following) = aggregate.occurrences.split_at(self.index);

        let retimed: Vec<EventRepetition> = following
            .iter()
            .map(|row| {
                let start = row.start_date_time + shift;
                let mut row = row.clone();
                row.set_window(OccurrenceWindow::new(start, start + duration));
                row.updated_at = self.now;
                row
            })
            .collect();

        if let (Some(last), Some(first)) = (kept.last(), retimed.first()) {
            if first.start_date_time < last.end_date_time {
                violations.push(Violation::new(
                    Rule::Schedule,
                    "startDateTime",
                    "overlaps an earlier occurrence",
                ));
                return;
            }
        }

        let last_end = retimed.last().map(|r| r.end_date_time);
        if let Some(pattern) = self.event.recurrence.as_mut() {
            if let EndCondition::EndDate(end_date) = pattern.end_condition {
                let aligned = validator::align_end_date(end_date, window.end);
                pattern.end_condition = EndCondition::EndDate(aligned);
                self.event.recurrence_end_date = Some(aligned);
            } else {
                self.event.recurrence_end_date = last_end;
            }
        }

        for row in retimed {
            self.mark_updated(row.id);
            self.changes.updated_occurrences.push(row);
        }
        if self.index == 0 {
            self.set_anchor(window);
        }
        self.event_changed = true;
    }

    /// Re-runs the registration rules when the window or the restricted flag changes,
    /// and re-checks a stored window against a moved series start.
    fn revalidate_registration(
        &mut self,
        delta: &EventDelta,
        is_restricted: bool,
        violations: &mut Vec<Violation>,
    ) {
        if delta.registration.is_none() && is_restricted == self.aggregate.detail.is_restricted {
            if self.event.start_date_time != self.aggregate.event.start_date_time {
                check_registration_fits(
                    self.event.registration,
                    self.event.start_date_time,
                    violations,
                );
            }
            return;
        }
        let input = delta
            .registration
            .clone()
            .or_else(|| self.event.registration.map(RegistrationInput::from));
        self.event.registration = validator::check_registration(
            input.as_ref(),
            is_restricted,
            self.event.created_at,
            Some(self.event.start_date_time),
            self.now,
            violations,
        );
        self.event_changed = true;
    }

    /// Hard-deletes the anchor occurrence from a multi-occurrence series.
    fn remove_target(&mut self) {
        let aggregate = self.aggregate;
        let target = &aggregate.occurrences[self.index];
        self.changes.deleted_occurrences.push(target.id);
        self.affected.deleted.push(target.id);
        if aggregate.is_forked(target) {
            self.changes.deleted_details.push(target.event_detail_id);
        }

        let remaining: Vec<OccurrenceWindow> = aggregate
            .occurrences
            .iter()
            .filter(|o| o.id != target.id)
            .map(EventRepetition::window)
            .collect();

        if let Some(pattern) = self.event.recurrence.as_mut() {
            if let EndCondition::Occurrences(count) = pattern.end_condition {
                pattern.end_condition = EndCondition::Occurrences(count.saturating_sub(1).max(1));
            }
        }
        if self.index == 0 {
            if let Some(first) = remaining.first() {
                self.set_anchor(*first);
            }
        }
        self.event.recurrence_end_date = self
            .event
            .recurrence
            .as_ref()
            .and_then(|p| series_end(p, remaining.last().copied()));
        self.event_changed = true;
    }

    /// Hard-deletes the anchor and everything after it, ending the series at the last
    /// kept occurrence.
    fn truncate(&mut self) {
        let Some(last_kept) = self
            .index
            .checked_sub(1)
            .map(|i| self.aggregate.occurrences[i].window())
        else {
            return;
        };
        self.drop_following();
        if let Some(pattern) = self.event.recurrence.as_mut() {
            pattern.end_condition = EndCondition::EndDate(last_kept.end);
        }
        self.event.recurrence_end_date = Some(last_kept.end);
        self.event_changed = true;
    }

    fn finish(mut self, updated_by: Option<&str>) -> ServiceResult<UpdatePlan> {
        if self.changes.is_empty() && !self.event_changed {
            return Ok(UpdatePlan::empty(self.event.id));
        }
        if let Some(by) = updated_by {
            self.event.updated_by = Some(by.to_string());
        }
        self.event.updated_at = self.now;
        self.event
            .check_invariants()
            .map_err(GenerationError::from)?;
        self.changes.event = Some(self.event);
        Ok(UpdatePlan {
            changes: self.changes,
            affected: self.affected,
        })
    }
}
