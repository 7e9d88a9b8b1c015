use uuid::Uuid;

use super::detail::EventDetail;
use super::event::Event;
use super::repetition::EventRepetition;

/// A fully loaded series: root, shared detail, ordered occurrences and forked details.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub detail: EventDetail,
    pub event: Event,
    /// Ordered by start time ascending.
    pub occurrences: Vec<EventRepetition>,
    /// Details referenced by occurrences other than the shared one.
    pub forks: Vec<EventDetail>,
}

impl Aggregate {
    /// ## Summary
    /// Assembles an aggregate and sorts its occurrences by start.
    #[must_use]
    pub fn new(
        detail: EventDetail,
        event: Event,
        mut occurrences: Vec<EventRepetition>,
        forks: Vec<EventDetail>,
    ) -> Self {
        occurrences.sort_by_key(|o| (o.start_date_time, o.id));
        Self {
            detail,
            event,
            occurrences,
            forks,
        }
    }

    #[must_use]
    pub fn occurrence(&self, id: Uuid) -> Option<&EventRepetition> {
        self.occurrences.iter().find(|o| o.id == id)
    }

    /// Zero-based position of an occurrence in start order.
    #[must_use]
    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.occurrences.iter().position(|o| o.id == id)
    }

    /// ## Summary
    /// Resolves the detail an occurrence reads its content from.
    #[must_use]
    pub fn detail_for(&self, occurrence: &EventRepetition) -> Option<&EventDetail> {
        if occurrence.event_detail_id == self.detail.id {
            return Some(&self.detail);
        }
        self.forks
            .iter()
            .find(|d| d.id == occurrence.event_detail_id)
    }

    #[must_use]
    pub fn is_forked(&self, occurrence: &EventRepetition) -> bool {
        occurrence.event_detail_id != self.detail.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, EventStatus};
    use chrono::{TimeDelta, TimeZone, Utc};

    fn detail(id: Uuid) -> EventDetail {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        EventDetail {
            id,
            title: "Book club".to_string(),
            description: None,
            short_description: None,
            kind: EventKind::Offline,
            is_restricted: true,
            location: Some("Library".to_string()),
            online_provider: None,
            capacity: None,
            recordings: None,
            status: EventStatus::Live,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_sorts_occurrences_and_resolves_forks() {
        let shared = detail(Uuid::new_v4());
        let forked = detail(Uuid::new_v4());
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 18, 0, 0).unwrap();
        let event = Event {
            id: Uuid::new_v4(),
            event_detail_id: shared.id,
            is_recurring: false,
            recurrence: None,
            recurrence_end_date: None,
            start_date_time: start,
            end_date_time: start + TimeDelta::hours(1),
            registration: None,
            created_by: None,
            updated_by: None,
            created_at: start,
            updated_at: start,
        };
        let occurrence = |offset: i64, detail_id: Uuid| EventRepetition {
            id: Uuid::new_v4(),
            event_id: event.id,
            event_detail_id: detail_id,
            start_date_time: start + TimeDelta::days(offset),
            end_date_time: start + TimeDelta::days(offset) + TimeDelta::hours(1),
            online_meeting: None,
            created_at: start,
            updated_at: start,
        };
        let later = occurrence(7, forked.id);
        let first = occurrence(0, shared.id);

        let aggregate = Aggregate::new(
            shared.clone(),
            event,
            vec![later.clone(), first.clone()],
            vec![forked.clone()],
        );

        assert_eq!(aggregate.index_of(first.id), Some(0));
        assert_eq!(aggregate.index_of(later.id), Some(1));
        assert_eq!(aggregate.detail_for(&first), Some(&shared));
        assert_eq!(aggregate.detail_for(&later), Some(&forked));
        assert!(aggregate.is_forked(&later));
        assert!(!aggregate.is_forked(&first));
    }
}
