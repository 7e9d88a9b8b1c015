//! Cadence recurring-event engine - integration test support.
//!
//! Fixtures shared by the Postgres-backed integration tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};

use cadence_core::clock::FixedClock;
use cadence_core::config::EngineConfig;
use cadence_core::model::Frequency;
use cadence_core::store::AggregateStore;
use cadence_service::EventEngine;
use cadence_service::draft::{DetailDraft, EndConditionInput, EventDraft, PatternInput};
use cadence_service::publish::NoopPublisher;

/// Reference instant every fixture is evaluated against: 2024-12-01T09:00:00Z.
#[must_use]
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Engine over `store` with a clock pinned at [`reference_now`].
#[must_use]
pub fn engine<S: AggregateStore>(
    store: S,
) -> (EventEngine<S, FixedClock, NoopPublisher>, FixedClock) {
    let clock = FixedClock::new(reference_now());
    let engine = EventEngine::new(store, EngineConfig::default()).with_clock(clock.clone());
    (engine, clock)
}

/// A restricted weekly series on Wednesdays and Fridays, 17:00-18:00, starting
/// 2024-12-18 and ending after `count` occurrences.
#[must_use]
pub fn wed_fri_draft(count: u32) -> EventDraft {
    let mut detail = DetailDraft::titled("Choir practice");
    detail.is_restricted = true;
    detail.location = Some("Hall B".to_string());
    detail.metadata = serde_json::json!({ "room": 12 });

    EventDraft {
        detail,
        start_date_time: "2024-12-18T17:00:00Z".to_string(),
        end_date_time: "2024-12-18T18:00:00Z".to_string(),
        is_recurring: true,
        recurrence: Some(PatternInput {
            frequency: Some(Frequency::Weekly),
            interval: Some(1),
            days_of_week: Some(vec![Weekday::Wed, Weekday::Fri]),
            recurring_start_date: NaiveDate::from_ymd_opt(2024, 12, 18),
            end_condition: Some(EndConditionInput::occurrences(count)),
        }),
        registration: None,
        attendees: Some(vec!["alto@example.com".to_string()]),
        created_by: Some("organizer".to_string()),
    }
}
