#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Engine flows against the Postgres aggregate store.

use chrono::{TimeZone, Utc, Weekday};
use uuid::Uuid;

use cadence_core::model::{EndCondition, EventStatus};
use cadence_core::store::{AggregateStore, ChangeSet, StoreError};
use cadence_service::ServiceError;
use cadence_service::draft::PatternInput;
use cadence_service::propagation::{DeleteMode, DetailDelta, EditScope, EventDelta};
use cadence_test::{engine, reference_now, wed_fri_draft};

use crate::helpers::test_db_or_skip;

fn retitle(title: &str) -> EventDelta {
    EventDelta {
        detail: DetailDelta {
            title: Some(title.to_string()),
            ..DetailDelta::default()
        },
        ..EventDelta::default()
    }
}

#[test_log::test(tokio::test)]
async fn created_series_round_trips() {
    let db = test_db_or_skip!();
    let (engine, _) = engine(db.store());

    let expanded = engine.validate_and_expand(&wed_fri_draft(4)).unwrap();
    let created = engine
        .create_series(expanded.draft, expanded.windows.clone())
        .await
        .unwrap();

    assert_eq!(
        engine.list_occurrences(created.event_id).await.unwrap(),
        expanded.windows
    );

    let aggregate = engine.load(created.event_id).await.unwrap();
    assert_eq!(aggregate.detail.title, "Choir practice");
    assert!(aggregate.detail.is_restricted);
    assert_eq!(aggregate.detail.metadata, serde_json::json!({ "room": 12 }));
    assert_eq!(aggregate.event.created_by.as_deref(), Some("organizer"));
    assert_eq!(
        aggregate.event.recurrence.as_ref().map(|p| p.end_condition),
        Some(EndCondition::Occurrences(4))
    );
    assert_eq!(
        aggregate.occurrences.iter().map(|o| o.id).collect::<Vec<_>>(),
        created.occurrence_ids
    );

    let later = Utc.with_ymd_and_hms(2024, 12, 21, 0, 0, 0).unwrap();
    let tail = engine
        .occurrences(created.event_id, Some(later))
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);

    db.cleanup().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
async fn this_and_following_regenerates_the_tail() {
    let db = test_db_or_skip!();
    let (engine, _) = engine(db.store());

    let expanded = engine.validate_and_expand(&wed_fri_draft(6)).unwrap();
    let created = engine
        .create_series(expanded.draft, expanded.windows)
        .await
        .unwrap();
    let before = engine.load(created.event_id).await.unwrap();
    let target = before.occurrences[2].id;

    let delta = EventDelta {
        recurrence: Some(PatternInput {
            days_of_week: Some(vec![Weekday::Tue]),
            ..PatternInput::default()
        }),
        ..EventDelta::default()
    };
    let affected = engine
        .propose_update(created.event_id, EditScope::ThisAndFollowing(target), &delta)
        .await
        .unwrap();

    let after = engine.load(created.event_id).await.unwrap();
    assert_eq!(after.occurrences[..2], before.occurrences[..2]);
    assert_eq!(after.occurrences.len(), 6);
    assert!(
        after.occurrences[2..]
            .iter()
            .all(|o| affected.created.contains(&o.id))
    );
    assert_eq!(
        db.count_rows("event_repetition")
            .await
            .expect("Failed to count occurrences"),
        6
    );

    db.cleanup().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
async fn occurrence_edit_forks_its_detail() {
    let db = test_db_or_skip!();
    let (engine, _) = engine(db.store());

    let expanded = engine.validate_and_expand(&wed_fri_draft(4)).unwrap();
    let created = engine
        .create_series(expanded.draft, expanded.windows)
        .await
        .unwrap();
    let target = created.occurrence_ids[1];

    engine
        .propose_update(
            created.event_id,
            EditScope::ThisOccurrence(target),
            &retitle("Concert"),
        )
        .await
        .unwrap();

    let aggregate = engine.load(created.event_id).await.unwrap();
    let forked = aggregate.occurrence(target).unwrap();
    assert!(aggregate.is_forked(forked));
    assert_eq!(aggregate.detail_for(forked).unwrap().title, "Concert");
    assert_eq!(aggregate.detail.title, "Choir practice");
    assert_eq!(
        db.count_rows("event_detail")
            .await
            .expect("Failed to count details"),
        2
    );

    db.cleanup().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
async fn store_forks_detail_directly() {
    let db = test_db_or_skip!();
    let (engine, _) = engine(db.store());

    let expanded = engine.validate_and_expand(&wed_fri_draft(2)).unwrap();
    let created = engine
        .create_series(expanded.draft, expanded.windows)
        .await
        .unwrap();
    let occurrence_id = created.occurrence_ids[0];
    let fork_id = Uuid::now_v7();

    let fork = engine
        .store()
        .fork_detail_for_occurrence(occurrence_id, fork_id, reference_now())
        .await
        .unwrap();

    assert_eq!(fork.id, fork_id);
    assert_eq!(fork.title, "Choir practice");
    let occurrence = engine.store().load_occurrence(occurrence_id).await.unwrap();
    assert_eq!(occurrence.event_detail_id, fork_id);

    let err = engine
        .store()
        .fork_detail_for_occurrence(Uuid::now_v7(), Uuid::now_v7(), reference_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "occurrence", .. }));

    db.cleanup().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
async fn failed_commit_rolls_back() {
    let db = test_db_or_skip!();
    let (engine, _) = engine(db.store());

    let expanded = engine.validate_and_expand(&wed_fri_draft(4)).unwrap();
    let created = engine
        .create_series(expanded.draft, expanded.windows)
        .await
        .unwrap();
    let before = engine.load(created.event_id).await.unwrap();

    let mut detail = before.detail.clone();
    detail.title = "Never written".to_string();
    let mut changes = ChangeSet::new(created.event_id);
    changes.updated_details.push(detail);
    changes.deleted_occurrences.push(Uuid::now_v7());

    let err = engine.store().commit(changes).await.unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
    assert_eq!(engine.load(created.event_id).await.unwrap(), before);

    db.cleanup().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
async fn deletes_soft_then_hard() {
    let db = test_db_or_skip!();
    let (engine, _) = engine(db.store());

    let expanded = engine.validate_and_expand(&wed_fri_draft(4)).unwrap();
    let created = engine
        .create_series(expanded.draft, expanded.windows)
        .await
        .unwrap();

    engine
        .delete(created.event_id, EditScope::EntireSeries, DeleteMode::Soft)
        .await
        .unwrap();
    let aggregate = engine.load(created.event_id).await.unwrap();
    assert_eq!(aggregate.detail.status, EventStatus::Inactive);
    assert_eq!(aggregate.occurrences.len(), 4);

    engine
        .delete(created.event_id, EditScope::EntireSeries, DeleteMode::Hard)
        .await
        .unwrap();
    assert!(matches!(
        engine.load(created.event_id).await,
        Err(ServiceError::NotFound(_))
    ));
    for table in ["event", "event_detail", "event_repetition"] {
        assert_eq!(
            db.count_rows(table).await.expect("Failed to count rows"),
            0,
            "{table} should be empty"
        );
    }

    db.cleanup().await.expect("Failed to drop test database");
}
