use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `[start, end)` time window of one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OccurrenceWindow {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }
}

/// Per-occurrence online-meeting binding. Generated links differ per occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeeting {
    pub provider: Option<String>,
    pub meeting_id: Option<String>,
    pub join_url: Option<String>,
    pub passcode: Option<String>,
}

/// One concrete occurrence of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRepetition {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_detail_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub online_meeting: Option<OnlineMeeting>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRepetition {
    #[must_use]
    pub fn window(&self) -> OccurrenceWindow {
        OccurrenceWindow::new(self.start_date_time, self.end_date_time)
    }

    pub fn set_window(&mut self, window: OccurrenceWindow) {
        self.start_date_time = window.start;
        self.end_date_time = window.end;
    }

    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.window().has_ended(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn windows_touching_at_the_edge_do_not_overlap() {
        let a = OccurrenceWindow::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap(),
        );
        let b = OccurrenceWindow::new(a.end, a.end + TimeDelta::hours(1));
        let c = OccurrenceWindow::new(a.start + TimeDelta::minutes(30), b.end);

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert_eq!(a.duration(), TimeDelta::hours(1));
    }

    #[test]
    fn has_ended_is_inclusive_of_end() {
        let window = OccurrenceWindow::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap(),
        );
        assert!(!window.has_ended(window.start));
        assert!(window.has_ended(window.end));
    }
}
