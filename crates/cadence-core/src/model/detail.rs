use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Lifecycle status of an event's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Live,
    Draft,
    Inactive,
    Archived,
}

impl EventStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Draft => "draft",
            Self::Inactive => "inactive",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "draft" => Ok(Self::Draft),
            "inactive" => Ok(Self::Inactive),
            "archived" => Ok(Self::Archived),
            other => Err(CoreError::InvalidInput(format!(
                "unknown event status '{other}'"
            ))),
        }
    }
}

/// Whether an event takes place through an online-meeting provider or at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Online,
    #[default]
    Offline,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(CoreError::InvalidInput(format!(
                "unknown event kind '{other}'"
            ))),
        }
    }
}

/// Content shared by every occurrence of one logical event.
///
/// One series starts with exactly one detail. Single-occurrence edits of shared
/// fields clone it (a fork) so siblings keep the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub kind: EventKind,
    pub is_restricted: bool,
    pub location: Option<String>,
    /// Name of the online-meeting provider, for online events.
    pub online_provider: Option<String>,
    pub capacity: Option<i32>,
    pub recordings: Option<serde_json::Value>,
    pub status: EventStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventDetail {
    /// ## Summary
    /// Clones this detail under a new identity, stamping both audit times with `now`.
    #[must_use]
    pub fn fork(&self, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.status == EventStatus::Archived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            EventStatus::Live,
            EventStatus::Draft,
            EventStatus::Inactive,
            EventStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<EventStatus>().is_err());
    }

    #[test]
    fn fork_keeps_content_and_replaces_identity() {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let detail = EventDetail {
            id: Uuid::new_v4(),
            title: "Standup".to_string(),
            description: Some("Daily sync".to_string()),
            short_description: None,
            kind: EventKind::Online,
            is_restricted: true,
            location: None,
            online_provider: Some("zoom".to_string()),
            capacity: Some(12),
            recordings: None,
            status: EventStatus::Live,
            metadata: serde_json::json!({ "team": "core" }),
            created_at: created,
            updated_at: created,
        };

        let later = created + chrono::TimeDelta::days(3);
        let fork_id = Uuid::new_v4();
        let fork = detail.fork(fork_id, later);

        assert_eq!(fork.id, fork_id);
        assert_eq!(fork.title, detail.title);
        assert_eq!(fork.metadata, detail.metadata);
        assert_eq!(fork.created_at, later);
        assert_eq!(fork.updated_at, later);
    }
}
