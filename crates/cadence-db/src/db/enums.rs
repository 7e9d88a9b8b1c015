//! Database enum types with Diesel serialization.
//!
//! Each enum mirrors a TEXT column guarded by a CHECK constraint and converts to and from
//! its domain counterpart in `cadence-core`.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use std::fmt;
use std::io::Write;

use cadence_core::model::{EventKind, EventStatus};

/// Lifecycle status of a detail row.
///
/// Maps to `event_detail.status` CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum DetailStatus {
    Live,
    Draft,
    Inactive,
    Archived,
}

impl ToSql<Text, Pg> for DetailStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for DetailStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"live" => Ok(Self::Live),
            b"draft" => Ok(Self::Draft),
            b"inactive" => Ok(Self::Inactive),
            b"archived" => Ok(Self::Archived),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl DetailStatus {
    /// Returns the database string representation of this status.
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

impl fmt::Display for DetailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventStatus> for DetailStatus {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Live => Self::Live,
            EventStatus::Draft => Self::Draft,
            EventStatus::Inactive => Self::Inactive,
            EventStatus::Archived => Self::Archived,
        }
    }
}

impl From<DetailStatus> for EventStatus {
    fn from(status: DetailStatus) -> Self {
        match status {
            DetailStatus::Live => Self::Live,
            DetailStatus::Draft => Self::Draft,
            DetailStatus::Inactive => Self::Inactive,
            DetailStatus::Archived => Self::Archived,
        }
    }
}

/// Online or offline delivery of an event.
///
/// Maps to `event_detail.kind` CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum DetailKind {
    Online,
    Offline,
}

impl ToSql<Text, Pg> for DetailKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for DetailKind {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"online" => Ok(Self::Online),
            b"offline" => Ok(Self::Offline),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl DetailKind {
    /// Returns the database string representation of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventKind> for DetailKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Online => Self::Online,
            EventKind::Offline => Self::Offline,
        }
    }
}

impl From<DetailKind> for EventKind {
    fn from(kind: DetailKind) -> Self {
        match kind {
            DetailKind::Online => Self::Online,
            DetailKind::Offline => Self::Offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn status_strings_match_domain_strings() {
        for status in [
            EventStatus::Live,
            EventStatus::Draft,
            EventStatus::Inactive,
            EventStatus::Archived,
        ] {
            let column = DetailStatus::from(status);
            assert_eq!(column.as_str(), status.as_str());
            assert_eq!(EventStatus::from(column), status);
        }
    }

    #[test_log::test]
    fn kind_strings_match_domain_strings() {
        for kind in [EventKind::Online, EventKind::Offline] {
            let column = DetailKind::from(kind);
            assert_eq!(column.as_str(), kind.as_str());
            assert_eq!(EventKind::from(column), kind);
        }
    }
}
