//! ISO-8601 codec for task dates.
//!
//! Remote task records carry `plannedDate`, `completedAt` and the recurrence
//! `lastCompleted` as strings. Servers are not consistent about offsets: some
//! send RFC 3339, some send a naive date-time that is meant to be UTC, and
//! planned dates are sometimes a bare `YYYY-MM-DD`. All three are accepted on
//! ingress; egress is always RFC 3339 UTC with millisecond precision.

use crate::{SyncError, SyncResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_iso8601(input: &str) -> SyncResult<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| SyncError::DateParse(format!("'{}': {}", trimmed, e)))
}

pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `#[serde(with = "...")]` adapter for optional dates.
pub mod iso8601_option {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&format_iso8601(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_iso8601(&raw))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// Adapter for patch fields where an explicit `null` means "clear".
///
/// Pair with `default` and `skip_serializing_if = "Option::is_none"`.
pub mod iso8601_patch {
    use super::*;

    pub fn serialize<S>(
        value: &Option<Option<DateTime<Utc>>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(Some(dt)) => serializer.serialize_some(&format_iso8601(dt)),
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::iso8601_option::deserialize(deserializer).map(Some)
    }
}
