//! UTC timestamps as stored in documents.
//!
//! Stored form is fixed-width ISO-8601 with microseconds and a `Z` suffix,
//! so comparing the strings gives the same order as comparing the instants.
//! Parsing is lenient: RFC 3339 with any offset, or a naive ISO string read as UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ModelError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self { Self::from_datetime(Utc::now()) }

    /// Precision beyond microseconds is dropped so the value survives a store round-trip.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self { Self(dt.trunc_subsecs(6)) }

    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self::from_datetime(Utc.from_utc_datetime(&naive)))
            .map_err(|e| ModelError::validation(format!("invalid timestamp {raw:?}: {e}")))
    }


    pub fn to_iso(&self) -> String { self.0.format(TIMESTAMP_FORMAT).to_string() }

    pub fn offset_by(self, delta: Duration) -> Self { Self::from_datetime(self.0 + delta) }

    /// Stamp for a mutation of a record last stamped at `previous`:
    /// the current time, or one microsecond past `previous` if the clock has not moved on.
    pub fn advance_from(previous: Timestamp) -> Self {
        let now = Self::now();
        if now > previous { now } else { previous.offset_by(Duration::microseconds(1)) }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self { Self::from_datetime(dt) }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_iso()) }
}

impl FromStr for Timestamp {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(de::Error::custom)
    }
}
