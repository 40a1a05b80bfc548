//! Telemetry row types shared by the store, the simulator and the API

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical signal source sharing the single telemetry table.
///
/// Serialized as the bus identifier the vehicle network uses for the
/// corresponding parameter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Electronic engine controller, engine speed
    #[serde(rename = "0x0CF00400")]
    Rpm,
    /// Power take-off engagement status
    #[serde(rename = "0x18FEF100")]
    Pto,
    /// Diagnostic message carrying SPN/FMI pairs
    #[serde(rename = "0x0CFE6CEE")]
    Fault,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Rpm, Channel::Pto, Channel::Fault];

    /// Bus identifier as stored in the `channel_id` column.
    pub fn identifier(&self) -> &'static str {
        match self {
            Channel::Rpm => "0x0CF00400",
            Channel::Pto => "0x18FEF100",
            Channel::Fault => "0x0CFE6CEE",
        }
    }

    /// Short lowercase name used in URLs and file names.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Rpm => "rpm",
            Channel::Pto => "pto",
            Channel::Fault => "fault",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown channel identifier: {0}")]
pub struct ChannelParseError(pub String);

impl FromStr for Channel {
    type Err = ChannelParseError;

    /// Accepts the bus identifier (any hex case) or the short name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Channel::ALL
            .into_iter()
            .find(|c| {
                c.identifier().eq_ignore_ascii_case(trimmed) || c.name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ChannelParseError(trimmed.to_string()))
    }
}

/// A stored telemetry row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Assigned by the store on insert, unique and increasing
    pub id: u64,
    /// UTC, second resolution
    pub timestamp: DateTime<Utc>,
    pub channel_id: Channel,
    /// Hex payload, typically 8 characters (4 bytes)
    pub payload: String,
}

/// A row waiting to be inserted (no id yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTelemetry {
    pub timestamp: DateTime<Utc>,
    pub channel_id: Channel,
    pub payload: String,
}

impl NewTelemetry {
    /// Build a row, truncating the timestamp to whole seconds.
    pub fn new(timestamp: DateTime<Utc>, channel_id: Channel, payload: impl Into<String>) -> Self {
        Self {
            timestamp: truncate_to_second(timestamp),
            channel_id,
            payload: payload.into(),
        }
    }

    pub fn with_id(self, id: u64) -> TelemetryRecord {
        TelemetryRecord {
            id,
            timestamp: self.timestamp,
            channel_id: self.channel_id,
            payload: self.payload,
        }
    }
}

/// Partial update applied by `PATCH /telemetry/:id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryPatch {
    pub timestamp: Option<DateTime<Utc>>,
    pub channel_id: Option<Channel>,
    pub payload: Option<String>,
}

impl TelemetryPatch {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.channel_id.is_none() && self.payload.is_none()
    }

    /// Apply the set fields to `record`, leaving the id untouched.
    pub fn apply(&self, record: &mut TelemetryRecord) {
        if let Some(ts) = self.timestamp {
            record.timestamp = truncate_to_second(ts);
        }
        if let Some(channel) = self.channel_id {
            record.channel_id = channel;
        }
        if let Some(payload) = &self.payload {
            record.payload = payload.clone();
        }
    }
}

/// Inclusive time window; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub const ALL: TimeRange = TimeRange { start: None, end: None };

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end.map_or(true, |e| *ts <= e)
    }
}

/// Drop sub-second precision.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with any offset (converted to UTC) and, for rows written
/// by older tools, naive `YYYY-MM-DDTHH:MM:SS[.fff]` which is taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let s = s.trim();
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(truncate_to_second(dt.with_timezone(&Utc))),
        Err(rfc_err) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| truncate_to_second(naive.and_utc()))
            .map_err(|_| rfc_err),
    }
}
