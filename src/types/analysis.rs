//! Analysis pipeline output shapes
//!
//! These are consumed unchanged by the HTTP panels and the terminal report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{DecodedFault, Severity};

/// Decoded engine speed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RpmSample {
    pub timestamp: DateTime<Utc>,
    pub rpm: f64,
}

/// Decoded PTO status sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtoSample {
    pub timestamp: DateTime<Utc>,
    pub pto_on: bool,
}

/// RPM and PTO samples sharing a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoinedSample {
    pub timestamp: DateTime<Utc>,
    pub rpm: f64,
    pub pto_on: bool,
}

/// Engine speed summary, values rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RpmStats {
    pub min_rpm: f64,
    pub max_rpm: f64,
    pub avg_rpm: f64,
    pub samples: usize,
}

/// PTO usage summary.
///
/// Duration assumes one PTO sample per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PtoStats {
    /// Rising edges (not engaged -> engaged)
    pub pto_usage_count: u64,
    pub pto_duration_sec: u64,
    pub pto_duration_min: f64,
}

/// One group of the fault frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultFrequency {
    pub description: String,
    pub severity: Severity,
    pub count: usize,
}

/// Fault table summary. `Default` is the defined result for an empty table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultStats {
    pub total_faults: usize,
    pub most_recent: Option<DecodedFault>,
    pub last_fault_time: Option<DateTime<Utc>>,
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub severity_counts: BTreeMap<Severity, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyReason {
    /// PTO engaged while the engine runs above the PTO speed limit
    HighRpmDuringPto,
    /// Engine speed moved too far against the sample two positions back
    SuddenRpmChange,
}

impl AnomalyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyReason::HighRpmDuringPto => "High RPM during PTO",
            AnomalyReason::SuddenRpmChange => "Sudden RPM change",
        }
    }
}

impl fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub reason: AnomalyReason,
    pub rpm: f64,
}
