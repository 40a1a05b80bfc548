//! Rule-based engine speed anomalies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Anomaly, AnomalyReason, JoinedSample, PtoSample, RpmSample};

/// Thresholds for the two anomaly rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRules {
    /// RPM above this while the PTO is engaged is flagged
    pub high_rpm_threshold: f64,
    /// Largest allowed change against the sample two positions back
    pub sudden_change_threshold: f64,
}

impl Default for AnomalyRules {
    fn default() -> Self {
        Self {
            high_rpm_threshold: 2000.0,
            sudden_change_threshold: 110.0,
        }
    }
}

/// Pair RPM samples with the PTO sample at the same timestamp. RPM samples
/// without a PTO partner are dropped. If several PTO rows share a timestamp
/// the last one wins.
pub fn join_rpm_pto(rpm: &[RpmSample], pto: &[PtoSample]) -> Vec<JoinedSample> {
    let pto_at: HashMap<DateTime<Utc>, bool> = pto.iter().map(|p| (p.timestamp, p.pto_on)).collect();

    let mut joined: Vec<JoinedSample> = rpm
        .iter()
        .filter_map(|r| {
            pto_at.get(&r.timestamp).map(|&pto_on| JoinedSample {
                timestamp: r.timestamp,
                rpm: r.rpm,
                pto_on,
            })
        })
        .collect();
    joined.sort_by_key(|s| s.timestamp);
    joined
}

/// Evaluate both rules on every sample.
///
/// The sudden-change rule compares sample `i` with sample `i - 2`, so the
/// first two samples can only trip the high-RPM rule.
pub fn detect_anomalies(samples: &[JoinedSample], rules: &AnomalyRules) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for (i, sample) in samples.iter().enumerate() {
        if sample.pto_on && sample.rpm > rules.high_rpm_threshold {
            anomalies.push(Anomaly {
                timestamp: sample.timestamp,
                reason: AnomalyReason::HighRpmDuringPto,
                rpm: sample.rpm,
            });
        }

        if i >= 2 && (sample.rpm - samples[i - 2].rpm).abs() > rules.sudden_change_threshold {
            anomalies.push(Anomaly {
                timestamp: sample.timestamp,
                reason: AnomalyReason::SuddenRpmChange,
                rpm: sample.rpm,
            });
        }
    }

    anomalies
}
