//! Engine speed series and summary

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use super::round2;
use crate::codec::decode_rpm;
use crate::types::{RpmSample, RpmStats};

/// Decode RPM payloads, skipping rows that do not decode.
pub fn rpm_series(rows: &[(DateTime<Utc>, String)]) -> Vec<RpmSample> {
    rows.iter()
        .filter_map(|(timestamp, payload)| {
            decode_rpm(payload).ok().map(|rpm| RpmSample {
                timestamp: *timestamp,
                rpm,
            })
        })
        .collect()
}

/// Min, max and mean engine speed. `None` when there are no samples.
pub fn rpm_stats(samples: &[RpmSample]) -> Option<RpmStats> {
    if samples.is_empty() {
        return None;
    }
    let values: Vec<f64> = samples.iter().map(|s| s.rpm).collect();

    Some(RpmStats {
        min_rpm: round2(Statistics::min(values.iter())),
        max_rpm: round2(Statistics::max(values.iter())),
        avg_rpm: round2(Statistics::mean(values.iter())),
        samples: values.len(),
    })
}
