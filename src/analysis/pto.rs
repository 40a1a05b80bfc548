//! PTO engagement series and usage summary

use chrono::{DateTime, Utc};

use super::round2;
use crate::codec::decode_pto_engaged;
use crate::types::{PtoSample, PtoStats};

pub fn pto_series(rows: &[(DateTime<Utc>, String)]) -> Vec<PtoSample> {
    rows.iter()
        .map(|(timestamp, payload)| PtoSample {
            timestamp: *timestamp,
            pto_on: decode_pto_engaged(payload),
        })
        .collect()
}

/// Count engagements (rising edges, with an implicit "off" before the first
/// sample) and engaged time. Each sample stands for one second.
pub fn pto_stats(samples: &[PtoSample]) -> PtoStats {
    let mut previous = false;
    let mut usage = 0u64;
    let mut engaged_secs = 0u64;

    for sample in samples {
        if sample.pto_on {
            engaged_secs += 1;
            if !previous {
                usage += 1;
            }
        }
        previous = sample.pto_on;
    }

    PtoStats {
        pto_usage_count: usage,
        pto_duration_sec: engaged_secs,
        pto_duration_min: round2(engaged_secs as f64 / 60.0),
    }
}
