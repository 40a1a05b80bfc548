//! Analysis Pipeline
//!
//! Decodes stored payloads into engineering units and aggregates them for
//! the dashboard panels and the terminal report.
//!
//! All functions are pure over their inputs. Undecodable payloads are
//! dropped before aggregation and empty inputs produce defined empty results.

pub mod anomaly;
pub mod faults;
pub mod pto;
pub mod report;
pub mod rpm;

pub use anomaly::{detect_anomalies, join_rpm_pto, AnomalyRules};
pub use faults::{fault_frequency, fault_stats, fault_table, mean_time_between_faults};
pub use pto::{pto_series, pto_stats};
pub use report::{ReportSettings, TelemetryReport};
pub use rpm::{rpm_series, rpm_stats};

/// Round to two decimal places for display.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
