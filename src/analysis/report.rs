//! Dashboard summary: every analysis panel assembled from one store read

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    detect_anomalies, fault_frequency, fault_stats, fault_table, join_rpm_pto,
    mean_time_between_faults, pto_series, pto_stats, rpm_series, rpm_stats, AnomalyRules,
};
use crate::catalog::FaultCatalog;
use crate::storage::{StorageError, TelemetryStore};
use crate::types::{
    Anomaly, Channel, FaultFrequency, FaultStats, PtoStats, RpmStats, Severity, TimeRange,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub rules: AnomalyRules,
    /// Number of fault groups in the frequency panel
    pub top_n: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            rules: AnomalyRules::default(),
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub generated_at: DateTime<Utc>,
    pub range: TimeRange,
    pub rpm: Option<RpmStats>,
    pub pto: PtoStats,
    pub faults: FaultStats,
    pub mtbf_seconds: Option<f64>,
    pub top_faults: Vec<FaultFrequency>,
    pub anomalies: Vec<Anomaly>,
}

impl TelemetryReport {
    pub fn build(
        store: &TelemetryStore,
        catalog: &FaultCatalog,
        range: TimeRange,
        settings: &ReportSettings,
    ) -> Result<Self, StorageError> {
        let rpm = rpm_series(&store.channel_samples(Channel::Rpm, range)?);
        let pto = pto_series(&store.channel_samples(Channel::Pto, range)?);
        let faults = fault_table(&store.channel_samples(Channel::Fault, range)?, catalog);
        let joined = join_rpm_pto(&rpm, &pto);

        Ok(Self {
            generated_at: Utc::now(),
            range,
            rpm: rpm_stats(&rpm),
            pto: pto_stats(&pto),
            faults: fault_stats(&faults),
            mtbf_seconds: mean_time_between_faults(&faults),
            top_faults: fault_frequency(&faults, Some(settings.top_n)),
            anomalies: detect_anomalies(&joined, &settings.rules),
        })
    }

    /// Plain-text rendering for the terminal.
    pub fn render_text(&self) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "=== Vehicle Telemetry Summary ===\nGenerated: {}",
            self.generated_at.to_rfc3339()
        ));

        let rpm_line = match &self.rpm {
            Some(rpm) => format!(
                "Min: {:.2}  Max: {:.2}  Avg: {:.2}  ({} samples)",
                rpm.min_rpm, rpm.max_rpm, rpm.avg_rpm, rpm.samples
            ),
            None => "No RPM data".to_string(),
        };
        sections.push(format!("--- Engine RPM ---\n{rpm_line}"));

        sections.push(format!(
            "--- PTO Usage ---\nEngagements: {}  Engaged: {} s ({:.2} min)",
            self.pto.pto_usage_count, self.pto.pto_duration_sec, self.pto.pto_duration_min
        ));

        let mut fault_lines = vec![
            "--- Faults ---".to_string(),
            format!("Total: {}", self.faults.total_faults),
        ];
        for severity in Severity::ALL {
            let count = self.faults.severity_counts.get(&severity).copied().unwrap_or(0);
            fault_lines.push(format!("  {severity}: {count}"));
        }
        if let Some(recent) = &self.faults.most_recent {
            fault_lines.push(format!(
                "Most recent: SPN {} FMI {} - {} [{}] at {}",
                recent.spn,
                recent.fmi,
                recent.description,
                recent.severity,
                recent.timestamp.to_rfc3339()
            ));
        }
        fault_lines.push(match self.mtbf_seconds {
            Some(mtbf) => format!("MTBF: {:.1} s ({:.2} min)", mtbf, mtbf / 60.0),
            None => "MTBF: n/a (fewer than 2 faults)".to_string(),
        });
        sections.push(fault_lines.join("\n"));

        if !self.top_faults.is_empty() {
            let mut top_lines = vec!["--- Top Faults ---".to_string()];
            for (rank, group) in self.top_faults.iter().enumerate() {
                top_lines.push(format!(
                    "{:>2}. {:<60} {:<8} x{}",
                    rank + 1,
                    group.description,
                    group.severity.as_str(),
                    group.count
                ));
            }
            sections.push(top_lines.join("\n"));
        }

        let mut anomaly_lines = vec![format!("--- Anomalies ({}) ---", self.anomalies.len())];
        for anomaly in &self.anomalies {
            anomaly_lines.push(format!(
                "{}  {:<20} rpm={:.2}",
                anomaly.timestamp.to_rfc3339(),
                anomaly.reason.as_str(),
                anomaly.rpm
            ));
        }
        sections.push(anomaly_lines.join("\n"));

        sections.join("\n\n")
    }
}
