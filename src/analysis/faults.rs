//! Fault table, frequency ranking, severity counts and MTBF

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use std::collections::HashMap;

use crate::catalog::FaultCatalog;
use crate::codec::decode_fault;
use crate::types::{DecodedFault, FaultFrequency, FaultStats, Severity};

/// Decode fault payloads, drop the undecodable ones, and join each with the
/// catalog. Ordered by timestamp; rows sharing a timestamp keep input order.
pub fn fault_table(rows: &[(DateTime<Utc>, String)], catalog: &FaultCatalog) -> Vec<DecodedFault> {
    let mut table: Vec<DecodedFault> = rows
        .iter()
        .filter_map(|(timestamp, payload)| {
            let (spn, fmi) = decode_fault(payload).ok()?;
            Some(DecodedFault {
                timestamp: *timestamp,
                spn,
                fmi,
                description: catalog.describe(spn, fmi).to_string(),
                severity: Severity::from_fmi(fmi),
            })
        })
        .collect();
    table.sort_by_key(|f| f.timestamp);
    table
}

/// Occurrences per (description, severity), most frequent first. Equal
/// counts keep the order in which the groups first appear.
pub fn fault_frequency(table: &[DecodedFault], top_n: Option<usize>) -> Vec<FaultFrequency> {
    let mut index: HashMap<(&str, Severity), usize> = HashMap::new();
    let mut groups: Vec<FaultFrequency> = Vec::new();

    for fault in table {
        let key = (fault.description.as_str(), fault.severity);
        match index.get(&key) {
            Some(&i) => groups[i].count += 1,
            None => {
                index.insert(key, groups.len());
                groups.push(FaultFrequency {
                    description: fault.description.clone(),
                    severity: fault.severity,
                    count: 1,
                });
            }
        }
    }

    // stable: ties stay in first-seen order
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    if let Some(n) = top_n {
        groups.truncate(n);
    }
    groups
}

pub fn fault_stats(table: &[DecodedFault]) -> FaultStats {
    let Some(most_recent) = table.iter().max_by_key(|f| f.timestamp) else {
        return FaultStats::default();
    };

    let mut stats = FaultStats {
        total_faults: table.len(),
        most_recent: Some(most_recent.clone()),
        last_fault_time: Some(most_recent.timestamp),
        ..Default::default()
    };

    for fault in table {
        match fault.severity {
            Severity::Critical => stats.critical_count += 1,
            Severity::Warning => stats.warning_count += 1,
            Severity::Info => stats.info_count += 1,
        }
        *stats.severity_counts.entry(fault.severity).or_default() += 1;
    }
    stats
}

/// Mean gap between consecutive faults in seconds; `None` below two faults.
pub fn mean_time_between_faults(table: &[DecodedFault]) -> Option<f64> {
    if table.len() < 2 {
        return None;
    }
    let mut times: Vec<DateTime<Utc>> = table.iter().map(|f| f.timestamp).collect();
    times.sort();

    let gaps: Vec<f64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    Some(Statistics::mean(gaps.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UNKNOWN_FAULT;
    use crate::codec::encode_fault;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn fault_rows(entries: &[(i64, u16, u8)]) -> Vec<(DateTime<Utc>, String)> {
        entries
            .iter()
            .map(|&(s, spn, fmi)| (t(s), encode_fault(spn, fmi)))
            .collect()
    }

    #[test]
    fn test_fault_table_decodes_and_sorts() {
        let catalog = FaultCatalog::builtin();
        let mut rows = fault_rows(&[(20, 100, 1), (5, 639, 4), (5, 4242, 9)]);
        rows.push((t(1), "00".to_string()));

        let table = fault_table(&rows, &catalog);
        assert_eq!(table.len(), 3);
        assert_eq!((table[0].spn, table[0].fmi), (639, 4));
        assert_eq!(table[0].severity, Severity::Warning);
        assert_eq!(table[1].description, UNKNOWN_FAULT);
        assert_eq!(table[1].severity, Severity::Info);
        assert_eq!(table[2].severity, Severity::Critical);
        assert_eq!(table[2].description, catalog.describe(100, 1));
    }

    #[test]
    fn test_fault_table_is_idempotent() {
        let catalog = FaultCatalog::builtin();
        let rows = fault_rows(&[(3, 110, 0), (1, 111, 2), (3, 723, 5), (2, 91, 3)]);
        assert_eq!(fault_table(&rows, &catalog), fault_table(&rows, &catalog));
    }

    #[test]
    fn test_frequency_ranking_and_ties() {
        let catalog = FaultCatalog::builtin();
        let rows = fault_rows(&[
            (0, 190, 2),
            (1, 100, 0),
            (2, 100, 0),
            (3, 84, 0),
            (4, 190, 2),
            (5, 84, 0),
            (6, 108, 1),
        ]);
        let table = fault_table(&rows, &catalog);
        let freq = fault_frequency(&table, None);
        let order: Vec<(&str, usize)> = freq.iter().map(|f| (f.description.as_str(), f.count)).collect();
        assert_eq!(
            order,
            vec![
                (catalog.describe(190, 2), 2),
                (catalog.describe(100, 0), 2),
                (catalog.describe(84, 0), 2),
                (catalog.describe(108, 1), 1),
            ]
        );
        assert_eq!(fault_frequency(&table, Some(2)).len(), 2);
        assert!(fault_frequency(&[], Some(10)).is_empty());
    }

    #[test]
    fn test_fault_stats_counts() {
        let catalog = FaultCatalog::builtin();
        let rows = fault_rows(&[(0, 100, 0), (9, 723, 5), (4, 639, 3), (2, 108, 1)]);
        let stats = fault_stats(&fault_table(&rows, &catalog));
        assert_eq!(stats.total_faults, 4);
        assert_eq!(stats.critical_count, 2);
        assert_eq!(stats.warning_count, 1);
        assert_eq!(stats.info_count, 1);
        assert_eq!(stats.last_fault_time, Some(t(9)));
        assert_eq!(stats.most_recent.map(|f| f.spn), Some(723));
        assert_eq!(stats.severity_counts[&Severity::Critical], 2);
        assert_eq!(stats.severity_counts[&Severity::Info], 1);
    }

    #[test]
    fn test_fault_stats_empty() {
        let stats = fault_stats(&[]);
        assert_eq!(stats, FaultStats::default());
        assert_eq!(stats.most_recent, None);
        assert!(stats.severity_counts.is_empty());
    }

    #[test]
    fn test_mtbf() {
        let catalog = FaultCatalog::builtin();
        let table = fault_table(&fault_rows(&[(0, 100, 0), (30, 100, 1), (10, 110, 0)]), &catalog);
        assert_eq!(mean_time_between_faults(&table), Some(15.0));
        assert_eq!(mean_time_between_faults(&table[..1]), None);
        assert_eq!(mean_time_between_faults(&[]), None);
    }
}
