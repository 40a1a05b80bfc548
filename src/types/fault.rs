//! Decoded fault codes and their severity tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tier derived from the Failure Mode Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Warning, Severity::Info];

    /// FMI 0/1 (data above/below normal, most severe) are critical, FMI 2-4
    /// (erratic data, voltage out of range) are warnings, everything else is
    /// informational. The SPN plays no part.
    pub fn from_fmi(fmi: u8) -> Self {
        match fmi {
            0 | 1 => Severity::Critical,
            2..=4 => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Warning => "Warning",
            Severity::Info => "Info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the fault table: a decodable fault payload joined with the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedFault {
    pub timestamp: DateTime<Utc>,
    /// Suspect Parameter Number
    pub spn: u16,
    /// Failure Mode Identifier
    pub fmi: u8,
    pub description: String,
    pub severity: Severity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_is_total_over_fmi() {
        for fmi in 0..=u8::MAX {
            let severity = Severity::from_fmi(fmi);
            let expected = match fmi {
                0 | 1 => Severity::Critical,
                2 | 3 | 4 => Severity::Warning,
                _ => Severity::Info,
            };
            assert_eq!(severity, expected, "fmi {fmi}");
            // deterministic
            assert_eq!(Severity::from_fmi(fmi), severity);
        }
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Critical.to_string(), "Critical");
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"Warning\"");
    }
}
