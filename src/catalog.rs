//! Fault catalog: (SPN, FMI) -> human-readable description
//!
//! Loaded once at startup, either from an external `spn,fmi,description` CSV
//! or from the built-in table, then shared read-only by every analysis call.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Description returned for pairs the catalog does not know.
pub const UNKNOWN_FAULT: &str = "Unknown SPN/FMI";

/// Built-in descriptions for every SPN/FMI pair the simulator can emit.
const BUILTIN_ENTRIES: &[(u16, u8, &str)] = &[
    (100, 0, "Engine Oil Pressure - Data Valid but Above Normal Range"),
    (100, 1, "Engine Oil Pressure - Data Valid but Below Normal Range"),
    (100, 4, "Engine Oil Pressure - Voltage Below Normal or Shorted Low"),
    (110, 0, "Engine Coolant Temperature - Data Valid but Above Normal Range"),
    (110, 1, "Engine Coolant Temperature - Data Valid but Below Normal Range"),
    (110, 3, "Engine Coolant Temperature - Voltage Above Normal or Shorted High"),
    (111, 1, "Coolant Level - Data Valid but Below Normal Range"),
    (111, 2, "Coolant Level - Data Erratic or Intermittent"),
    (190, 0, "Engine Speed - Data Valid but Above Normal Range"),
    (190, 2, "Engine Speed - Data Erratic or Intermittent"),
    (91, 3, "Accelerator Pedal Position - Voltage Above Normal or Shorted High"),
    (91, 4, "Accelerator Pedal Position - Voltage Below Normal or Shorted Low"),
    (84, 0, "Wheel-Based Vehicle Speed - Data Valid but Above Normal Range"),
    (84, 2, "Wheel-Based Vehicle Speed - Data Erratic or Intermittent"),
    (723, 2, "Camshaft Speed Sensor - Data Erratic or Intermittent"),
    (723, 5, "Camshaft Speed Sensor - Current Below Normal or Open Circuit"),
    (639, 2, "J1939 Network #1 - Data Erratic or Intermittent"),
    (639, 3, "J1939 Network #1 - Voltage Above Normal or Shorted High"),
    (639, 4, "J1939 Network #1 - Voltage Below Normal or Shorted Low"),
    (108, 0, "Barometric Pressure - Data Valid but Above Normal Range"),
    (108, 1, "Barometric Pressure - Data Valid but Below Normal Range"),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog contains no entries")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    spn: u16,
    fmi: u8,
    description: String,
}

/// Immutable SPN/FMI lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCatalog {
    entries: HashMap<(u16, u8), String>,
}

impl FaultCatalog {
    pub fn builtin() -> Self {
        let entries = BUILTIN_ENTRIES
            .iter()
            .map(|&(spn, fmi, desc)| ((spn, fmi), desc.to_string()))
            .collect();
        Self { entries }
    }

    /// Parse a headed `spn,fmi,description` CSV. Duplicate pairs keep the
    /// first description.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut entries = HashMap::new();

        for row in rdr.deserialize::<CatalogRow>() {
            let row = row?;
            if entries.contains_key(&(row.spn, row.fmi)) {
                warn!(spn = row.spn, fmi = row.fmi, "Duplicate catalog entry, keeping the first");
                continue;
            }
            entries.insert((row.spn, row.fmi), row.description);
        }

        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { entries })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_csv_reader(file)
    }

    /// Load from `path` when given, falling back to the built-in table if the
    /// file is missing or malformed.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!(entries = BUILTIN_ENTRIES.len(), "Using built-in fault catalog");
            return Self::builtin();
        };

        match Self::load_from_file(path) {
            Ok(catalog) => {
                info!(path = %path.display(), entries = catalog.len(), "Loaded fault catalog");
                catalog
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load fault catalog, using built-in table");
                Self::builtin()
            }
        }
    }

    /// Description for a pair, or [`UNKNOWN_FAULT`].
    pub fn describe(&self, spn: u16, fmi: u8) -> &str {
        self.entries
            .get(&(spn, fmi))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_FAULT)
    }

    pub fn contains(&self, spn: u16, fmi: u8) -> bool {
        self.entries.contains_key(&(spn, fmi))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FaultCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fault::FAULT_TABLE;

    #[test]
    fn test_builtin_covers_every_emittable_pair() {
        let catalog = FaultCatalog::builtin();
        for (spn, fmis) in FAULT_TABLE {
            for fmi in *fmis {
                assert!(catalog.contains(*spn, *fmi), "missing {spn}/{fmi}");
                assert_ne!(catalog.describe(*spn, *fmi), UNKNOWN_FAULT);
            }
        }
    }

    #[test]
    fn test_unknown_pair_gets_sentinel() {
        let catalog = FaultCatalog::builtin();
        assert_eq!(catalog.describe(9999, 31), UNKNOWN_FAULT);
    }

    #[test]
    fn test_csv_first_duplicate_wins() {
        let csv = "spn,fmi,description\n100,1,Low oil\n100,1,Ignored\n 110 , 0 , Hot coolant \n";
        let catalog = FaultCatalog::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.describe(100, 1), "Low oil");
        assert_eq!(catalog.describe(110, 0), "Hot coolant");
    }

    #[test]
    fn test_csv_errors() {
        assert!(matches!(
            FaultCatalog::from_csv_reader("spn,fmi,description\n".as_bytes()),
            Err(CatalogError::Empty)
        ));
        assert!(matches!(
            FaultCatalog::from_csv_reader("spn,fmi,description\nabc,1,x\n".as_bytes()),
            Err(CatalogError::Csv(_))
        ));
    }

    #[test]
    fn test_load_falls_back_to_builtin() {
        let catalog = FaultCatalog::load(Some(Path::new("/nonexistent/decoder.csv")));
        assert_eq!(catalog, FaultCatalog::builtin());
    }

    #[test]
    fn test_shipped_decoder_matches_builtin() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/spn_fmi_decoder.csv");
        let shipped = FaultCatalog::load_from_file(&path).unwrap();
        assert_eq!(shipped, FaultCatalog::builtin());
    }
}
