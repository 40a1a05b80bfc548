//! Telemetry Storage
//!
//! Sled-backed persistence for raw telemetry rows. The store is the only
//! shared resource between the write path (simulator, CSV import, API) and
//! the read path (analysis, dashboard).

mod telemetry;

pub use telemetry::{RecordFilter, StoreStats, TelemetryStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Telemetry record {0} not found")]
    NotFound(u64),

    #[error("Store is corrupt: {0}")]
    Corrupt(String),
}
