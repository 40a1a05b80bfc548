//! Vehicle Telemetry: CAN frame simulation and analysis
//!
//! Simulates a vehicle emitting three CAN channels, persists the frames and
//! turns them back into dashboard panels.
//!
//! ## Architecture
//!
//! - **Generator**: RPM, PTO and fault state machines producing hex payloads
//! - **Codec**: Encoding and decoding of the 8-byte payloads
//! - **Storage**: sled-backed telemetry store with a time index
//! - **Analysis**: Series, statistics, fault catalog lookups and anomaly rules
//! - **API**: Axum HTTP server with CRUD and panel endpoints

pub mod analysis;
pub mod api;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod csv_io;
pub mod generator;
pub mod pipeline;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::AppConfig;

// Re-export commonly used types
pub use types::{
    Anomaly, AnomalyReason, Channel, DecodedFault, FaultStats, NewTelemetry, PtoStats, RpmStats,
    Severity, TelemetryRecord, TimeRange,
};

// Re-export the main building blocks
pub use analysis::{ReportSettings, TelemetryReport};
pub use catalog::FaultCatalog;
pub use codec::{DecodeError, Decoded};
pub use generator::{SimulationParams, TelemetrySimulator};
pub use pipeline::LiveFeed;
pub use storage::{StorageError, TelemetryStore};
