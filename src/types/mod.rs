//! Shared data structures for the vehicle telemetry pipeline
//!
//! - Telemetry rows and channels (store / API / simulator)
//! - Decoded faults and severity tiers
//! - Analysis outputs (stats, frequency tables, anomalies)

mod analysis;
mod fault;
mod telemetry;

pub use analysis::*;
pub use fault::*;
pub use telemetry::*;
