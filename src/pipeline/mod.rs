//! Telemetry Pipeline
//!
//! ```text
//! Simulator (PTO -> RPM -> Fault) --tick--> TelemetryStore --read--> Analysis --> API / report
//! ```
//!
//! The feed is the only writer in live mode; the store transaction per tick
//! keeps readers from seeing half a tick.

pub mod feed;

pub use feed::{FeedStats, LiveFeed};
