//! Configuration Module
//!
//! Every tunable (server address, store path and retention, generator ranges,
//! anomaly thresholds) loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` CLI flag
//! 2. `TELEMETRY_CONFIG` environment variable (path to TOML file)
//! 3. `telemetry.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Usage
//!
//! Load once in `main()` and pass the pieces down explicitly:
//!
//! ```ignore
//! let config = AppConfig::load(cli.config.as_deref())?;
//! let store = TelemetryStore::open(&config.storage.path)?;
//! ```

mod app_config;
pub mod defaults;

pub use app_config::*;
