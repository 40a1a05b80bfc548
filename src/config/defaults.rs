//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Configuration Discovery
// ============================================================================

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV_VAR: &str = "TELEMETRY_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "telemetry.toml";

/// Overrides `server.addr`.
pub const SERVER_ADDR_ENV_VAR: &str = "TELEMETRY_SERVER_ADDR";

/// When set to `1`/`true`, wipes the store at startup.
pub const RESET_DB_ENV_VAR: &str = "RESET_DB";

// ============================================================================
// Server
// ============================================================================

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Storage
// ============================================================================

pub const DEFAULT_STORE_PATH: &str = "./data/telemetry.db";

/// Rows kept by the live feed after each tick; 0 keeps everything.
pub const DEFAULT_RETENTION_ROWS: usize = 3_600;

// ============================================================================
// Simulation
// ============================================================================

/// Live feed tick interval (ms).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Ticks produced by the batch generator (two or three rows each).
pub const DEFAULT_BATCH_TICKS: usize = 3_600;

pub const DEFAULT_BATCH_OUTPUT: &str = "data/telemetry.csv";

// ============================================================================
// Analysis
// ============================================================================

pub const DEFAULT_CATALOG_PATH: &str = "data/spn_fmi_decoder.csv";

/// RPM above this with the PTO engaged is an anomaly.
pub const HIGH_RPM_DURING_PTO: f64 = 2_000.0;

/// RPM change against the sample two positions back that counts as sudden.
pub const SUDDEN_RPM_CHANGE: f64 = 110.0;

/// Fault groups shown in the frequency panel.
pub const TOP_FAULTS: usize = 10;

// ============================================================================
// API
// ============================================================================

/// Row cap for `GET /telemetry` when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: usize = 1_000;
