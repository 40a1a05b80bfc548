//! Application configuration: every tunable as a TOML value
//!
//! Each struct implements `Default` with the values the system ships with,
//! so a missing file or section changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::analysis::{AnomalyRules, ReportSettings};
use crate::generator::{FaultParams, PtoParams, RpmParams, SimulationParams, Span};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `AppConfig::load()` which searches:
/// 1. explicit `--config` path
/// 2. `$TELEMETRY_CONFIG` env var
/// 3. `./telemetry.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Generator tuning for the live feed and batch runs
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path must load; the env var and local file fall back to
    /// the next source with a warning. Env overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                let config = Self::load_from_file(path)?;
                info!(path = %path.display(), "Loaded config from --config");
                config
            }
            None => Self::discover(),
        };

        config.apply_overrides(std::env::var(defaults::SERVER_ADDR_ENV_VAR).ok());
        Ok(config)
    }

    fn discover() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = Path::new(&path);
            if p.exists() {
                match Self::load_from_file(p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from env, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        let local = Path::new(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!(path = %local.display(), "Loaded config from working directory");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No telemetry.toml found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, server_addr: Option<String>) {
        if let Some(addr) = server_addr.filter(|a| !a.trim().is_empty()) {
            info!(addr = %addr, "Server address overridden by {}", defaults::SERVER_ADDR_ENV_VAR);
            self.server.addr = addr;
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Check every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }
        if self.storage.path.as_os_str().is_empty() {
            errors.push("storage.path must not be empty".to_string());
        }

        let sim = &self.simulation;
        if sim.interval_ms == 0 {
            errors.push("simulation.interval_ms must be > 0".to_string());
        }
        Self::check_rpm_span(sim.rpm.initial, "simulation.rpm.initial", &mut errors);
        Self::check_rpm_span(sim.rpm.engaged_target, "simulation.rpm.engaged_target", &mut errors);
        Self::check_rpm_span(sim.rpm.disengaged_target, "simulation.rpm.disengaged_target", &mut errors);
        if !sim.rpm.step.is_valid() {
            errors.push(format!(
                "simulation.rpm.step: bound must be finite, positive and min <= max (got {:?})",
                sim.rpm.step
            ));
        }
        Self::check_dwell(sim.pto.initial, "simulation.pto.initial", &mut errors);
        Self::check_dwell(sim.pto.engaged, "simulation.pto.engaged", &mut errors);
        Self::check_dwell(sim.pto.disengaged, "simulation.pto.disengaged", &mut errors);
        Self::check_dwell(sim.fault.initial, "simulation.fault.initial", &mut errors);
        Self::check_dwell(sim.fault.active, "simulation.fault.active", &mut errors);
        Self::check_dwell(sim.fault.inactive, "simulation.fault.inactive", &mut errors);

        let a = &self.analysis;
        for (name, value) in [
            ("analysis.high_rpm_threshold", a.high_rpm_threshold),
            ("analysis.sudden_change_threshold", a.sudden_change_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("{name} must be finite and > 0 (got {value})"));
            }
        }
        if a.top_n == 0 {
            errors.push("analysis.top_n must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_rpm_span(span: Span<f64>, name: &str, errors: &mut Vec<String>) {
        // NaN comparisons silently pass, so check finiteness first
        if !span.min.is_finite() || !span.max.is_finite() {
            errors.push(format!("{name}: values must be finite (got {}..{})", span.min, span.max));
            return;
        }
        if span.min < 0.0 || span.max > 16_383.75 {
            errors.push(format!(
                "{name}: must lie within 0..16383.75 RPM (got {}..{})",
                span.min, span.max
            ));
        }
        if !span.is_valid() {
            errors.push(format!("{name}: min ({}) must be <= max ({})", span.min, span.max));
        }
    }

    fn check_dwell(span: Span<u32>, name: &str, errors: &mut Vec<String>) {
        if span.min == 0 {
            errors.push(format!("{name}: dwell must be at least 1 s"));
        }
        if !span.is_valid() {
            errors.push(format!("{name}: min ({}) must be <= max ({})", span.min, span.max));
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `TELEMETRY_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::DEFAULT_SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sled database directory
    pub path: PathBuf,
    /// Rows the live feed keeps; 0 disables retention
    pub retention_rows: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DEFAULT_STORE_PATH),
            retention_rows: defaults::DEFAULT_RETENTION_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Live feed tick interval (ms)
    pub interval_ms: u64,
    /// Fixed RNG seed; random when absent
    pub seed: Option<u64>,
    pub rpm: RpmParams,
    pub pto: PtoParams,
    pub fault: FaultParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::DEFAULT_TICK_INTERVAL_MS,
            seed: None,
            rpm: RpmParams::default(),
            pto: PtoParams::default(),
            fault: FaultParams::default(),
        }
    }
}

impl SimulationConfig {
    pub fn params(&self) -> SimulationParams {
        SimulationParams {
            rpm: self.rpm,
            pto: self.pto,
            fault: self.fault,
        }
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// SPN/FMI decoder CSV; the built-in table is used when absent or unreadable
    pub catalog_path: Option<PathBuf>,
    pub high_rpm_threshold: f64,
    pub sudden_change_threshold: f64,
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            catalog_path: Some(PathBuf::from(defaults::DEFAULT_CATALOG_PATH)),
            high_rpm_threshold: defaults::HIGH_RPM_DURING_PTO,
            sudden_change_threshold: defaults::SUDDEN_RPM_CHANGE,
            top_n: defaults::TOP_FAULTS,
        }
    }
}

impl AnalysisConfig {
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            rules: AnomalyRules {
                high_rpm_threshold: self.high_rpm_threshold,
                sudden_change_threshold: self.sudden_change_threshold,
            },
            top_n: self.top_n,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{EmissionPolicy, StepPolicy};
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.retention_rows, 3_600);
        assert_eq!(config.simulation.rpm.step, StepPolicy::Fixed { step: 50.0 });
        assert_eq!(config.simulation.fault.emission, EmissionPolicy::OncePerActivation);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [server]
            addr = "127.0.0.1:9000"

            [simulation]
            interval_ms = 250

            [simulation.rpm.step]
            policy = "random"
            min = 25.0
            max = 60.0

            [simulation.fault]
            emission = "every_tick"

            [analysis]
            top_n = 5
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:9000");
        assert_eq!(config.simulation.interval_ms, 250);
        assert_eq!(config.simulation.rpm.step, StepPolicy::Random { min: 25.0, max: 60.0 });
        assert_eq!(config.simulation.rpm.engaged_target, Span::new(900.0, 1300.0));
        assert_eq!(config.simulation.fault.emission, EmissionPolicy::EveryTick);
        assert_eq!(config.simulation.fault.active, Span::new(5, 30));
        assert_eq!(config.analysis.top_n, 5);
        assert_eq!(config.analysis.high_rpm_threshold, 2000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = AppConfig::default();
        config.simulation.interval_ms = 0;
        config.simulation.rpm.engaged_target = Span::new(1300.0, 900.0);
        config.simulation.pto.engaged = Span::new(0, 10);
        config.analysis.sudden_change_threshold = f64::NAN;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 4, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("interval_ms")));
                assert!(errors.iter().any(|e| e.contains("engaged_target")));
                assert!(errors.iter().any(|e| e.contains("pto.engaged")));
                assert!(errors.iter().any(|e| e.contains("sudden_change_threshold")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.toml");
        let mut config = AppConfig::default();
        config.simulation.seed = Some(7);
        config.storage.retention_rows = 0;
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(AppConfig::load(Some(&path)).map(|c| c.simulation.seed).ok(), Some(Some(7)));
    }

    #[test]
    fn test_explicit_path_errors_propagate() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[simulation]\ninterval_ms = \"fast\"\n").unwrap();
        assert!(matches!(AppConfig::load(Some(&bad)), Err(ConfigError::Parse(..))));
        assert!(matches!(
            AppConfig::load(Some(&dir.path().join("missing.toml"))),
            Err(ConfigError::Io(..))
        ));
    }

    #[test]
    fn test_env_style_override() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("  ".to_string()));
        assert_eq!(config.server.addr, defaults::DEFAULT_SERVER_ADDR);
        config.apply_overrides(Some("127.0.0.1:1".to_string()));
        assert_eq!(config.server.addr, "127.0.0.1:1");
    }
}
