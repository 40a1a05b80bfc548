//! Batch Telemetry Simulation
//!
//! Generates a fixed number of one-second ticks of engine RPM, PTO and
//! fault frames and writes them to a CSV file or straight into the store.
//!
//! # Usage
//! ```bash
//! ./simulation --rows 7200 --seed 42 --output data/telemetry.csv
//! ./simulation --rows 3600 --store data/telemetry_db
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use vehicle_telemetry::config::{defaults, AppConfig};
use vehicle_telemetry::csv_io;
use vehicle_telemetry::generator::TelemetrySimulator;
use vehicle_telemetry::storage::TelemetryStore;
use vehicle_telemetry::types::{parse_timestamp, truncate_to_second, Channel, NewTelemetry};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Batch CAN telemetry generation")]
#[command(version)]
struct Args {
    /// Number of one-second ticks to generate
    #[arg(long, default_value_t = defaults::DEFAULT_BATCH_TICKS)]
    rows: usize,

    /// Random seed for reproducibility (overrides simulation.seed in config)
    #[arg(long)]
    seed: Option<u64>,

    /// Timestamp of the first tick (default: now minus the batch length)
    #[arg(long, value_parser = parse_timestamp)]
    start: Option<DateTime<Utc>>,

    /// CSV output path
    #[arg(short, long, default_value = defaults::DEFAULT_BATCH_OUTPUT)]
    output: PathBuf,

    /// Insert into the sled store at this path instead of writing CSV
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Path to a telemetry.toml supplying generator parameters
    #[arg(long)]
    config: Option<PathBuf>,
}

fn count_channel(rows: &[NewTelemetry], channel: Channel) -> usize {
    rows.iter().filter(|r| r.channel_id == channel).count()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.rows > 0, "--rows must be at least 1");

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let params = config.simulation.params();
    let mut simulator = match args.seed.or(config.simulation.seed) {
        Some(seed) => {
            info!(seed, "Seeded generator");
            TelemetrySimulator::seeded(params, seed)
        }
        None => TelemetrySimulator::from_entropy(params),
    };

    let span = i64::try_from(args.rows).context("--rows too large")?;
    let start = args
        .start
        .unwrap_or_else(|| truncate_to_second(Utc::now()) - Duration::seconds(span));

    let rows = simulator.generate_batch(start, args.rows);
    info!(
        ticks = args.rows,
        rows = rows.len(),
        rpm = count_channel(&rows, Channel::Rpm),
        pto = count_channel(&rows, Channel::Pto),
        faults = count_channel(&rows, Channel::Fault),
        start = %start,
        "Generated telemetry batch"
    );

    match args.store {
        Some(path) => {
            let store = TelemetryStore::open(&path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            let inserted = store.insert_batch(rows).context("Failed to insert batch")?;
            store.flush()?;
            info!(rows = inserted.len(), path = %path.display(), "Batch stored");
        }
        None => {
            csv_io::write_rows_to_path(&args.output, &rows)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
            info!(path = %args.output.display(), "Batch written");
        }
    }

    Ok(())
}
