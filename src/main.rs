//! vehicle-telemetry - CAN telemetry simulator and analyzer
//!
//! Generates synthetic engine RPM, PTO and fault frames, stores them in a
//! local sled database and serves decoded analysis panels over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # HTTP API and dashboard with the live generator feeding the store
//! vehicle-telemetry serve --simulate
//!
//! # Generator only
//! vehicle-telemetry feed
//!
//! # Import a CSV produced by the `simulation` binary
//! vehicle-telemetry load-csv data/telemetry.csv
//!
//! # Print the dashboard summary
//! vehicle-telemetry report --top 5
//! ```
//!
//! # Environment Variables
//!
//! - `TELEMETRY_CONFIG`: Path to a `telemetry.toml`
//! - `TELEMETRY_SERVER_ADDR`: Override the HTTP bind address
//! - `TELEMETRY_CORS_ORIGINS`: Comma-separated origins allowed by CORS
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_DB`: Set to "true" to wipe the telemetry store on startup

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vehicle_telemetry::analysis::TelemetryReport;
use vehicle_telemetry::api::{create_app, DashboardState};
use vehicle_telemetry::catalog::FaultCatalog;
use vehicle_telemetry::config::{defaults, AppConfig};
use vehicle_telemetry::csv_io;
use vehicle_telemetry::generator::TelemetrySimulator;
use vehicle_telemetry::pipeline::LiveFeed;
use vehicle_telemetry::storage::TelemetryStore;
use vehicle_telemetry::types::{parse_timestamp, TimeRange};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "vehicle-telemetry")]
#[command(about = "Vehicle CAN telemetry simulator and analyzer")]
#[command(version)]
struct CliArgs {
    /// Path to a telemetry.toml (otherwise $TELEMETRY_CONFIG, ./telemetry.toml, defaults)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Wipe the telemetry store before starting.
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long, global = true)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and dashboard
    Serve {
        /// Override the server address (default: "0.0.0.0:8080")
        #[arg(short, long)]
        addr: Option<String>,

        /// Run the live generator alongside the server
        #[arg(long)]
        simulate: bool,
    },

    /// Run the live generator without the HTTP server
    Feed,

    /// Import telemetry rows from a CSV file into the store
    LoadCsv {
        /// CSV with timestamp,channel_id,payload columns
        file: PathBuf,
    },

    /// Print the dashboard summary to the terminal
    Report {
        /// Number of fault groups to list
        #[arg(long)]
        top: Option<usize>,

        /// Only include rows at or after this time (ISO-8601)
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<DateTime<Utc>>,

        /// Only include rows at or before this time (ISO-8601)
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<DateTime<Utc>>,
    },
}

// ============================================================================
// Database Reset
// ============================================================================

/// Check if a store reset is requested via CLI flag or environment variable.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var(defaults::RESET_DB_ENV_VAR) {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

/// Remove the sled directory so a fresh store is created on open.
fn reset_store_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        info!(path = %path.display(), "Store directory does not exist, nothing to reset");
        return Ok(());
    }

    warn!(path = %path.display(), "RESET_DB requested - wiping telemetry store");
    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove store directory {}", path.display()))?;
    warn!("Store removed. A fresh database will be created on startup.");
    Ok(())
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    LiveFeed,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::LiveFeed => write!(f, "LiveFeed"),
        }
    }
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the live generator task into the JoinSet.
fn spawn_live_feed(
    task_set: &mut JoinSet<Result<TaskName>>,
    store: TelemetryStore,
    config: &AppConfig,
    cancel_token: CancellationToken,
) {
    let sim = &config.simulation;
    let simulator = match sim.seed {
        Some(seed) => TelemetrySimulator::seeded(sim.params(), seed),
        None => TelemetrySimulator::from_entropy(sim.params()),
    };
    let feed = LiveFeed::new(store, simulator, sim.interval(), config.storage.retention_rows);

    task_set.spawn(async move {
        info!("[LiveFeed] Task starting");
        feed.run(cancel_token).await.context("Live feed stopped")?;
        Ok(TaskName::LiveFeed)
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    // Keep draining after cancellation so every task gets to flush
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => {
                info!("Supervisor: task {} completed", task_name);
            }
            Ok(Err(e)) => {
                error!("Supervisor: task failed with error: {:#}", e);
                cancel_token.cancel();
                task_set.shutdown().await;
                return Err(e);
            }
            Err(e) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                task_set.shutdown().await;
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    info!("Supervisor: all tasks completed");
    Ok(())
}

// ============================================================================
// Subcommands
// ============================================================================

fn open_store(config: &AppConfig) -> Result<TelemetryStore> {
    let path = &config.storage.path;
    TelemetryStore::open(path)
        .with_context(|| format!("Failed to open telemetry store at {}", path.display()))
}

async fn run_serve(
    config: AppConfig,
    addr: Option<String>,
    simulate: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let store = open_store(&config)?;
    let catalog = FaultCatalog::load(config.analysis.catalog_path.as_deref());
    let state = DashboardState::new(store.clone(), catalog, config.analysis.report_settings());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Dashboard: http://{}", addr);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, create_app(state), cancel_token.clone());
    if simulate {
        spawn_live_feed(&mut task_set, store.clone(), &config, cancel_token.clone());
    }

    let outcome = run_supervisor(&mut task_set, cancel_token).await;
    store.flush().context("Final store flush failed")?;
    outcome
}

async fn run_feed(config: AppConfig, cancel_token: CancellationToken) -> Result<()> {
    let store = open_store(&config)?;
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_live_feed(&mut task_set, store, &config, cancel_token.clone());
    run_supervisor(&mut task_set, cancel_token).await
}

fn run_load_csv(config: &AppConfig, file: &Path) -> Result<()> {
    let rows = csv_io::read_rows_from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let store = open_store(config)?;
    let inserted = store
        .insert_batch(rows)
        .context("Failed to insert imported rows")?;
    store.flush()?;
    info!(rows = inserted.len(), file = %file.display(), "CSV import complete");
    Ok(())
}

fn run_report(
    config: &AppConfig,
    top: Option<usize>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    if let (Some(s), Some(e)) = (start, end) {
        anyhow::ensure!(s <= e, "--start must not be after --end");
    }

    let store = open_store(config)?;
    let catalog = FaultCatalog::load(config.analysis.catalog_path.as_deref());
    let mut settings = config.analysis.report_settings();
    if let Some(top) = top {
        settings.top_n = top;
    }

    let report = TelemetryReport::build(&store, &catalog, TimeRange::new(start, end), &settings)
        .context("Failed to build report")?;
    println!("{}", report.render_text());
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Reset before anything opens the store
    if should_reset_db(args.reset_db) {
        reset_store_directory(&config.storage.path)?;
    }

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    match args.command {
        Command::Serve { addr, simulate } => run_serve(config, addr, simulate, cancel_token).await?,
        Command::Feed => run_feed(config, cancel_token).await?,
        Command::LoadCsv { file } => run_load_csv(&config, &file)?,
        Command::Report { top, start, end } => run_report(&config, top, start, end)?,
    }

    info!("vehicle-telemetry shutdown complete");
    Ok(())
}
