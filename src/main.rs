//! # Telemetry Relay
//!
//! Airside: forward flight-controller telemetry over every available link.
//! Groundstation: ingest telemetry from every link into one live snapshot.
//!
//! ```text
//! telemetry-relay airside [config.toml]
//! telemetry-relay groundstation [config.toml]
//! ```
//!
//! Without a config path, `config/default.toml` is used if present, and the
//! built-in defaults otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telemetry_relay::config::{Config, LoggingConfig};
use telemetry_relay::ingest::Coordinator;
use telemetry_relay::relay::airside::AirsideRelay;
use telemetry_relay::telemetry::recorder::{run_recorder, SnapshotRecorder};
use telemetry_relay::telemetry::TelemetryStore;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Interval between snapshot status lines on the groundstation
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Airside,
    Groundstation,
}

/// Parse `<role> [config]` from the arguments after the program name
fn parse_args(args: &[String]) -> Result<(Role, PathBuf)> {
    let role = match args.first().map(String::as_str) {
        Some("airside") => Role::Airside,
        Some("groundstation") => Role::Groundstation,
        Some(other) => bail!("Unknown role {:?}; expected 'airside' or 'groundstation'", other),
        None => bail!("Usage: telemetry-relay <airside|groundstation> [config.toml]"),
    };

    let config_path = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    Ok((role, config_path))
}

/// Console logging, plus a daily rolling file when configured
///
/// `RUST_LOG` takes precedence over the configured level. The returned
/// guard must live until exit so buffered file output is flushed.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "telemetry-relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (role, config_path) = parse_args(&args)?;

    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    let _log_guard = init_logging(&config.logging);

    info!("Telemetry Relay v{} starting as {:?}", env!("CARGO_PKG_VERSION"), role);
    if config_path.exists() {
        info!("Configuration loaded from {}", config_path.display());
    } else {
        info!("No configuration at {}, using defaults", config_path.display());
    }

    match role {
        Role::Airside => run_airside(&config).await,
        Role::Groundstation => run_groundstation(&config).await,
    }
}

/// Forward flight-controller lines until Ctrl+C
async fn run_airside(config: &Config) -> Result<()> {
    let mut relay = AirsideRelay::from_config(config);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = relay.poll() => {}

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Total lines forwarded: {}", relay.forwarded());
    relay.relay().log_stats();
    Ok(())
}

/// Ingest from every link until Ctrl+C, logging the snapshot periodically
async fn run_groundstation(config: &Config) -> Result<()> {
    let store = Arc::new(TelemetryStore::new());

    // Binding the UDP port is the one failure that stops the groundstation
    let coordinator = Coordinator::start(config, store.clone())
        .await
        .context("Failed to start telemetry ingestion")?;

    let recorder = if config.recording.enabled {
        let recorder = SnapshotRecorder::new(
            &config.recording.log_dir,
            config.recording.max_records_per_file,
            config.recording.max_files_to_keep,
        )
        .context("Failed to open recording directory")?;
        info!("Recording snapshots to {}", config.recording.log_dir);
        Some(tokio::spawn(run_recorder(
            store.clone(),
            recorder,
            config.recording.interval(),
        )))
    } else {
        None
    };

    let mut status_interval = interval(STATUS_LOG_INTERVAL);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                let s = store.read_snapshot();
                info!(
                    "alt {:.1} m, speed {:.1} km/h, battery {:.0}%, gps ({:.6}, {:.6}), hdg {:.0}, sats {}, mode {}, {} RC channels",
                    s.altitude, s.speed, s.battery, s.gps.0, s.gps.1, s.heading,
                    s.satellites, s.mode, s.rc_channels.len()
                );
                for name in coordinator.finished() {
                    warn!("{} task has stopped", name);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let counters = coordinator.stats();
    info!(
        "Ingested {} datagrams, {} radio records, {} RC lines",
        counters.udp_datagrams, counters.radio_records, counters.rc_lines
    );
    coordinator.shutdown();
    if let Some(task) = recorder {
        task.abort();
    }
    Ok(())
}
