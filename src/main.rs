//! # Greenhouse Controller
//!
//! Drives the grow light and irrigation motor of a small greenhouse and
//! uploads hourly readings whenever the uplink is available.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use greenhouse_controller::clock::{self, Clock, SystemClock};
use greenhouse_controller::config::Config;
use greenhouse_controller::greenhouse::{GreenhouseCycle, Outputs};
use greenhouse_controller::hw::{RelayActuator, SimulatedSensors, StaticDutySignal};
use greenhouse_controller::network::link::{Link, TcpProbeLink};
use greenhouse_controller::network::monitor::ConnectivityMonitor;
use greenhouse_controller::network::ModeFlag;
use greenhouse_controller::telemetry::drainer::TelemetryDrainer;
use greenhouse_controller::telemetry::journal::Journal;
use greenhouse_controller::telemetry::logger::TelemetryLogger;
use greenhouse_controller::telemetry::remote::{HttpRemoteStore, RemoteStore};

/// Environment variable naming the configuration file
const CONFIG_ENV_VAR: &str = "GREENHOUSE_CONFIG";

/// Configuration file used when the environment variable is unset
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the greenhouse controller
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (compiled-in defaults if no file exists)
///    - Read the clock once; without a clock nothing can be scheduled
///
/// 2. **Concurrent loops**
///    - Sensor/actuator cycle every 2 s (normal mode only)
///    - Connectivity monitor every 5 s
///    - Drain loop every 100 ms, draining the journal in drain-only mode
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops the loops and switches the motor and light off
///
/// # Errors
///
/// Returns error if the configuration file is invalid or the clock cannot
/// be read at startup.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Greenhouse controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let now = clock::probe(clock.as_ref()).context("time source unavailable, halting")?;
    info!("Clock reads {}", now);

    let mode = ModeFlag::default();
    let journal = Journal::new(config.storage.log_path(), config.storage.scratch_path());
    info!("Durable log at {}", journal.path().display());

    let link: Arc<dyn Link> = Arc::new(TcpProbeLink::new(
        config.network.probe_address.clone(),
        Duration::from_millis(config.network.probe_timeout_ms),
    ));
    let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::new(&config.remote));

    let monitor = ConnectivityMonitor::new(link.clone(), mode.clone(), &config.network);
    if monitor.reconnect().await {
        info!("Link available at startup");
    } else {
        warn!("Link unavailable at startup, buffering readings locally");
    }

    let cycle = GreenhouseCycle::new(
        &config.schedule,
        clock,
        SimulatedSensors::default(),
        Box::new(StaticDutySignal(config.schedule.extended_interval)),
        TelemetryLogger::new(journal.clone()),
        Outputs {
            motor: Box::new(RelayActuator::new("Motor")),
            light: Box::new(RelayActuator::new("Light")),
        },
        mode.clone(),
    );

    let cycle_task = tokio::spawn(cycle.run(Duration::from_millis(config.cycle.sample_interval_ms)));
    let monitor_task = tokio::spawn(monitor.run());

    let drainer = TelemetryDrainer::new(journal, remote, link, mode.clone());
    let mut drain_interval = interval(Duration::from_millis(config.cycle.drain_poll_interval_ms));
    drain_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = drain_interval.tick() => {
                if !mode.is_drain_only() {
                    continue;
                }
                match drainer.drain().await {
                    Ok(report) => debug!(?report, "Drain pass finished"),
                    Err(e) => error!("Drain pass aborted: {}", e),
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    monitor_task.abort();
    cycle_task.abort();
    // Dropping the cycle switches the outputs off
    let _ = cycle_task.await;

    Ok(())
}

/// Load the configuration file, falling back to defaults if it is absent
fn load_config(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        warn!("No configuration at {}, using compiled-in defaults", path);
        return Ok(Config::default());
    }

    let config = Config::load(path).with_context(|| format!("invalid configuration in {}", path))?;
    info!("Configuration loaded from {}", path);
    Ok(config)
}
