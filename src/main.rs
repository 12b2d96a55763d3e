//! Lifecycle daemon (v1)
//!
//! Hosts a heartbeat service under the lifecycle coordinator.
//!
//! # Architecture Overview
//!
//! ```text
//!   initial thread                 lifecycle-signals            lifecycle-events
//!   ──────────────                 ─────────────────            ────────────────
//!   parse CLI, load config
//!   coordinator.start() ──spawn──▶ sigwait(INT,TERM,QUIT,HUP)
//!                       ──spawn──────────────────────────────▶ wait for events
//!   tokio runtime (inherits mask)        │ SIGHUP ──queue──────▶ reload listeners
//!   wait_for_termination() ◀──gate────── │ SIGTERM                (config store)
//!   stop runtime, shutdown()
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use lifecycle_coordinator::config::{ConfigSources, LoggingConfig};
use lifecycle_coordinator::lifecycle::startup::{self, StartupOptions};
use lifecycle_coordinator::observability::logging;
use lifecycle_coordinator::service::Heartbeat;

const APP_NAME: &str = "lifecycled";

#[derive(Parser)]
#[command(name = "lifecycled")]
#[command(about = "Service host with signal-driven shutdown and config reload", long_about = None)]
struct Cli {
    /// Configuration file; repeat to layer files, later ones win.
    /// Defaults to the system and user config files.
    #[arg(short, long = "config", value_name = "FILE")]
    config: Vec<PathBuf>,

    /// Override a configuration value, e.g. `service.heartbeat_secs=5`.
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Grace period in milliseconds after a termination signal.
    #[arg(long)]
    grace_ms: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut sources = if cli.config.is_empty() {
        ConfigSources::default_layers(APP_NAME)
    } else {
        ConfigSources {
            files: cli.config,
            overrides: Vec::new(),
        }
    };
    sources.overrides = cli.set;

    let mut options = StartupOptions::new(sources);
    options.grace_override = cli.grace_ms.map(Duration::from_millis);

    // Must run before the tokio runtime spawns its workers.
    let app = match startup::bootstrap(options) {
        Ok(app) => app,
        Err(e) => {
            logging::init(&LoggingConfig::default());
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lifecycled-worker")
        .build()?;

    let heartbeat = Heartbeat::new(app.config.clone());
    runtime.spawn(heartbeat.run(app.coordinator.subscribe_termination()));

    tracing::info!("Waiting for application termination");
    let reason = app.coordinator.wait_for_termination();
    tracing::info!(reason = %reason, "Application is shutting down");

    runtime.shutdown_timeout(Duration::from_secs(5));
    app.coordinator.shutdown();

    tracing::info!("Shutdown complete");
    Ok(())
}
