//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging from the loaded configuration
//! - Start the lifecycle coordinator and wire the config reload listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Runs on the initial thread, before any runtime spawns workers, so every
//!   later thread inherits the blocked signal mask

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ConfigError, ConfigSources, ConfigStore};
use crate::lifecycle::coordinator::{Coordinator, StartError};
use crate::lifecycle::notify::{NoopNotifier, ReadinessNotifier, SystemdNotifier};
use crate::lifecycle::signals::SignalSource;
use crate::lifecycle::termination::whole_millis;
use crate::observability::logging;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start lifecycle coordinator: {0}")]
    Coordinator(#[from] StartError),
}

/// Inputs to [`bootstrap`].
#[derive(Default)]
pub struct StartupOptions {
    pub sources: ConfigSources,

    /// Replaces `lifecycle.signal_grace_ms` from the config.
    pub grace_override: Option<Duration>,

    /// Signal source; the OS source when unset.
    pub signal_source: Option<Arc<dyn SignalSource>>,

    /// Skip installing the global tracing subscriber.
    pub skip_logging: bool,
}

impl StartupOptions {
    pub fn new(sources: ConfigSources) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }
}

/// A started application core.
pub struct Application {
    pub config: Arc<ConfigStore>,
    pub coordinator: Coordinator,
}

/// Load config, init logging, start the coordinator.
pub fn bootstrap(options: StartupOptions) -> Result<Application, StartupError> {
    let store = Arc::new(ConfigStore::load(options.sources)?);
    let config = store.current();

    if !options.skip_logging {
        logging::init(&config.logging);
    }

    let notifier: Arc<dyn ReadinessNotifier> = if config.lifecycle.notify_supervisor {
        let systemd = SystemdNotifier::from_env();
        if !systemd.is_enabled() {
            tracing::debug!("NOTIFY_SOCKET not set, supervisor notifications disabled");
        }
        Arc::new(systemd)
    } else {
        Arc::new(NoopNotifier)
    };
    let grace = options
        .grace_override
        .unwrap_or_else(|| config.lifecycle.signal_grace());

    let mut builder = Coordinator::builder().notifier(notifier).signal_grace(grace);
    if let Some(source) = options.signal_source {
        builder = builder.source(source);
    }
    let coordinator = builder.build();

    coordinator.register_config_reload_listener(store.reload_listener());
    coordinator.start()?;

    tracing::info!(
        service = %config.service.name,
        grace_ms = whole_millis(grace),
        layers = store.sources().files.len(),
        "Application core started"
    );

    Ok(Application {
        config: store,
        coordinator,
    })
}
