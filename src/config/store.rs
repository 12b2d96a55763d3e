//! Shared, hot-reloadable configuration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::loader::{load_config, ConfigError, ConfigSources};
use crate::config::schema::AppConfig;
use crate::lifecycle::listeners::ListenerResult;

/// Current configuration plus the sources it was read from.
///
/// Readers get a cheap `Arc` snapshot; [`reload`](Self::reload) swaps in a
/// new one atomically or leaves the current one untouched.
#[derive(Debug)]
pub struct ConfigStore {
    sources: ConfigSources,
    current: ArcSwap<AppConfig>,
    generation: AtomicU64,
}

impl ConfigStore {
    /// Load the initial configuration.
    pub fn load(sources: ConfigSources) -> Result<Self, ConfigError> {
        let config = load_config(&sources)?;
        Ok(Self::with_config(sources, config))
    }

    pub fn with_config(sources: ConfigSources, config: AppConfig) -> Self {
        Self {
            sources,
            current: ArcSwap::from_pointee(config),
            generation: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// Number of successful reloads.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn sources(&self) -> &ConfigSources {
        &self.sources
    }

    /// Re-read every source. On failure the current configuration stays.
    pub fn reload(&self) -> Result<Arc<AppConfig>, ConfigError> {
        let config = match load_config(&self.sources) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                return Err(e);
            }
        };

        let previous = self.current.swap(config.clone());
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if *previous == *config {
            tracing::info!(generation, "Configuration reloaded, no changes");
        } else {
            tracing::info!(generation, "Configuration reloaded with changes");
        }
        Ok(config)
    }

    /// Reload callback for `Coordinator::register_config_reload_listener`.
    pub fn reload_listener(self: &Arc<Self>) -> impl Fn() -> ListenerResult + Send + Sync + 'static {
        let store = Arc::clone(self);
        move || {
            store.reload()?;
            Ok(())
        }
    }
}
