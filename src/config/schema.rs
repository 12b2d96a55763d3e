//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the daemon.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Signal handling and supervisor integration.
    pub lifecycle: LifecycleConfig,

    /// Log filter and output format.
    pub logging: LoggingConfig,

    /// Settings of the hosted service.
    pub service: ServiceConfig,
}

/// Lifecycle coordinator settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Grace period applied when termination comes from a signal, in milliseconds.
    pub signal_grace_ms: u64,

    /// Send readiness notifications to `NOTIFY_SOCKET` when set.
    pub notify_supervisor: bool,
}

impl LifecycleConfig {
    pub fn signal_grace(&self) -> Duration {
        Duration::from_millis(self.signal_grace_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            signal_grace_ms: 0,
            notify_supervisor: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    pub filter: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lifecycle_coordinator=info,lifecycled=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Hosted service configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name reported in heartbeat logs.
    pub name: String,

    /// Heartbeat interval in seconds.
    pub heartbeat_secs: u64,
}

impl ServiceConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "lifecycled".to_string(),
            heartbeat_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [service]
            name = "edge"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "edge");
        assert_eq!(config.service.heartbeat_secs, 30);
        assert_eq!(config.lifecycle, LifecycleConfig::default());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_is_lowercase() {
        let config: AppConfig = toml::from_str("[logging]\nformat = \"json\"\n").unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
