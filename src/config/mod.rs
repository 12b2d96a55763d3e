//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config files (TOML, lowest priority first)
//!     → loader.rs (parse, deep-merge, apply overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → store.rs (shared via ArcSwap)
//!
//! On reload (SIGHUP → coordinator listener):
//!     store.rs re-runs loader.rs with the same sources
//!     → validation.rs validates
//!     → atomic swap of Arc<AppConfig>
//!     → on failure the current config stays in place
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Later files and overrides win over earlier ones

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;

pub use loader::{ConfigError, ConfigSources};
pub use schema::{AppConfig, LifecycleConfig, LogFormat, LoggingConfig, ServiceConfig};
pub use store::ConfigStore;
