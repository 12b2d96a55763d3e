//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid override '{0}': {1}")]
    Override(String, String),

    #[error("Invalid configuration: {0}")]
    Schema(#[source] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a configuration comes from. Kept by the store so reloads read the
/// same layers again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    /// TOML files, lowest priority first. Missing files are skipped.
    pub files: Vec<PathBuf>,

    /// `section.key=value` overrides applied after all files.
    pub overrides: Vec<String>,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn override_value(mut self, assignment: impl Into<String>) -> Self {
        self.overrides.push(assignment.into());
        self
    }

    /// System file, then the per-user file under `$XDG_CONFIG_HOME`
    /// (falling back to `~/.config`).
    pub fn default_layers(app_name: &str) -> Self {
        let mut sources = Self::new().file(Path::new("/etc").join(app_name).join("config.toml"));

        let user_dir = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
        if let Some(dir) = user_dir {
            sources = sources.file(dir.join(app_name).join("config.toml"));
        }
        sources
    }
}

/// Load, merge, override and validate configuration.
pub fn load_config(sources: &ConfigSources) -> Result<AppConfig, ConfigError> {
    let mut merged = Table::new();

    for path in &sources.files {
        match read_table(path)? {
            Some(table) => {
                merge_tables(&mut merged, table);
                tracing::info!(path = %path.display(), "Configuration layer loaded");
            }
            None => tracing::warn!(path = %path.display(), "Configuration file not found, skipping"),
        }
    }

    for assignment in &sources.overrides {
        apply_override(&mut merged, assignment)?;
    }

    let config = AppConfig::deserialize(Value::Table(merged)).map_err(ConfigError::Schema)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_table(path: &Path) -> Result<Option<Table>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    content
        .parse::<Table>()
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Deep-merge `overlay` into `base`. Tables merge recursively, every other
/// value replaces what was there.
pub fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        let Value::Table(incoming) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, Value::Table(incoming));
    }
}

/// Apply a `dotted.key=value` assignment, creating intermediate tables.
pub fn apply_override(root: &mut Table, assignment: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Override(assignment.to_string(), reason.to_string());

    let (path, raw) = assignment
        .split_once('=')
        .ok_or_else(|| invalid("expected KEY=VALUE"))?;
    let segments: Vec<&str> = path.trim().split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid("empty key segment"));
    }

    let (leaf, parents) = segments
        .split_last()
        .ok_or_else(|| invalid("empty key"))?;
    let mut table = root;
    for segment in parents {
        let entry = table
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        table = match entry {
            Value::Table(inner) => inner,
            _ => return Err(invalid(&format!("'{}' is not a table", segment))),
        };
    }

    table.insert(leaf.to_string(), infer_value(raw.trim()));
    Ok(())
}

/// Type an override value: integer, float, bool, otherwise string.
pub fn infer_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    match raw {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::String(raw.trim_matches('"').to_string()),
    }
}
