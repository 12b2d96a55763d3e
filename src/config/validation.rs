//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, names present)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "service.name" });
    }
    if config.service.heartbeat_secs == 0 {
        errors.push(ValidationError::Zero { field: "service.heartbeat_secs" });
    }
    if config.logging.filter.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "logging.filter" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = AppConfig::default();
        config.service.name = " ".into();
        config.service.heartbeat_secs = 0;
        config.logging.filter = String::new();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Empty { field: "service.name" },
                ValidationError::Zero { field: "service.heartbeat_secs" },
                ValidationError::Empty { field: "logging.filter" },
            ]
        );
        assert_eq!(errors[1].to_string(), "service.heartbeat_secs must be greater than zero");
    }
}
