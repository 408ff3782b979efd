//! Validation for configuration and request parameters.
//!
//! Configuration sections and screening parameters implement [`Validate`]
//! so that bad values are rejected before any work starts.

use thiserror::Error;

use crate::config::{Config, FundConfig, ObservabilityConfig};

/// Validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Parameter conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections and parameter sets.
pub trait Validate {
    /// Validate this value.
    fn validate(&self) -> ValidationResult<()>;
}

/// Fold a list of collected errors into a single result.
pub fn collect_errors(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        Err(ValidationError::Multiple(errors))
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.fund.validate() {
            errors.push(e);
        }

        collect_errors(errors)
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!(
                    "'{}' is not one of {}",
                    self.log_level,
                    valid_levels.join(", ")
                ),
            });
        }

        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("'{}' must be 'json' or 'pretty'", self.log_format),
            });
        }

        Ok(())
    }
}

impl Validate for FundConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        let non_zero = [
            ("fund.refresh_interval_secs", self.refresh_interval_secs),
            ("fund.provider_timeout_secs", self.provider_timeout_secs),
            ("fund.refresh_concurrency", self.refresh_concurrency as u64),
            ("fund.max_check_batch", self.max_check_batch as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }

        if self.provider_timeout_secs > self.refresh_interval_secs && self.refresh_interval_secs > 0
        {
            errors.push(ValidationError::Conflict {
                reason: format!(
                    "provider timeout ({}s) exceeds refresh interval ({}s)",
                    self.provider_timeout_secs, self.refresh_interval_secs
                ),
            });
        }

        collect_errors(errors)
    }
}
