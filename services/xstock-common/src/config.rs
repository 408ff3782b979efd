//! Configuration management for the X-Stock services.
//!
//! Services share a configuration file at `~/.xstock/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (XSTOCK_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `XSTOCK_LOG_LEVEL` → observability.log_level
//! - `XSTOCK_LOG_FORMAT` → observability.log_format
//! - `XSTOCK_REFRESH_INTERVAL_SECS` → fund.refresh_interval_secs
//! - `XSTOCK_PROVIDER_TIMEOUT_SECS` → fund.provider_timeout_secs
//! - `XSTOCK_REFRESH_CONCURRENCY` → fund.refresh_concurrency
//! - `XSTOCK_MAX_CHECK_BATCH` → fund.max_check_batch

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".xstock"),
        |dirs| dirs.home_dir().join(".xstock"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Fund universe and checker configuration
    #[serde(default)]
    pub fund: FundConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (env, test maps, ...).
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("XSTOCK_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("XSTOCK_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(v) = lookup("XSTOCK_REFRESH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.fund.refresh_interval_secs = v;
        }
        if let Some(v) = lookup("XSTOCK_PROVIDER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.fund.provider_timeout_secs = v;
        }
        if let Some(v) = lookup("XSTOCK_REFRESH_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.fund.refresh_concurrency = v;
        }
        if let Some(v) = lookup("XSTOCK_MAX_CHECK_BATCH").and_then(|v| v.parse().ok()) {
            self.fund.max_check_batch = v;
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Fund Configuration
// ============================================================================

/// Fund universe refresh and checker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundConfig {
    /// Seconds between background universe refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Per-call deadline for provider requests
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Concurrent fund info fetches during a refresh
    #[serde(default = "default_refresh_concurrency")]
    pub refresh_concurrency: usize,

    /// Maximum number of funds in one deep-check batch
    #[serde(default = "default_max_check_batch")]
    pub max_check_batch: usize,
}

impl FundConfig {
    /// Refresh interval as a duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Provider call timeout as a duration.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for FundConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            provider_timeout_secs: default_provider_timeout(),
            refresh_concurrency: default_refresh_concurrency(),
            max_check_batch: default_max_check_batch(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    3600 // hourly
}
fn default_provider_timeout() -> u64 {
    10
}
fn default_refresh_concurrency() -> usize {
    16
}
fn default_max_check_batch() -> usize {
    50
}

// ============================================================================
// Tests
// ============================================================================
