//! # Configuration
//!
//! Explicit, validated configuration for the broker core: an optional YAML
//! file layered under `LIBSHARE_*` environment overrides. No silent
//! fallbacks beyond the documented defaults; invalid values fail loading
//! rather than limping along.
//!
//! ```rust,no_run
//! use libshare_core::config::BrokerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BrokerConfig::load()?;
//! let interval = config.scheduler.poll_interval();
//! let url = &config.database.url;
//! # Ok(())
//! # }
//! ```

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default config file path, overridable via `LIBSHARE_CONFIG`.
const DEFAULT_CONFIG_PATH: &str = "config/libshare";

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Database connection settings for the checkpoint store and advisory
/// locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool: u32,
}

fn default_pool_size() -> u32 {
    5
}

/// Scheduler-wide settings applied to every trigger unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between trigger ticks.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// Master switch; when false no trigger is started.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_poll_interval_seconds() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
            enabled: default_enabled(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Top-level configuration for the broker core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl BrokerConfig {
    /// Load from the config file (if present) plus `LIBSHARE_*` environment
    /// overrides, then validate.
    pub fn load() -> Result<Self, ConfigurationError> {
        let path = std::env::var("LIBSHARE_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let config = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("LIBSHARE").separator("__"))
            .build()
            .map_err(|e| ConfigurationError::Load {
                message: e.to_string(),
            })?;

        let config: BrokerConfig =
            config
                .try_deserialize()
                .map_err(|e| ConfigurationError::Load {
                    message: e.to_string(),
                })?;

        config.validate()?;
        info!(
            poll_interval_seconds = config.scheduler.poll_interval_seconds,
            scheduler_enabled = config.scheduler.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.url.is_empty() {
            return Err(ConfigurationError::invalid(
                "database.url",
                "must not be empty",
            ));
        }
        if self.database.pool == 0 {
            return Err(ConfigurationError::invalid(
                "database.pool",
                "must be at least 1",
            ));
        }
        if self.scheduler.poll_interval_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "scheduler.poll_interval_seconds",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
