#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for the CMH deadlock simulator
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/cmh/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;
pub mod sections;

pub use sections::{DetectionConfig, SimulationConfig, TimingConfig};

use cmh_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub detection: DetectionConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::CONFIG_DIR_NAME)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        tracing::debug!(path = %path.display(), "loaded configuration file");
        toml::from_str::<Self>(&contents)
            .map_err(ConfigError::from)
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let Ok(config_path) = Self::default_path() else {
            return Ok(Self::default());
        };

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Some(value) = env_parse::<usize>("CMH_NUM_PROCESSES")? {
            self.simulation.num_processes = value;
        }

        if let Some(value) = env_parse::<usize>("CMH_NUM_RESOURCES")? {
            self.simulation.num_resources = value;
        }

        if let Some(value) = env_parse::<u64>("CMH_REQUEST_TIMEOUT_MS")? {
            self.timing.request_timeout_ms = value;
        }

        if let Some(value) = env_parse::<u64>("CMH_RUN_DURATION_SECS")? {
            self.simulation.run_duration_secs = value;
        }

        if let Some(value) = env_parse::<u64>("CMH_SEED")? {
            self.simulation.seed = Some(value);
        }

        Ok(())
    }

    /// Check the settings a run cannot start without
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when there are no processes, no
    /// resources, a zero request timeout, or a zero run duration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.simulation.num_processes < 1 {
            return Err(ConfigError::invalid("num_processes", "must be at least 1").into());
        }
        if self.simulation.num_resources < 1 {
            return Err(ConfigError::invalid("num_resources", "must be at least 1").into());
        }
        if self.timing.request_timeout_ms == 0 {
            return Err(
                ConfigError::invalid("request_timeout_ms", "must be greater than zero").into(),
            );
        }
        if self.simulation.run_duration_secs == 0 {
            return Err(
                ConfigError::invalid("run_duration_secs", "must be greater than zero").into(),
            );
        }
        Ok(())
    }

    /// Lease of a single detection run
    ///
    /// Capped at the request timeout: a run whose probe has not come back
    /// by the owner's next timeout has expired.
    #[must_use]
    pub fn detection_lease(&self) -> Duration {
        self.detection.lease().min(self.timing.request_timeout())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>, Error> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: var.to_string(),
                value: raw,
            }
            .into()),
        Err(_) => Ok(None),
    }
}
