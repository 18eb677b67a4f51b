use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid requests_per_second: {0}. Must be at least 1")]
    InvalidRequestsPerSecond(u32),

    #[error("Invalid {0}: must be positive")]
    ZeroTimeout(&'static str),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".questbuddy";

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "QUESTBUDDY_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the working directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .questbuddy/config.yaml
    /// 3. .questbuddy/local.yaml (optional local overrides)
    /// 4. Environment variables (QUESTBUDDY_* prefix)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], rooted at `root` instead of the
    /// working directory.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.github.requests_per_second == 0 {
            return Err(ConfigError::InvalidRequestsPerSecond(0));
        }

        if config.github.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("github.request_timeout_secs"));
        }

        if config.oracle.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("oracle.timeout_secs"));
        }

        if config.catalog_path.as_deref() == Some("") {
            return Err(ConfigError::ValidationFailed(
                "catalog_path cannot be empty when set".to_string(),
            ));
        }

        if config.github.api_base_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "github.api_base_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
