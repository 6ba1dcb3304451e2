//! services/client/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Every key has a working default, so a
//! bare environment points the client at a local backend.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the remote API, without a trailing slash.
    pub api_base_url: String,
    /// The single uniform timeout applied to every outgoing request.
    pub request_timeout: Duration,
    /// Location of the one durable file holding the bearer credential.
    pub credential_path: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup, so tests
    /// can exercise the parsing without mutating the process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000/api/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let timeout_str = lookup("REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "30".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                format!("'{}' is not a number of seconds", timeout_str),
            )
        })?;

        let credential_path = lookup("CREDENTIAL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".jobmail/credential"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            credential_path,
            log_level,
        })
    }
}
