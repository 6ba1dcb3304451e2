//! services/client/src/error.rs
//!
//! Defines the primary error type for the entire client service.

use crate::config::ConfigError;
use jobmail_core::ports::ApiError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Represents a standard Input/Output error (e.g., reading a file to upload).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
