//! Configuration for the toolwire server.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Environment overrides are applied after loading and before
//! validation.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{
    ENV_LOG_LEVEL, ENV_MAX_IN_FLIGHT, ENV_REMOTE_URL, load, load_or_default, load_with_env,
};
pub use schema::{LoggingConfig, RemoteLookupConfig, ServerConfig, ToolwireConfig};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A value is out of range or malformed.
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Creates a validation error for `field`.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
