//! Shared adapter traits and error types.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Result alias used by service adapters.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Error type shared by adapter implementations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Adapter is misconfigured (bad endpoint, unusable client settings).
    #[error("adapter not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// Transport-level failures (connect, TLS, timeout, truncated body).
    #[error("adapter transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The remote service answered with a non-success status.
    #[error("remote returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The remote service returned a body that could not be decoded.
    #[error("adapter response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl AdapterError {
    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for undecodable responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// Fetches JSON documents from an external service.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// Issues a GET for `uri` and decodes the body as JSON.
    ///
    /// Implementations must treat any non-success status as an error.
    async fn get_json(&self, uri: &str) -> AdapterResult<Value>;
}
