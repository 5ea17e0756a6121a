//! Shared error definitions for toolwire primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the tool server.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided session identifier could not be parsed.
    #[error("invalid session id: {source}")]
    InvalidSessionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Tool name failed validation.
    #[error("invalid tool name `{name}`: {reason}")]
    InvalidToolName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
