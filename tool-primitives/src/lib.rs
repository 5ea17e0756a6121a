//! Core shared types for the toolwire tool server.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod name;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Correlation and session identifiers.
pub use ids::{RequestId, SessionId};
/// Validated tool identifiers.
pub use name::ToolName;
