//! Line-delimited JSON-RPC tool server SDK facade.
//!
//! Bundles the workspace crates behind feature flags. With the default
//! features, [`build_server`] turns a [`config::ToolwireConfig`] into a ready
//! [`kernel::ToolServer`] serving the built-in tools.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use tool_primitives as primitives;

/// Tool descriptors, schemas and the registry.
pub use tool_registry as registry;

/// Wire codec, dispatcher and serve loop (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use tool_kernel as kernel;

/// Outbound HTTP adapters (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use tool_adapters as adapters;

/// Built-in tools (enabled by `builtins` feature).
#[cfg(feature = "builtins")]
pub use tool_builtins as builtins;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use tool_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use tool_config as config;

#[cfg(all(feature = "kernel", feature = "builtins", feature = "config"))]
mod assemble;

#[cfg(all(feature = "kernel", feature = "builtins", feature = "config"))]
pub use assemble::{BuildError, build_dispatcher, build_server};
