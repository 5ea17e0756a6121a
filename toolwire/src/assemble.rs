//! Wiring from configuration to a serving session.

use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tool_adapters::http::{HttpJsonClient, HttpJsonConfig};
use tool_builtins::builtin_registry;
use tool_config::ToolwireConfig;
use tool_kernel::protocol::ServerInfo;
use tool_kernel::{SchedulerConfig, ServeOptions, TaskScheduler, ToolDispatcher, ToolServer};
use tool_registry::ToolError;

/// Errors raised while assembling a server.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A built-in tool could not be registered.
    #[error("failed to build tool registry: {0}")]
    Registry(#[from] ToolError),
    /// The tool listing could not be encoded.
    #[error("failed to encode tool listing: {0}")]
    Listing(#[from] serde_json::Error),
    /// `server.max_in_flight` was zero.
    #[error("server.max_in_flight must be at least 1")]
    ZeroConcurrency,
}

/// Builds the dispatcher for the built-in tools described by `config`.
///
/// # Errors
///
/// Returns [`BuildError`] when registration or listing encoding fails.
pub fn build_dispatcher(config: &ToolwireConfig) -> Result<ToolDispatcher, BuildError> {
    let http = HttpJsonConfig::new().with_timeout(config.remote_lookup.timeout());
    let fetcher = Arc::new(HttpJsonClient::new(&http));
    let registry = builtin_registry(fetcher, config.remote_lookup.url.clone())?;

    let info = ServerInfo::new(config.server.name.clone(), config.server.version.clone());
    let dispatcher = ToolDispatcher::new(Arc::new(registry), info)?
        .with_protocol_version(config.server.protocol_version.clone());
    Ok(dispatcher)
}

/// Builds a serving session for the built-in tools described by `config`.
///
/// # Errors
///
/// Returns [`BuildError`] when the dispatcher cannot be built or the
/// concurrency limit is zero.
pub fn build_server(config: &ToolwireConfig) -> Result<ToolServer<ToolDispatcher>, BuildError> {
    let dispatcher = build_dispatcher(config)?;
    let max_in_flight =
        NonZeroUsize::new(config.server.max_in_flight).ok_or(BuildError::ZeroConcurrency)?;
    let options = ServeOptions::default()
        .with_max_frame_bytes(config.server.max_frame_bytes)
        .with_shutdown_grace(config.server.shutdown_grace());

    Ok(ToolServer::new(
        Arc::new(dispatcher),
        TaskScheduler::new(SchedulerConfig::new(max_in_flight)),
        options,
    ))
}
