//! Observability utilities for toolwire.
//!
//! Logs always go to stderr: stdout carries protocol frames.

#![warn(missing_docs, clippy::pedantic)]

use thiserror::Error;
use tool_primitives::{RequestId, SessionId};
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Level used when neither `RUST_LOG` nor configuration says otherwise.
pub const DEFAULT_LEVEL: &str = "info";

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingOptions {
    level: String,
    json: bool,
}

impl TracingOptions {
    /// Creates options with the given fallback filter directive.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            json: false,
        }
    }

    /// Switches output to newline-delimited JSON records.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Returns the fallback filter directive.
    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Returns `true` when JSON output is enabled.
    #[must_use]
    pub const fn json(&self) -> bool {
        self.json
    }

    /// Builds the filter: `RUST_LOG` wins, then the configured level.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidFilter`] when the configured level is
    /// not a valid filter directive.
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|err| TelemetryError::InvalidFilter {
            directive: self.level.clone(),
            reason: err.to_string(),
        })
    }
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level directive could not be parsed.
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter {
        /// Directive as configured.
        directive: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {reason}")]
    Install {
        /// Underlying error.
        reason: String,
    },
}

/// Installs the global subscriber writing to stderr.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(options: &TracingOptions) -> Result<(), TelemetryError> {
    let filter = options.env_filter()?;
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = if options.json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    installed.map_err(|err| TelemetryError::Install {
        reason: err.to_string(),
    })
}

/// Span wrapping the handling of one request.
#[must_use]
pub fn request_span(session_id: &SessionId, request_id: &RequestId, method: &str) -> Span {
    tracing::info_span!(
        "request",
        session_id = %session_id,
        request_id = %request_id,
        method = %method,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info_text() {
        let options = TracingOptions::default();
        assert_eq!(options.level(), "info");
        assert!(!options.json());
        assert!(options.with_json(true).json());
    }

    #[test]
    fn configured_level_applies_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_none() {
            let filter = TracingOptions::new("debug").env_filter().unwrap();
            assert_eq!(filter.max_level_hint(), Some(tracing::level_filters::LevelFilter::DEBUG));
        }
    }
}
