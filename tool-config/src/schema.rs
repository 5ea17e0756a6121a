//! Strongly typed configuration schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolwireConfig {
    /// Session and framing settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Settings for the `remote_lookup` tool.
    #[serde(default)]
    pub remote_lookup: RemoteLookupConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ToolwireConfig {
    /// Checks value ranges and formats.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.remote_lookup.validate()?;
        self.logging.validate()
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name reported in `serverInfo`.
    #[serde(default = "default_name")]
    pub name: String,
    /// Version reported in `serverInfo`.
    #[serde(default = "default_version")]
    pub version: String,
    /// Protocol version reported when the client does not request one.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Upper bound on concurrently executing requests.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// How long in-flight requests may run after input closes.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Largest accepted inbound frame, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl ServerConfig {
    /// Returns the shutdown grace period as a [`Duration`].
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("server.name", "must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError::invalid("server.version", "must not be empty"));
        }
        if self.protocol_version.trim().is_empty() {
            return Err(ConfigError::invalid(
                "server.protocol_version",
                "must not be empty",
            ));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::invalid("server.max_in_flight", "must be at least 1"));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::invalid("server.max_frame_bytes", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            protocol_version: default_protocol_version(),
            max_in_flight: default_max_in_flight(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// `[remote_lookup]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteLookupConfig {
    /// Endpoint fetched on every invocation.
    #[serde(default = "default_remote_url")]
    pub url: String,
    /// Timeout covering connect, request and body.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RemoteLookupConfig {
    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        let url = self.url.trim();
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(ConfigError::invalid(
                    "remote_lookup.url",
                    format!("`{}` must be an http:// or https:// URL", self.url),
                ));
            }
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("remote_lookup.timeout_ms", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for RemoteLookupConfig {
    fn default() -> Self {
        Self {
            url: default_remote_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON records instead of text.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// --- Defaults ---

fn default_name() -> String {
    "toolwire".into()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}
fn default_protocol_version() -> String {
    "2024-11-05".into()
}
fn default_max_in_flight() -> usize {
    32
}
fn default_shutdown_grace_ms() -> u64 {
    2000
}
fn default_max_frame_bytes() -> usize {
    1_048_576
}
fn default_remote_url() -> String {
    "https://httpbin.org/json".into()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: ToolwireConfig = toml::from_str("").unwrap();
        assert_eq!(config, ToolwireConfig::default());
        assert_eq!(config.server.max_in_flight, 32);
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(2));
        assert_eq!(config.remote_lookup.url, "https://httpbin.org/json");
        assert_eq!(config.remote_lookup.timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ToolwireConfig = toml::from_str(
            r#"
            [server]
            max_in_flight = 4

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server.max_in_flight, 4);
        assert_eq!(config.server.name, "toolwire");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<ToolwireConfig, _> = toml::from_str("[server]\nport = 80\n");
        assert!(result.is_err());
    }

    #[test]
    fn validation_names_the_field() {
        let mut config = ToolwireConfig::default();
        config.server.max_in_flight = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "server.max_in_flight", .. }));

        let mut config = ToolwireConfig::default();
        config.server.max_frame_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = ToolwireConfig::default();
        config.server.name = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_url_requires_http_scheme() {
        for url in ["ftp://example.com", "example.com/json", "https://", ""] {
            let mut config = ToolwireConfig::default();
            config.remote_lookup.url = url.into();
            let err = config.validate().expect_err(url);
            assert!(matches!(err, ConfigError::Invalid { field: "remote_lookup.url", .. }));
        }

        let mut config = ToolwireConfig::default();
        config.remote_lookup.url = "http://127.0.0.1:8080/json".into();
        assert!(config.validate().is_ok());
    }
}
