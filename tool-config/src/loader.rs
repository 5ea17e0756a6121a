//! Configuration loaders: TOML files plus environment overrides.

use std::path::Path;

use tracing::{debug, warn};

use crate::schema::ToolwireConfig;
use crate::{ConfigError, ConfigResult};

/// Overrides `remote_lookup.url`.
pub const ENV_REMOTE_URL: &str = "TOOLWIRE_REMOTE_URL";
/// Overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "TOOLWIRE_LOG_LEVEL";
/// Overrides `server.max_in_flight`.
pub const ENV_MAX_IN_FLIGHT: &str = "TOOLWIRE_MAX_IN_FLIGHT";

/// Reads and parses a TOML file without applying overrides or validation.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
pub fn load(path: &Path) -> ConfigResult<ToolwireConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration file");
    Ok(config)
}

/// Loads `path` if given (defaults otherwise), applies process environment
/// overrides and validates the result.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be loaded, an override is
/// malformed, or the final configuration is invalid.
pub fn load_or_default(path: Option<&Path>) -> ConfigResult<ToolwireConfig> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_or_default`], but reads overrides through `lookup` instead of
/// the process environment.
///
/// # Errors
///
/// Same as [`load_or_default`].
pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> ConfigResult<ToolwireConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load(path)?,
        None => ToolwireConfig::default(),
    };
    config.apply_env(lookup)?;
    config.validate()?;
    Ok(config)
}

impl ToolwireConfig {
    /// Applies overrides from `lookup`, normally the process environment.
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an override cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_REMOTE_URL) {
            debug!(key = ENV_REMOTE_URL, "applying environment override");
            self.remote_lookup.url = url;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            debug!(key = ENV_LOG_LEVEL, "applying environment override");
            self.logging.level = level;
        }
        if let Some(raw) = get(ENV_MAX_IN_FLIGHT) {
            let parsed = raw.trim().parse::<usize>().map_err(|err| {
                warn!(key = ENV_MAX_IN_FLIGHT, value = %raw, "rejecting environment override");
                ConfigError::invalid("server.max_in_flight", format!("`{raw}` from {ENV_MAX_IN_FLIGHT}: {err}"))
            })?;
            self.server.max_in_flight = parsed;
        }
        Ok(())
    }
}
