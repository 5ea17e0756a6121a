//! `toolwire`: serves the built-in tools as line-delimited JSON-RPC over
//! stdin/stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use toolwire::config::{self, ToolwireConfig};
use toolwire::telemetry::{self, TracingOptions};
use tracing::{error, info, warn};

/// Line-delimited JSON-RPC tool server
#[derive(Parser, Debug)]
#[command(name = "toolwire", author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve over stdin/stdout (the default)
    Serve,
    /// Print the tool listing as JSON and exit
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    telemetry::init(
        &TracingOptions::new(config.logging.level.clone()).with_json(config.logging.json),
    )?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Tools => print_tools(&config),
        Command::Serve => serve(&config).await,
    }
}

fn resolve_config(cli: &Cli) -> Result<ToolwireConfig> {
    resolve_config_with(cli, |key| std::env::var(key).ok())
}

/// Config file, then environment overrides via `lookup`, then CLI flags.
fn resolve_config_with<F>(cli: &Cli, lookup: F) -> Result<ToolwireConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = config::load_with_env(cli.config.as_deref(), lookup)
        .context("failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    Ok(config)
}

fn print_tools(config: &ToolwireConfig) -> Result<()> {
    let dispatcher = toolwire::build_dispatcher(config)?;
    let listing = serde_json::to_string_pretty(dispatcher.listing())?;
    println!("{listing}");
    Ok(())
}

async fn serve(config: &ToolwireConfig) -> Result<()> {
    let mut server = toolwire::build_server(config)?;
    info!(
        session_id = %server.session_id(),
        name = %config.server.name,
        version = %config.server.version,
        max_in_flight = config.server.max_in_flight,
        remote_url = %config.remote_lookup.url,
        "serving on stdio"
    );

    let summary = server
        .serve_until(tokio::io::stdin(), tokio::io::stdout(), interrupted())
        .await
        .context("session failed")?;
    if summary.interrupted {
        warn!(?summary, "interrupted; in-flight requests dropped");
    } else {
        info!(?summary, "input closed; exiting");
    }
    Ok(())
}

/// Resolves on ctrl-c. If the handler cannot be installed the session runs
/// until input closes.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["toolwire"]).unwrap();
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from(["toolwire", "--log-level", "debug", "--json-logs", "tools"])
            .unwrap();
        assert_eq!(cli.command, Some(Command::Tools));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.json_logs);
    }

    fn no_env(_key: &str) -> Option<String> {
        None
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from(["toolwire", "--log-level", "trace", "--json-logs"]).unwrap();
        let config = resolve_config_with(&cli, no_env).unwrap();
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json);
    }

    #[test]
    fn flags_beat_environment_overrides() {
        let env = |key: &str| match key {
            config::ENV_LOG_LEVEL => Some("warn".to_owned()),
            config::ENV_MAX_IN_FLIGHT => Some("3".to_owned()),
            _ => None,
        };

        let cli = Cli::try_parse_from(["toolwire"]).unwrap();
        let config = resolve_config_with(&cli, env).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.server.max_in_flight, 3);

        let cli = Cli::try_parse_from(["toolwire", "--log-level", "debug"]).unwrap();
        let config = resolve_config_with(&cli, env).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn malformed_environment_is_reported() {
        let cli = Cli::try_parse_from(["toolwire"]).unwrap();
        let env = |key: &str| (key == config::ENV_MAX_IN_FLIGHT).then(|| "many".to_owned());
        assert!(resolve_config_with(&cli, env).is_err());
    }
}
