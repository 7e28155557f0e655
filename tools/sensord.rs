// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! sensord daemon
//!
//! Loads `sensord.toml`, installs logging, registers the simulated HALs and
//! virtual sensors, then serves both sockets until the process is killed.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use tracing::{info, warn};

use sensord::config::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    validate_config, SensordConfig,
};
use sensord::hub::{BuiltinPluginLoader, SensorHub};
use sensord::observability::{debug_flags_help, parse_debug_flags};

/// sensord - sensor daemon serving events over Unix domain sockets
///
/// Without --config the file is searched at $SENSORD_CONFIG_PATH,
/// ./sensord.toml and /etc/sensord/sensord.toml; built-in defaults are used
/// if none exists.
#[derive(Parser, Debug)]
#[command(name = "sensord", version, author)]
struct Args {
    /// Configuration file; must exist when given
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path of the command socket
    #[arg(long)]
    command_socket: Option<PathBuf>,

    /// Path of the event socket
    #[arg(long)]
    event_socket: Option<PathBuf>,

    /// Soft limit of the event queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Polling interval used when no client asked for one
    #[arg(long)]
    default_interval_ms: Option<u32>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,

    /// Write rolling log files under this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Grant BIO permission to every client
    #[arg(long, default_value_t = false)]
    grant_all_bio: bool,
}

impl Args {
    /// Parse `argv`; `--debug-*` flags belong to the logging setup and are
    /// left out here
    fn parse_from_env<I>(argv: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let argv: Vec<String> = argv
            .into_iter()
            .filter(|arg| !arg.starts_with("--debug-"))
            .collect();
        let matches = Self::command()
            .after_help(debug_flags_help())
            .get_matches_from(argv);
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    /// Overrides in the form `apply_cli_overrides` understands
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(path) = &self.command_socket {
            overrides.insert("command_socket".to_string(), path.display().to_string());
        }
        if let Some(path) = &self.event_socket {
            overrides.insert("event_socket".to_string(), path.display().to_string());
        }
        if let Some(capacity) = self.queue_capacity {
            overrides.insert("queue_capacity".to_string(), capacity.to_string());
        }
        if let Some(interval) = self.default_interval_ms {
            overrides.insert("default_interval_ms".to_string(), interval.to_string());
        }
        if let Some(level) = &self.log_level {
            overrides.insert("log_level".to_string(), level.clone());
        }
        if let Some(path) = &self.log_dir {
            overrides.insert("log_dir".to_string(), path.display().to_string());
        }
        if self.grant_all_bio {
            overrides.insert("grant_all_bio".to_string(), "true".to_string());
        }
        overrides
    }
}

/// An explicit `--config` must exist; a missing discovered file falls back to defaults
fn resolve_config(args: &Args) -> Result<(SensordConfig, Option<PathBuf>)> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => find_config_file().ok(),
    };
    let overrides = args.overrides();

    let config = match &path {
        Some(path) => load_config(Some(path), Some(&overrides))
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let mut config = SensordConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, &overrides);
            config
        }
    };
    validate_config(&config).context("Invalid configuration")?;
    Ok((config, path))
}

fn main() -> Result<()> {
    let args = Args::parse_from_env(env::args());
    let (config, config_path) = resolve_config(&args)?;
    let debug_flags = parse_debug_flags();

    #[cfg(feature = "file-logging")]
    let _log_guard = match &config.logging.log_dir {
        Some(log_dir) => Some(sensord::observability::init_logging(
            &debug_flags,
            &config.logging.level,
            log_dir,
            config.logging.retention_days,
            config.logging.retention_runs,
        )?),
        None => {
            sensord::observability::init_console_logging(&debug_flags, &config.logging.level)?;
            None
        }
    };
    #[cfg(not(feature = "file-logging"))]
    sensord::observability::init_console_logging(&debug_flags, &config.logging.level)?;

    info!("🦀 [SENSORD] sensord v{} starting", sensord::VERSION);
    match &config_path {
        Some(path) => info!("🦀 [SENSORD] Configuration: {}", path.display()),
        None => warn!("🦀 [SENSORD] ⚠️ No configuration file found, using defaults"),
    }
    #[cfg(feature = "file-logging")]
    if let Some(guard) = &_log_guard {
        info!("🦀 [SENSORD] Writing logs to {}", guard.log_dir().display());
    }

    let hub = SensorHub::from_config(&config);
    let report = hub.load_plugins(&BuiltinPluginLoader::new(&config));
    if report.physical_sensors == 0 {
        warn!("🦀 [SENSORD] ⚠️ No physical sensors loaded; only the sockets will be served");
    }
    hub.start().context("Failed to start sensor hub")?;
    info!("🦀 [SENSORD] ✅ Ready");

    // All work happens on the hub's threads
    loop {
        thread::park();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("sensord")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_become_config_overrides() {
        let args = Args::parse_from_env(argv(&[
            "--config",
            "/etc/sensord/custom.toml",
            "--command-socket",
            "/run/sensord/cmd",
            "--log-level",
            "debug",
            "--grant-all-bio",
        ]));
        assert_eq!(args.config, Some(PathBuf::from("/etc/sensord/custom.toml")));

        let overrides = args.overrides();
        assert_eq!(overrides["command_socket"], "/run/sensord/cmd");
        assert_eq!(overrides["log_level"], "debug");
        assert_eq!(overrides["grant_all_bio"], "true");
        assert!(!overrides.contains_key("event_socket"));

        let mut config = SensordConfig::default();
        apply_cli_overrides(&mut config, &overrides);
        assert_eq!(config.server.command_socket, PathBuf::from("/run/sensord/cmd"));
        assert!(config.permissions.grant_all_bio);
    }

    #[test]
    fn test_debug_flags_are_left_to_logging() {
        let args = Args::parse_from_env(argv(&["--debug-sensord-hub", "--queue-capacity", "64"]));
        assert_eq!(args.queue_capacity, Some(64));
        assert!(!args.grant_all_bio);
        assert_eq!(args.overrides().len(), 1);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let result = Args::try_parse_from(argv(&["--no-such-flag"]));
        assert!(result.is_err());
    }
}
