// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SensordConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default file name searched for in the working directory
pub const CONFIG_FILE_NAME: &str = "sensord.toml";

/// System-wide configuration location
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sensord/sensord.toml";

/// Find the sensord configuration file
///
/// Search order:
/// 1. `SENSORD_CONFIG_PATH` environment variable
/// 2. Current working directory: `./sensord.toml`
/// 3. `/etc/sensord/sensord.toml`
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SENSORD_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SENSORD_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
    }
    search_paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "sensord configuration file '{}' not found in any of these locations:\n{}\n\nSet SENSORD_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Validation is left to [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SensordConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SensordConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SENSORD_COMMAND_SOCKET` -> `server.command_socket`
/// - `SENSORD_EVENT_SOCKET` -> `server.event_socket`
/// - `SENSORD_QUEUE_CAPACITY` -> `queue.capacity`
/// - `SENSORD_DEFAULT_INTERVAL_MS` -> `polling.default_interval_ms`
/// - `SENSORD_LOG_LEVEL` -> `logging.level`
/// - `SENSORD_LOG_DIR` -> `logging.log_dir`
/// - `SENSORD_GRANT_ALL_BIO` -> `permissions.grant_all_bio`
pub fn apply_environment_overrides(config: &mut SensordConfig) {
    if let Ok(value) = env::var("SENSORD_COMMAND_SOCKET") {
        config.server.command_socket = PathBuf::from(value);
    }
    if let Ok(value) = env::var("SENSORD_EVENT_SOCKET") {
        config.server.event_socket = PathBuf::from(value);
    }
    if let Ok(value) = env::var("SENSORD_QUEUE_CAPACITY") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.queue.capacity = capacity;
        }
    }
    if let Ok(value) = env::var("SENSORD_DEFAULT_INTERVAL_MS") {
        if let Ok(interval) = value.parse::<u32>() {
            config.polling.default_interval_ms = interval;
        }
    }
    if let Ok(value) = env::var("SENSORD_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("SENSORD_LOG_DIR") {
        config.logging.log_dir = Some(PathBuf::from(value));
    }
    if let Ok(value) = env::var("SENSORD_GRANT_ALL_BIO") {
        config.permissions.grant_all_bio = parse_bool(&value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"command_socket": "/run/sensord.sock"}`)
pub fn apply_cli_overrides(config: &mut SensordConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("command_socket") {
        config.server.command_socket = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("event_socket") {
        config.server.event_socket = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("queue_capacity") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.queue.capacity = capacity;
        }
    }
    if let Some(value) = cli_args.get("default_interval_ms") {
        if let Ok(interval) = value.parse::<u32>() {
            config.polling.default_interval_ms = interval;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_dir") {
        config.logging.log_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = cli_args.get("grant_all_bio") {
        config.permissions.grant_all_bio = parse_bool(value);
    }
}

fn parse_bool(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered == "true" || lowered == "1" || lowered == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_sensord.toml");
        File::create(&config_path).unwrap();

        env::set_var("SENSORD_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("SENSORD_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("SENSORD_CONFIG_PATH", "/nonexistent/sensord.toml");
        let result = find_config_file();
        env::remove_var("SENSORD_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("SENSORD_QUEUE_CAPACITY");
        env::remove_var("SENSORD_COMMAND_SOCKET");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "command_socket = \"/run/sensord/cmd\"").unwrap();
        writeln!(file, "[queue]").unwrap();
        writeln!(file, "capacity = 250").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.server.command_socket, PathBuf::from("/run/sensord/cmd"));
        assert_eq!(
            config.server.event_socket,
            PathBuf::from("/tmp/sensord_event_socket")
        );
        assert_eq!(config.queue.capacity, 250);
        assert_eq!(config.polling.default_interval_ms, 1000);
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = SensordConfig::default();

        env::set_var("SENSORD_EVENT_SOCKET", "/run/sensord/evt");
        env::set_var("SENSORD_QUEUE_CAPACITY", "64");
        env::set_var("SENSORD_GRANT_ALL_BIO", "yes");

        apply_environment_overrides(&mut config);

        env::remove_var("SENSORD_EVENT_SOCKET");
        env::remove_var("SENSORD_QUEUE_CAPACITY");
        env::remove_var("SENSORD_GRANT_ALL_BIO");

        assert_eq!(config.server.event_socket, PathBuf::from("/run/sensord/evt"));
        assert_eq!(config.queue.capacity, 64);
        assert!(config.permissions.grant_all_bio);
    }

    #[test]
    fn test_unparseable_environment_value_is_ignored() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = SensordConfig::default();

        env::set_var("SENSORD_QUEUE_CAPACITY", "lots");
        apply_environment_overrides(&mut config);
        env::remove_var("SENSORD_QUEUE_CAPACITY");

        assert_eq!(config.queue.capacity, 1000);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "level = \"warn\"").unwrap();
        writeln!(file, "[polling]").unwrap();
        writeln!(file, "default_interval_ms = 500").unwrap();

        env::set_var("SENSORD_LOG_LEVEL", "debug");
        env::set_var("SENSORD_DEFAULT_INTERVAL_MS", "200");

        let mut cli_args = HashMap::new();
        cli_args.insert("log_level".to_string(), "trace".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("SENSORD_LOG_LEVEL");
        env::remove_var("SENSORD_DEFAULT_INTERVAL_MS");

        // CLI wins for level, env wins for interval (no CLI override)
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.polling.default_interval_ms, 200);
    }
}
