// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for sensord
//!
//! Console output is always installed. With the `file-logging` feature,
//! per-crate and combined log files are written with daily rotation and
//! retention cleanup.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::ObservabilityError;

#[cfg(feature = "file-logging")]
use std::path::{Path, PathBuf};

/// Parse a configured level name
pub fn parse_level(level: &str) -> std::result::Result<Level, ObservabilityError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ObservabilityError::InvalidLevel(level.to_string())),
    }
}

fn build_filter(debug_flags: &CrateDebugFlags, level: &str) -> Result<EnvFilter> {
    let base = parse_level(level)?;
    let filter = debug_flags.to_filter_string(&base.to_string());
    EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter))
}

/// Initialize console-only logging
///
/// # Errors
/// Fails when `level` is unknown or a global subscriber is already set.
pub fn init_console_logging(debug_flags: &CrateDebugFlags, level: &str) -> Result<()> {
    let env_filter = build_filter(debug_flags, level)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(debug_flags.any_enabled())
        .with_thread_names(true)
        .with_filter(env_filter);

    Registry::default()
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Logging initialization result
#[cfg(feature = "file-logging")]
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: PathBuf,
}

#[cfg(feature = "file-logging")]
impl LoggingGuard {
    /// Get the log directory path
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Initialize logging with file output and console output
///
/// Creates a timestamped folder structure:
/// ```text
/// <log_dir>/
///   └── run_20250101_120000/
///       ├── sensord-hub.log
///       ├── sensord-protocol.log
///       └── sensord.log (combined)
/// ```
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags for filtering
/// * `level` - Base level for everything not raised by a flag
/// * `log_dir` - Base directory for logs
/// * `retention_days` - Remove runs older than N days
/// * `retention_runs` - Keep N most recent runs
#[cfg(feature = "file-logging")]
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    level: &str,
    log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<LoggingGuard> {
    use tracing_appender::rolling;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = log_dir.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(log_dir, retention_days, retention_runs)?;

    let env_filter = build_filter(debug_flags, level)?;
    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_filter(env_filter.clone());
    layers.push(console_layer.boxed());

    // One file per crate, capturing that crate at debug
    for crate_name in crate::KNOWN_CRATES {
        let file_appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guards.push(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(EnvFilter::new(format!(
                "{}=debug",
                crate::crate_target(crate_name)
            )))
            .boxed();
        layers.push(file_layer);
    }

    let combined_appender = rolling::daily(&run_folder, "sensord.log");
    let (combined_non_blocking, combined_guard) = tracing_appender::non_blocking(combined_appender);
    let combined_layer = tracing_subscriber::fmt::layer()
        .with_writer(combined_non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(env_filter)
        .boxed();
    layers.push(combined_layer);
    file_guards.push(combined_guard);

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Clean up old log directories based on retention policy
#[cfg(feature = "file-logging")]
fn cleanup_old_logs(base_log_dir: &Path, retention_days: u64, retention_runs: usize) -> Result<()> {
    use chrono::{NaiveDateTime, Utc};

    if !base_log_dir.exists() {
        return Ok(());
    }

    let cutoff = Utc::now().naive_utc() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, NaiveDateTime)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("run_"))
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y%m%d_%H%M%S").ok());
        if let Some(dt) = stamp {
            runs.push((path, dt));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);

    let excess = runs.len().saturating_sub(retention_runs);
    for (index, (path, dt)) in runs.iter().enumerate() {
        if *dt < cutoff || index < excess {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!(
                    "Warning: Failed to remove old log directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("INFO").unwrap(), Level::INFO);
        assert_eq!(parse_level("warning").unwrap(), Level::WARN);
        assert!(matches!(
            parse_level("loud"),
            Err(ObservabilityError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_build_filter_rejects_unknown_level() {
        let flags = CrateDebugFlags::default();
        assert!(build_filter(&flags, "chatty").is_err());
        assert!(build_filter(&flags, "debug").is_ok());
    }

    #[cfg(feature = "file-logging")]
    #[test]
    fn test_cleanup_keeps_most_recent_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = chrono::Utc::now();
        for hours in 0..4 {
            let stamp = (now - chrono::Duration::hours(hours)).format("%Y%m%d_%H%M%S");
            std::fs::create_dir_all(dir.path().join(format!("run_{}", stamp))).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        cleanup_old_logs(dir.path(), 30, 2).unwrap();

        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("run_"))
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(dir.path().join("unrelated").exists());
    }
}
