// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! consistent, within valid ranges, and don't conflict with each other.

use crate::{ConfigError, ConfigResult, HalConfig, SensordConfig, WaveformKind};
use std::collections::HashSet;

/// Maximum number of values a sensor sample can carry on the wire
const MAX_VALUE_COUNT: usize = 16;

/// Fastest and slowest poll intervals a client may request (ms)
const MIN_INTERVAL_MS: u32 = 10;
const MAX_INTERVAL_MS: u32 = 1000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    SocketConflict { path: String },
    DuplicateHal { name: String },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SocketConflict { path } => {
                write!(
                    f,
                    "Socket conflict: command and event channels both bind {}",
                    path
                )
            }
            Self::DuplicateHal { name } => {
                write!(f, "Duplicate HAL name: {}", name)
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Socket paths (present, distinct)
/// - Queue and polling ranges
/// - HAL entries (required fields, ranges, unique names)
/// - Virtual sensor calibration values
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &SensordConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_server(config, &mut errors);
    validate_value_ranges(config, &mut errors);
    validate_hals(&config.hals, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_server(config: &SensordConfig, errors: &mut Vec<ConfigValidationError>) {
    let server = &config.server;
    if server.command_socket.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "server.command_socket".to_string(),
        });
    }
    if server.event_socket.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "server.event_socket".to_string(),
        });
    }
    if !server.command_socket.as_os_str().is_empty() && server.command_socket == server.event_socket
    {
        errors.push(ConfigValidationError::SocketConflict {
            path: server.command_socket.display().to_string(),
        });
    }
    if server.socket_mode > 0o777 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "server.socket_mode".to_string(),
            reason: format!("{:o} is not a permission mode", server.socket_mode),
        });
    }
    if server.max_payload_bytes == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "server.max_payload_bytes".to_string(),
            reason: "must be positive".to_string(),
        });
    }
}

fn validate_value_ranges(config: &SensordConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.queue.capacity == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "queue.capacity".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    let interval = config.polling.default_interval_ms;
    if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "polling.default_interval_ms".to_string(),
            reason: format!(
                "must be between {} and {}",
                MIN_INTERVAL_MS, MAX_INTERVAL_MS
            ),
        });
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }

    let gyro_weight = config.virtual_sensors.fusion.gyro_weight;
    if !(0.0..=1.0).contains(&gyro_weight) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "virtual_sensors.fusion.gyro_weight".to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        });
    }

    let auto_rotation = &config.virtual_sensors.auto_rotation;
    if !(0.0..90.0).contains(&auto_rotation.flat_threshold_deg) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "virtual_sensors.auto_rotation.flat_threshold_deg".to_string(),
            reason: "must be in [0, 90)".to_string(),
        });
    }
    if !(0.0..45.0).contains(&auto_rotation.hysteresis_deg) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "virtual_sensors.auto_rotation.hysteresis_deg".to_string(),
            reason: "must be in [0, 45)".to_string(),
        });
    }
}

fn validate_hals(hals: &[HalConfig], errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();

    for (index, hal) in hals.iter().enumerate() {
        let prefix = format!("hal[{}]", index);

        if hal.sensor_type.is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("{}.sensor_type", prefix),
            });
        }
        if hal.name.is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("{}.name", prefix),
            });
        } else if !seen.insert(hal.name.as_str()) {
            errors.push(ConfigValidationError::DuplicateHal {
                name: hal.name.clone(),
            });
        }
        if hal.max_range < hal.min_range {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.max_range", prefix),
                reason: "must not be below min_range".to_string(),
            });
        }
        if hal.min_interval_ms == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.min_interval_ms", prefix),
                reason: "must be positive".to_string(),
            });
        }
        if hal.value_count == 0 || hal.value_count > MAX_VALUE_COUNT {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.value_count", prefix),
                reason: format!("must be between 1 and {}", MAX_VALUE_COUNT),
            });
        }
        if hal.waveform.values.len() > hal.value_count {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.waveform.values", prefix),
                reason: "has more entries than value_count".to_string(),
            });
        }
        if hal.waveform.kind == WaveformKind::Sine && hal.waveform.period_ms == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.waveform.period_ms", prefix),
                reason: "sine waveform needs a positive period".to_string(),
            });
        }
    }
}
