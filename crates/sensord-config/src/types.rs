// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `sensord.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SensordConfig {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub polling: PollingConfig,
    pub permissions: PermissionsConfig,
    pub logging: LoggingConfig,
    /// One entry per `[[hal]]` table
    #[serde(rename = "hal")]
    pub hals: Vec<HalConfig>,
    pub virtual_sensors: VirtualSensorsConfig,
}

/// IPC endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub command_socket: PathBuf,
    pub event_socket: PathBuf,
    /// Permission bits applied to both socket files after bind
    pub socket_mode: u32,
    /// Largest command payload accepted before the session is dropped
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command_socket: PathBuf::from("/tmp/sensord_command_socket"),
            event_socket: PathBuf::from("/tmp/sensord_event_socket"),
            socket_mode: 0o777,
            max_payload_bytes: 64 * 1024,
        }
    }
}

/// Event queue sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Soft limit; pushes beyond it are logged, never dropped
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Poll interval policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval used when no client has requested one (ms)
    pub default_interval_ms: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 1000,
        }
    }
}

/// Privilege grants
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Grant the BIO permission to every client (development only)
    pub grant_all_bio: bool,
    /// Process ids granted the BIO permission
    pub bio_pids: Vec<i32>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, logs are also written to rolling files under this directory
    pub log_dir: Option<PathBuf>,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            retention_days: 7,
            retention_runs: 10,
        }
    }
}

/// Sample source for a simulated HAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    /// Repeats `values` every interval
    Constant,
    /// `values[i] + amplitude * sin(2*pi*t/period)` on every axis
    Sine,
    /// Only emits samples injected at runtime
    Injected,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub kind: WaveformKind,
    pub values: Vec<f32>,
    pub amplitude: f32,
    pub period_ms: u32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            kind: WaveformKind::Constant,
            values: Vec::new(),
            amplitude: 0.0,
            period_ms: 1000,
        }
    }
}

/// One hardware abstraction layer instance
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HalConfig {
    /// Sensor type name, e.g. `accelerometer`, `gyroscope`, `geomagnetic`
    pub sensor_type: String,
    pub name: String,
    pub vendor: String,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
    /// Fastest interval the device supports (ms)
    pub min_interval_ms: u32,
    pub fifo_count: u32,
    pub max_batch_count: u32,
    /// Multiplier applied to raw device values to reach reporting units
    pub raw_scale: f32,
    pub value_count: usize,
    pub waveform: WaveformConfig,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            sensor_type: String::new(),
            name: String::new(),
            vendor: "sensord".to_string(),
            min_range: 0.0,
            max_range: 0.0,
            resolution: 0.0,
            min_interval_ms: 10,
            fifo_count: 0,
            max_batch_count: 0,
            raw_scale: 1.0,
            value_count: 3,
            waveform: WaveformConfig::default(),
        }
    }
}

/// Calibration and enablement of the composed sensors
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VirtualSensorsConfig {
    pub fusion: FusionConfig,
    pub orientation: OrientationConfig,
    pub gravity: GravityConfig,
    pub linear_accel: LinearAccelConfig,
    pub rotation_vector: RotationVectorConfig,
    pub auto_rotation: AutoRotationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FusionConfig {
    pub enabled: bool,
    /// Complementary filter weight given to the integrated gyroscope estimate
    pub gyro_weight: f32,
    pub use_magnetometer: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gyro_weight: 0.98,
            use_magnetometer: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrientationConfig {
    pub enabled: bool,
    pub azimuth_offset_deg: f32,
    pub azimuth_reversed: bool,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            azimuth_offset_deg: 0.0,
            azimuth_reversed: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GravityConfig {
    pub enabled: bool,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinearAccelConfig {
    pub enabled: bool,
}

impl Default for LinearAccelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RotationVectorConfig {
    pub enabled: bool,
}

impl Default for RotationVectorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoRotationConfig {
    pub enabled: bool,
    /// Tilt from horizontal (deg) below which the device counts as lying flat
    pub flat_threshold_deg: f32,
    /// Extra angle (deg) past the 45 degree boundary before switching state
    pub hysteresis_deg: f32,
}

impl Default for AutoRotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flat_threshold_deg: 25.0,
            hysteresis_deg: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_tables_parse() {
        let config: SensordConfig = toml::from_str(
            r#"
            [[hal]]
            sensor_type = "accelerometer"
            name = "sim-accel"
            max_range = 19.6
            min_range = -19.6
            raw_scale = 9.80665

            [hal.waveform]
            kind = "sine"
            values = [0.0, 0.0, 1.0]
            amplitude = 0.1

            [[hal]]
            sensor_type = "gyroscope"
            name = "sim-gyro"
            "#,
        )
        .unwrap();

        assert_eq!(config.hals.len(), 2);
        assert_eq!(config.hals[0].waveform.kind, WaveformKind::Sine);
        assert_eq!(config.hals[0].value_count, 3);
        assert_eq!(config.hals[1].vendor, "sensord");
        assert_eq!(config.hals[1].waveform.kind, WaveformKind::Constant);
    }

    #[test]
    fn test_virtual_sensor_defaults() {
        let config: SensordConfig = toml::from_str(
            r#"
            [virtual_sensors.gravity]
            enabled = false
            "#,
        )
        .unwrap();

        assert!(!config.virtual_sensors.gravity.enabled);
        assert!(config.virtual_sensors.fusion.enabled);
        assert!((config.virtual_sensors.fusion.gyro_weight - 0.98).abs() < f32::EPSILON);
    }
}
