// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime settings the hub needs, extracted from the daemon configuration

use sensord_config::SensordConfig;
use sensord_protocol::{
    DEFAULT_COMMAND_SOCKET_PATH, DEFAULT_EVENT_SOCKET_PATH, SENSOR_INTERVAL_NORMAL_MS,
};
use std::path::PathBuf;

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub command_socket: PathBuf,
    pub event_socket: PathBuf,
    /// Unix mode applied to both socket files
    pub socket_mode: u32,
    pub max_payload_bytes: usize,
    /// Soft limit of the event queue (warning only)
    pub queue_capacity: usize,
    /// Poll interval used when no client registered one
    pub default_interval_ms: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_socket: PathBuf::from(DEFAULT_COMMAND_SOCKET_PATH),
            event_socket: PathBuf::from(DEFAULT_EVENT_SOCKET_PATH),
            socket_mode: 0o777,
            max_payload_bytes: 64 * 1024,
            queue_capacity: 1000,
            default_interval_ms: SENSOR_INTERVAL_NORMAL_MS,
        }
    }
}

impl HubConfig {
    pub fn from_config(config: &SensordConfig) -> Self {
        Self {
            command_socket: config.server.command_socket.clone(),
            event_socket: config.server.event_socket.clone(),
            socket_mode: config.server.socket_mode,
            max_payload_bytes: config.server.max_payload_bytes,
            queue_capacity: config.queue.capacity,
            default_interval_ms: config.polling.default_interval_ms,
        }
    }
}
