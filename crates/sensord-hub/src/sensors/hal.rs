// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hardware abstraction boundary
//!
//! Device backends (IIO, input-event nodes, vendor hubs) live behind
//! [`SensorHal`]. The hub only needs the capability set below.

use crate::core::{HubError, Result};
use sensord_protocol::SensorType;
use std::sync::Arc;
use std::time::Duration;

/// Static properties reported by a HAL
#[derive(Debug, Clone, PartialEq)]
pub struct HalProperties {
    pub sensor_type: SensorType,
    pub name: String,
    pub vendor: String,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
    pub min_interval_ms: u32,
    pub fifo_count: u32,
    pub max_batch_count: u32,
    /// Factor converting raw device units into reported units
    pub raw_scale: f32,
    pub value_count: usize,
}

/// One unconverted reading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSample {
    pub timestamp: u64,
    pub accuracy: i32,
    pub values: Vec<f32>,
    /// Opaque payload of sensorhub-controlled devices
    pub hub_data: Vec<u8>,
}

pub trait SensorHal: Send + Sync {
    fn init(&self) -> Result<()>;

    fn get_properties(&self) -> HalProperties;

    fn enable(&self) -> Result<()>;

    fn disable(&self) -> Result<()>;

    fn set_interval(&self, interval_ms: u32) -> Result<()>;

    /// Wait up to `timeout` for a sample; `Ok(false)` on timeout
    fn is_data_ready(&self, timeout: Duration) -> Result<bool>;

    /// Fetch the sample announced by `is_data_ready`
    fn get_sensor_data(&self) -> Result<RawSample>;

    fn set_command(&self, _cmd: u32, _value: i64) -> Result<()> {
        Err(HubError::Unsupported("HAL has no command interface".to_string()))
    }

    fn send_sensorhub_data(&self, _data: &[u8]) -> Result<()> {
        Err(HubError::Unsupported("HAL is not a sensorhub".to_string()))
    }
}

pub type HalHandle = Arc<dyn SensorHal>;
