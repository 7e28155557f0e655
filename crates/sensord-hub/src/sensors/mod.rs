// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor modules and the registry that owns them
//!
//! A sensor module is anything implementing [`Sensor`]. Physical sensors wrap
//! a [`SensorHal`](hal::SensorHal) and a background poller; virtual sensors
//! (see [`crate::fusion`]) additionally implement [`Synthesizable`] and react
//! to upstream events instead of polling.

pub mod algorithm;
pub mod hal;
pub mod interval;
pub mod physical;
pub mod plugin;
pub mod poller;
pub mod registry;
pub mod simulated;

pub use algorithm::{ScaleConversion, SensorAlgorithm};
pub use hal::{HalHandle, HalProperties, RawSample, SensorHal};
pub use interval::{IntervalInfo, IntervalTracker};
pub use physical::PhysicalSensor;
pub use plugin::{load_plugins, BuiltinPluginLoader, LoadReport, PluginContext, PluginLoader};
pub use poller::{PollerState, SensorPoller};
pub use registry::SensorRegistry;
pub use simulated::{Injection, SimulatedHal};

use crate::core::{HubError, Result};
use crate::fusion::FusionSource;
use parking_lot::Mutex;
use sensord_protocol::{SensorData, SensorDescriptor, SensorEvent, SensorId, SensorType};
use std::sync::Arc;

/// Shared handle to a registered sensor module
pub type SensorHandle = Arc<dyn Sensor>;

/// Capability interface of every sensor module
pub trait Sensor: Send + Sync {
    /// Resolve dependencies; called once by [`SensorRegistry::register_sensor`]
    fn init(&self, registry: &SensorRegistry) -> Result<()>;

    fn descriptor(&self) -> &SensorDescriptor;

    fn id(&self) -> SensorId {
        self.descriptor().id
    }

    fn sensor_type(&self) -> SensorType {
        self.descriptor().sensor_type
    }

    fn is_virtual(&self) -> bool {
        false
    }

    /// Acquire one start reference; the backend is enabled on the first
    fn start(&self) -> Result<()>;

    /// Release one start reference; the backend is disabled on the last
    fn stop(&self) -> Result<()>;

    fn is_started(&self) -> bool;

    /// Record the interval a listener wants; `listener` is a client id, or a
    /// sensor id for virtual sensors consuming this one (`is_processor`)
    fn add_interval(&self, listener: i64, interval_ms: u32, is_processor: bool) -> Result<()>;

    fn delete_interval(&self, listener: i64, is_processor: bool) -> Result<()>;

    /// Currently effective sampling interval
    fn interval_ms(&self) -> u32;

    /// Latest sample; `data_type` 0 or any event type of this sensor
    fn get_data(&self, data_type: u32) -> Result<SensorData>;

    fn set_command(&self, cmd: u32, _value: i64) -> Result<()> {
        Err(HubError::Unsupported(format!(
            "{} does not accept command {:#x}",
            self.id(),
            cmd
        )))
    }

    fn send_sensorhub_data(&self, _data: &[u8]) -> Result<()> {
        Err(HubError::Unsupported(format!(
            "{} is not sensorhub controlled",
            self.id()
        )))
    }

    fn as_synthesizable(&self) -> Option<&dyn Synthesizable> {
        None
    }

    fn as_fusion(&self) -> Option<&dyn FusionSource> {
        None
    }
}

/// Virtual sensor capability: derive events from upstream events
pub trait Synthesizable: Send + Sync {
    /// Sensors whose events feed [`Synthesizable::synthesize`]
    fn upstream_ids(&self) -> Vec<SensorId>;

    /// Consume one upstream event, returning zero or more derived events
    fn synthesize(&self, event: &SensorEvent) -> Vec<SensorEvent>;
}

/// Start reference counter shared by all clients of one sensor
///
/// The first start and the last stop run their backend transition while the
/// count is locked, so a concurrent starter waits for the enable to finish
/// and a failed enable leaves the count untouched.
#[derive(Debug, Default)]
pub struct StartCounter {
    count: Mutex<usize>,
}

impl StartCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one start, running `on_first` for the 0 → 1 transition.
    /// Returns true when `on_first` ran and succeeded.
    pub fn start_with<F>(&self, on_first: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut count = self.count.lock();
        let first = *count == 0;
        if first {
            on_first()?;
        }
        *count += 1;
        Ok(first)
    }

    /// Release one start, running `on_last` for the 1 → 0 transition.
    /// Returns true when `on_last` ran.
    pub fn stop_with<F>(&self, on_last: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut count = self.count.lock();
        if *count == 0 {
            return Err(HubError::InvalidArgument("sensor is not started".to_string()));
        }
        *count -= 1;
        if *count > 0 {
            return Ok(false);
        }
        on_last()?;
        Ok(true)
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }
}

/// Map `data_type` of a `get_data` request onto this sensor
pub(crate) fn check_data_type(descriptor: &SensorDescriptor, data_type: u32) -> Result<()> {
    if data_type == 0 || (data_type >> 16) as i32 == descriptor.sensor_type as i32 {
        Ok(())
    } else {
        Err(HubError::InvalidArgument(format!(
            "data type {:#x} does not belong to {}",
            data_type, descriptor.id
        )))
    }
}
