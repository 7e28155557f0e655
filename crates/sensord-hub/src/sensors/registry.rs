// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registry of loaded HALs and sensor modules
//!
//! Written while plugins load, read-mostly afterwards. When several entries
//! share a type, the first one registered is the default for type lookups.

use crate::core::{HubError, Result};
use crate::sensors::hal::HalHandle;
use crate::sensors::SensorHandle;
use ahash::AHashMap;
use parking_lot::RwLock;
use sensord_protocol::{SensorDescriptor, SensorId, SensorType};
use tracing::{info, warn};

#[derive(Default)]
struct RegistryInner {
    hals: Vec<HalHandle>,
    sensors: Vec<SensorHandle>,
    by_id: AHashMap<SensorId, usize>,
}

#[derive(Default)]
pub struct SensorRegistry {
    inner: RwLock<RegistryInner>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize and add a HAL; on failure nothing is added
    pub fn register_hal(&self, hal: HalHandle) -> Result<()> {
        let properties = hal.get_properties();
        if let Err(e) = hal.init() {
            warn!(
                "🦀 [SENSOR-REGISTRY] ⚠️ HAL '{}' ({}) failed to initialize: {}",
                properties.name, properties.sensor_type, e
            );
            return Err(e);
        }
        self.inner.write().hals.push(hal);
        info!(
            "🦀 [SENSOR-REGISTRY] Registered HAL '{}' ({})",
            properties.name, properties.sensor_type
        );
        Ok(())
    }

    /// Initialize and add a sensor module; on failure nothing is added
    ///
    /// `init` runs before the write lock is taken so modules can resolve
    /// their upstream sensors through this registry.
    pub fn register_sensor(&self, sensor: SensorHandle) -> Result<()> {
        let id = sensor.id();
        if self.inner.read().by_id.contains_key(&id) {
            return Err(HubError::AlreadyRegistered(format!("sensor {}", id)));
        }
        if let Err(e) = sensor.init(self) {
            warn!(
                "🦀 [SENSOR-REGISTRY] ⚠️ Sensor {} ({}) failed to initialize: {}",
                id,
                sensor.descriptor().name,
                e
            );
            return Err(e);
        }

        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&id) {
            return Err(HubError::AlreadyRegistered(format!("sensor {}", id)));
        }
        let index = inner.sensors.len();
        inner.by_id.insert(id, index);
        inner.sensors.push(sensor);
        info!(
            "🦀 [SENSOR-REGISTRY] Registered sensor {} '{}'{}",
            id,
            inner.sensors[index].descriptor().name,
            if inner.sensors[index].is_virtual() {
                " (virtual)"
            } else {
                ""
            }
        );
        Ok(())
    }

    /// Next free id for a sensor of `sensor_type`
    pub fn next_id(&self, sensor_type: SensorType) -> SensorId {
        let count = self
            .inner
            .read()
            .sensors
            .iter()
            .filter(|s| s.sensor_type() == sensor_type)
            .count();
        SensorId::new(sensor_type, count as u32)
    }

    /// First HAL registered for `sensor_type`
    pub fn resolve_hal(&self, sensor_type: SensorType) -> Result<HalHandle> {
        self.inner
            .read()
            .hals
            .iter()
            .find(|h| h.get_properties().sensor_type == sensor_type)
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("no HAL of type {}", sensor_type)))
    }

    /// First sensor registered for `sensor_type`
    pub fn resolve_sensor(&self, sensor_type: SensorType) -> Result<SensorHandle> {
        self.inner
            .read()
            .sensors
            .iter()
            .find(|s| s.sensor_type() == sensor_type)
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("no sensor of type {}", sensor_type)))
    }

    pub fn resolve_sensor_by_id(&self, id: SensorId) -> Result<SensorHandle> {
        let inner = self.inner.read();
        inner
            .by_id
            .get(&id)
            .map(|&index| inner.sensors[index].clone())
            .ok_or_else(|| HubError::NotFound(format!("sensor {}", id)))
    }

    /// Every sensor of `sensor_type` in registration order; `All` matches any
    pub fn all_of_type(&self, sensor_type: SensorType) -> Vec<SensorHandle> {
        self.inner
            .read()
            .sensors
            .iter()
            .filter(|s| sensor_type == SensorType::All || s.sensor_type() == sensor_type)
            .cloned()
            .collect()
    }

    pub fn all_virtual(&self) -> Vec<SensorHandle> {
        self.inner
            .read()
            .sensors
            .iter()
            .filter(|s| s.is_virtual())
            .cloned()
            .collect()
    }

    pub fn hals(&self) -> Vec<HalHandle> {
        self.inner.read().hals.clone()
    }

    pub fn descriptors(&self) -> Vec<SensorDescriptor> {
        self.inner
            .read()
            .sensors
            .iter()
            .map(|s| s.descriptor().clone())
            .collect()
    }

    pub fn sensor_count(&self) -> usize {
        self.inner.read().sensors.len()
    }
}
