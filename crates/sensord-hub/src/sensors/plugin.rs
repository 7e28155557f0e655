// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Plugin loading
//!
//! A [`PluginLoader`] supplies HALs, per-HAL conversion algorithms and the
//! virtual sensors to stack on top. [`load_plugins`] registers all of them
//! with a [`SensorRegistry`]; one broken entry is logged and skipped so the
//! daemon still comes up with the rest.

use crate::core::Result;
use crate::events::{ActiveVirtualSensors, EventQueue};
use crate::fusion::{
    AutoRotationSensor, FusionSensor, GravitySensor, LinearAccelSensor, OrientationSensor,
    RotationVectorSensor,
};
use crate::sensors::algorithm::{ScaleConversion, SensorAlgorithm};
use crate::sensors::hal::{HalHandle, HalProperties};
use crate::sensors::physical::PhysicalSensor;
use crate::sensors::registry::SensorRegistry;
use crate::sensors::simulated::SimulatedHal;
use crate::sensors::SensorHandle;
use sensord_config::{HalConfig, SensordConfig, VirtualSensorsConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state handed to sensor modules at construction
#[derive(Clone)]
pub struct PluginContext {
    pub queue: Arc<EventQueue>,
    pub active: Arc<ActiveVirtualSensors>,
    pub default_interval_ms: u32,
}

pub trait PluginLoader: Send + Sync {
    fn name(&self) -> &str;

    /// One entry per device; failed entries are skipped
    fn create_hals(&self) -> Vec<Result<HalHandle>>;

    /// Raw-to-SI conversion for one HAL
    fn create_algorithm(&self, properties: &HalProperties) -> Arc<dyn SensorAlgorithm> {
        Arc::new(ScaleConversion::new(properties.raw_scale))
    }

    /// Virtual sensors in dependency order: every module comes after the
    /// modules it consumes
    fn create_virtual_sensors(&self, ctx: &PluginContext) -> Vec<Result<SensorHandle>>;
}

/// What [`load_plugins`] managed to register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub hals: usize,
    pub physical_sensors: usize,
    pub virtual_sensors: usize,
    pub failures: usize,
}

/// Register HALs, one physical sensor per HAL, then the virtual sensors
pub fn load_plugins(
    loader: &dyn PluginLoader,
    registry: &SensorRegistry,
    ctx: &PluginContext,
) -> LoadReport {
    let mut report = LoadReport::default();

    for hal in loader.create_hals() {
        let registered = hal.and_then(|hal| {
            registry.register_hal(Arc::clone(&hal))?;
            Ok(hal)
        });
        match registered {
            Ok(hal) => {
                report.hals += 1;
                let properties = hal.get_properties();
                let algorithm = loader.create_algorithm(&properties);
                let id = registry.next_id(properties.sensor_type);
                let sensor = Arc::new(PhysicalSensor::new(
                    id,
                    hal,
                    algorithm,
                    Arc::clone(&ctx.queue),
                    ctx.default_interval_ms,
                ));
                match registry.register_sensor(sensor) {
                    Ok(()) => report.physical_sensors += 1,
                    Err(e) => {
                        warn!("🦀 [PLUGIN] ⚠️ Sensor {} not loaded: {}", id, e);
                        report.failures += 1;
                    }
                }
            }
            Err(e) => {
                warn!("🦀 [PLUGIN] ⚠️ {}: skipping HAL: {}", loader.name(), e);
                report.failures += 1;
            }
        }
    }

    for sensor in loader.create_virtual_sensors(ctx) {
        match sensor.and_then(|sensor| registry.register_sensor(sensor)) {
            Ok(()) => report.virtual_sensors += 1,
            Err(e) => {
                // Usually a missing upstream sensor type
                warn!("🦀 [PLUGIN] ⚠️ {}: skipping virtual sensor: {}", loader.name(), e);
                report.failures += 1;
            }
        }
    }

    info!(
        "🦀 [PLUGIN] ✅ {} loaded: {} HALs, {} physical, {} virtual, {} failed",
        loader.name(),
        report.hals,
        report.physical_sensors,
        report.virtual_sensors,
        report.failures
    );
    report
}

/// Simulated HALs from `[[hal]]` entries plus the enabled virtual sensors
pub struct BuiltinPluginLoader {
    hals: Vec<HalConfig>,
    virtual_sensors: VirtualSensorsConfig,
}

impl BuiltinPluginLoader {
    pub fn new(config: &SensordConfig) -> Self {
        Self {
            hals: config.hals.clone(),
            virtual_sensors: config.virtual_sensors.clone(),
        }
    }
}

impl PluginLoader for BuiltinPluginLoader {
    fn name(&self) -> &str {
        "builtin"
    }

    fn create_hals(&self) -> Vec<Result<HalHandle>> {
        self.hals
            .iter()
            .map(|config| SimulatedHal::from_config(config).map(|hal| Arc::new(hal) as HalHandle))
            .collect()
    }

    fn create_virtual_sensors(&self, ctx: &PluginContext) -> Vec<Result<SensorHandle>> {
        let config = &self.virtual_sensors;
        let active = || Arc::clone(&ctx.active);
        let interval = ctx.default_interval_ms;
        let mut sensors: Vec<Result<SensorHandle>> = Vec::new();

        if config.fusion.enabled {
            sensors.push(Ok(Arc::new(FusionSensor::new(&config.fusion, active(), interval))));
            if config.orientation.enabled {
                sensors.push(Ok(Arc::new(OrientationSensor::new(
                    &config.orientation,
                    active(),
                    interval,
                ))));
            }
            if config.rotation_vector.enabled {
                sensors.push(Ok(Arc::new(RotationVectorSensor::new(active(), interval))));
            }
            if config.gravity.enabled {
                sensors.push(Ok(Arc::new(GravitySensor::new(active(), interval))));
            }
            if config.gravity.enabled && config.linear_accel.enabled {
                sensors.push(Ok(Arc::new(LinearAccelSensor::new(active(), interval))));
            }
        }
        if config.auto_rotation.enabled {
            sensors.push(Ok(Arc::new(AutoRotationSensor::new(
                &config.auto_rotation,
                active(),
                interval,
            ))));
        }
        sensors
    }
}
