// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Virtual sensors and sensor fusion
//!
//! Virtual sensors never poll hardware. They declare upstream sensors, start
//! them while they have listeners themselves, and derive events from the
//! upstream events the dispatcher feeds them:
//!
//! ```text
//! accelerometer ─┬─> fusion ─┬─> orientation
//! gyroscope ─────┤           ├─> gravity ──> linear_accel
//! geomagnetic ───┘           └─> rotation_vector
//! accelerometer ───> auto_rotation
//! ```

pub mod auto_rotation;
pub mod core;
pub mod filter;
pub mod fusion_sensor;
pub mod gravity;
pub mod linear_accel;
pub mod math;
pub mod orientation;
pub mod rotation_vector;

pub use self::core::{virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
pub use auto_rotation::{AutoRotationSensor, AutoRotationSynthesis};
pub use filter::{ComplementaryFilter, FusionAlgorithm};
pub use fusion_sensor::{FusionSensor, FusionSynthesis};
pub use gravity::{GravitySensor, GravitySynthesis};
pub use linear_accel::{LinearAccelSensor, LinearAccelSynthesis};
pub use math::{Quaternion, Vec3};
pub use orientation::{OrientationSensor, OrientationSynthesis};
pub use rotation_vector::{RotationVectorSensor, RotationVectorSynthesis};

/// Standard gravity, m/s²
pub const GRAVITY_EARTH: f32 = 9.80665;

/// Device attitude in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub azimuth: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Derived quantities of a fusion engine
///
/// Every getter returns `None` until enough inputs were observed; callers
/// treat that as a normal transient state.
pub trait FusionSource: Send + Sync {
    fn get_rotation_matrix(&self) -> Option<[f32; 9]>;

    fn get_attitude(&self) -> Option<Attitude>;

    /// Gravity in the device frame, m/s²
    fn get_gravity(&self) -> Option<Vec3>;

    /// Last accelerometer sample minus gravity, m/s²
    fn get_linear_acceleration(&self) -> Option<Vec3>;

    /// Device → world orientation
    fn get_orientation(&self) -> Option<Quaternion>;
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::events::EventQueue;
    use crate::sensors::{PhysicalSensor, ScaleConversion, SensorHandle, SensorRegistry, SimulatedHal};
    use sensord_protocol::event::ACCURACY_GOOD;
    use sensord_protocol::{EventType, SensorData, SensorEvent, SensorId, SensorType};
    use std::sync::Arc;

    /// Registry holding one injectable physical sensor per type
    pub fn registry_with(types: &[SensorType]) -> Arc<SensorRegistry> {
        let registry = Arc::new(SensorRegistry::new());
        let queue = Arc::new(EventQueue::new(64));
        for &sensor_type in types {
            let hal = Arc::new(SimulatedHal::injected(sensor_type, sensor_type.name()).unwrap());
            registry.register_hal(hal.clone()).unwrap();
            let sensor: SensorHandle = Arc::new(PhysicalSensor::new(
                SensorId::new(sensor_type, 0),
                hal,
                Arc::new(ScaleConversion::new(1.0)),
                Arc::clone(&queue),
                1000,
            ));
            registry.register_sensor(sensor).unwrap();
        }
        registry
    }

    pub fn raw_event(sensor_type: SensorType, timestamp: u64, values: &[f32]) -> SensorEvent {
        SensorEvent::new(
            EventType::raw_data(sensor_type),
            SensorId::new(sensor_type, 0),
            SensorData::new(timestamp, ACCURACY_GOOD, values).unwrap(),
        )
    }

    pub fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{:?} != {:?}", actual, expected);
        }
    }
}
