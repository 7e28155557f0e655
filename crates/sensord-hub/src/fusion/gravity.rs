// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gravity vector in the device frame
//!
//! Follows the fusion engine once it is ready. Until then the accelerometer
//! is low-pass filtered so listeners get a usable estimate immediately.

use crate::events::ActiveVirtualSensors;
use crate::fusion::core::{output_event, virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
use crate::fusion::math::{vec3, Vec3};
use crate::fusion::GRAVITY_EARTH;
use parking_lot::Mutex;
use sensord_protocol::{EventType, SensorEvent, SensorPrivilege, SensorType};
use std::sync::Arc;

/// Weight of the previous estimate in the accelerometer fallback
const LOW_PASS_ALPHA: f32 = 0.8;

#[derive(Default)]
pub struct GravitySynthesis {
    low_pass: Mutex<Option<Vec3>>,
}

impl GravitySynthesis {
    pub fn new() -> Self {
        Self::default()
    }

    fn fusion_gravity(core: &VirtualSensorCore) -> Option<Vec3> {
        core.upstream(SensorType::Fusion)
            .and_then(|fusion| fusion.as_fusion().and_then(|f| f.get_gravity()))
    }
}

impl Synthesis for GravitySynthesis {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent> {
        let gravity = match event.sensor_id.sensor_type() {
            Some(SensorType::Fusion) => Self::fusion_gravity(core),
            Some(SensorType::Accelerometer) if Self::fusion_gravity(core).is_none() => {
                let accel = vec3(event.data.values());
                let mut low_pass = self.low_pass.lock();
                let next = match *low_pass {
                    Some(previous) => [
                        LOW_PASS_ALPHA * previous[0] + (1.0 - LOW_PASS_ALPHA) * accel[0],
                        LOW_PASS_ALPHA * previous[1] + (1.0 - LOW_PASS_ALPHA) * accel[1],
                        LOW_PASS_ALPHA * previous[2] + (1.0 - LOW_PASS_ALPHA) * accel[2],
                    ],
                    None => accel,
                };
                *low_pass = Some(next);
                Some(next)
            }
            _ => None,
        };

        let Some(gravity) = gravity else {
            return Vec::new();
        };
        output_event(core, EventType::raw_data(SensorType::Gravity), event, &gravity)
            .into_iter()
            .collect()
    }

    fn reset(&self) {
        *self.low_pass.lock() = None;
    }
}

pub type GravitySensor = VirtualSensor<GravitySynthesis>;

impl GravitySensor {
    pub fn new(active: Arc<ActiveVirtualSensors>, default_interval_ms: u32) -> Self {
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::Gravity,
                "gravity",
                SensorPrivilege::Public,
                GRAVITY_EARTH * 2.0,
                vec![EventType::raw_data(SensorType::Gravity)],
            ),
            vec![SensorType::Accelerometer, SensorType::Fusion],
            Vec::new(),
            active,
            default_interval_ms,
        );
        Self::with_synthesis(core, GravitySynthesis::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::testing::{assert_close, raw_event, registry_with};
    use crate::fusion::FusionSensor;
    use crate::sensors::{Sensor, SensorHandle, Synthesizable};
    use sensord_config::FusionConfig;

    struct Chain {
        fusion: SensorHandle,
        gravity: GravitySensor,
    }

    fn chain() -> Chain {
        let registry = registry_with(&[SensorType::Accelerometer]);
        let active = Arc::new(ActiveVirtualSensors::new());
        let fusion: SensorHandle = Arc::new(FusionSensor::new(
            &FusionConfig::default(),
            Arc::clone(&active),
            1000,
        ));
        registry.register_sensor(Arc::clone(&fusion)).unwrap();
        let gravity = GravitySensor::new(active, 1000);
        gravity.init(&registry).unwrap();
        Chain { fusion, gravity }
    }

    #[test]
    fn test_low_pass_until_fusion_is_ready() {
        let c = chain();
        let first = c
            .gravity
            .synthesize(&raw_event(SensorType::Accelerometer, 1, &[0.0, 0.0, 10.0]));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].event_type, EventType::raw_data(SensorType::Gravity));
        assert_close(first[0].data.values(), &[0.0, 0.0, 10.0]);

        let second = c
            .gravity
            .synthesize(&raw_event(SensorType::Accelerometer, 2, &[0.0, 0.0, 0.0]));
        assert_close(second[0].data.values(), &[0.0, 0.0, 8.0]);
    }

    #[test]
    fn test_follows_fusion_once_ready() {
        let c = chain();
        let accel = raw_event(SensorType::Accelerometer, 1, &[0.0, 0.0, 3.0]);
        let fused = c.fusion.as_synthesizable().unwrap().synthesize(&accel);
        assert_eq!(fused.len(), 1);

        // Raw accelerometer input is ignored while fusion has an estimate
        assert!(c.gravity.synthesize(&accel).is_empty());
        let derived = c.gravity.synthesize(&fused[0]);
        assert_eq!(derived.len(), 1);
        assert_close(derived[0].data.values(), &[0.0, 0.0, GRAVITY_EARTH]);
    }

    #[test]
    fn test_starts_whole_upstream_chain() {
        let c = chain();
        c.gravity.start().unwrap();
        assert!(c.fusion.is_started());
        c.gravity.stop().unwrap();
        assert!(!c.fusion.is_started());
    }
}
