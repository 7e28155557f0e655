// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Screen rotation state derived from the accelerometer
//!
//! Emits a `CHANGE_STATE` record event only when the state changes. States:
//! 0 unknown, 1 = 0°, 2 = 90°, 3 = 180°, 4 = 270°. Near-flat poses keep the
//! current state, and a switch needs the tilt to be `hysteresis_deg` inside
//! the new quadrant.

use crate::events::ActiveVirtualSensors;
use crate::fusion::core::{output_event, virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
use crate::fusion::math::{norm, vec3, Vec3};
use parking_lot::Mutex;
use sensord_config::AutoRotationConfig;
use sensord_protocol::{EventType, SensorEvent, SensorPrivilege, SensorType};
use std::sync::Arc;

pub const AUTO_ROTATION_DEGREE_UNKNOWN: i32 = 0;
pub const AUTO_ROTATION_DEGREE_0: i32 = 1;
pub const AUTO_ROTATION_DEGREE_90: i32 = 2;
pub const AUTO_ROTATION_DEGREE_180: i32 = 3;
pub const AUTO_ROTATION_DEGREE_270: i32 = 4;

/// Readings weaker than this (m/s²) are free fall or noise
const MIN_GRAVITY: f32 = 1.0;

pub struct AutoRotationSynthesis {
    flat_threshold_deg: f32,
    hysteresis_deg: f32,
    state: Mutex<i32>,
}

impl AutoRotationSynthesis {
    pub fn new(config: &AutoRotationConfig) -> Self {
        Self {
            flat_threshold_deg: config.flat_threshold_deg,
            hysteresis_deg: config.hysteresis_deg,
            state: Mutex::new(AUTO_ROTATION_DEGREE_UNKNOWN),
        }
    }

    /// Rotation state for `accel` given the `current` one
    pub fn rotation_for(&self, accel: Vec3, current: i32) -> i32 {
        let g = norm(accel);
        if g < MIN_GRAVITY {
            return current;
        }
        let inclination = (accel[2] / g).clamp(-1.0, 1.0).acos().to_degrees();
        if inclination < self.flat_threshold_deg || inclination > 180.0 - self.flat_threshold_deg {
            return current;
        }

        let angle = accel[0].atan2(accel[1]).to_degrees().rem_euclid(360.0);
        let quadrant = (((angle + 45.0) / 90.0) as i32).rem_euclid(4);
        let candidate = AUTO_ROTATION_DEGREE_0 + quadrant;
        if candidate == current || current == AUTO_ROTATION_DEGREE_UNKNOWN {
            return candidate;
        }

        let center = quadrant as f32 * 90.0;
        let mut distance = (angle - center).abs();
        if distance > 180.0 {
            distance = 360.0 - distance;
        }
        if distance <= 45.0 - self.hysteresis_deg {
            candidate
        } else {
            current
        }
    }

    pub fn current(&self) -> i32 {
        *self.state.lock()
    }
}

impl Synthesis for AutoRotationSynthesis {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent> {
        if event.sensor_id.sensor_type() != Some(SensorType::Accelerometer) {
            return Vec::new();
        }
        let mut state = self.state.lock();
        let next = self.rotation_for(vec3(event.data.values()), *state);
        if next == *state {
            return Vec::new();
        }
        *state = next;
        drop(state);

        output_event(
            core,
            EventType::change_state(SensorType::AutoRotation),
            event,
            &[next as f32],
        )
        .into_iter()
        .collect()
    }

    fn reset(&self) {
        *self.state.lock() = AUTO_ROTATION_DEGREE_UNKNOWN;
    }
}

pub type AutoRotationSensor = VirtualSensor<AutoRotationSynthesis>;

impl AutoRotationSensor {
    pub fn new(
        config: &AutoRotationConfig,
        active: Arc<ActiveVirtualSensors>,
        default_interval_ms: u32,
    ) -> Self {
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::AutoRotation,
                "auto_rotation",
                SensorPrivilege::Public,
                AUTO_ROTATION_DEGREE_270 as f32,
                vec![EventType::change_state(SensorType::AutoRotation)],
            ),
            vec![SensorType::Accelerometer],
            Vec::new(),
            active,
            default_interval_ms,
        );
        Self::with_synthesis(core, AutoRotationSynthesis::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesis() -> AutoRotationSynthesis {
        AutoRotationSynthesis::new(&AutoRotationConfig::default())
    }

    #[test]
    fn test_quadrants_from_unknown() {
        let s = synthesis();
        let u = AUTO_ROTATION_DEGREE_UNKNOWN;
        assert_eq!(s.rotation_for([0.0, 9.8, 0.0], u), AUTO_ROTATION_DEGREE_0);
        assert_eq!(s.rotation_for([9.8, 0.0, 0.0], u), AUTO_ROTATION_DEGREE_90);
        assert_eq!(s.rotation_for([0.0, -9.8, 0.0], u), AUTO_ROTATION_DEGREE_180);
        assert_eq!(s.rotation_for([-9.8, 0.0, 0.0], u), AUTO_ROTATION_DEGREE_270);
    }

    #[test]
    fn test_flat_keeps_state() {
        let s = synthesis();
        assert_eq!(
            s.rotation_for([0.3, 0.2, 9.8], AUTO_ROTATION_DEGREE_90),
            AUTO_ROTATION_DEGREE_90
        );
        assert_eq!(
            s.rotation_for([0.0, 0.0, -9.8], AUTO_ROTATION_DEGREE_UNKNOWN),
            AUTO_ROTATION_DEGREE_UNKNOWN
        );
    }

    #[test]
    fn test_hysteresis_near_boundary() {
        let s = synthesis();
        // 40° from portrait: candidate is still 0°, stays 0°
        let tilt = 40.0f32.to_radians();
        let accel = [9.8 * tilt.sin(), 9.8 * tilt.cos(), 0.0];
        assert_eq!(s.rotation_for(accel, AUTO_ROTATION_DEGREE_0), AUTO_ROTATION_DEGREE_0);

        // 50° lands in the 90° quadrant but only 40° from its center
        let tilt = 50.0f32.to_radians();
        let accel = [9.8 * tilt.sin(), 9.8 * tilt.cos(), 0.0];
        assert_eq!(s.rotation_for(accel, AUTO_ROTATION_DEGREE_0), AUTO_ROTATION_DEGREE_0);

        // 70° is 20° from the 90° center, past the hysteresis band
        let tilt = 70.0f32.to_radians();
        let accel = [9.8 * tilt.sin(), 9.8 * tilt.cos(), 0.0];
        assert_eq!(s.rotation_for(accel, AUTO_ROTATION_DEGREE_0), AUTO_ROTATION_DEGREE_90);
    }
}
