// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! 6/9-axis fusion engine shared by the orientation-type virtual sensors
//!
//! Inputs: accelerometer (required), gyroscope and geomagnetic (optional).
//! Output: one internal `FUSION` event per update carrying the orientation
//! quaternion as `[x, y, z, w]`.

use crate::events::ActiveVirtualSensors;
use crate::fusion::core::{output_event, virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
use crate::fusion::filter::{ComplementaryFilter, FusionAlgorithm};
use crate::fusion::math::{attitude_from_matrix, scale, sub, vec3, Quaternion, Vec3};
use crate::fusion::{Attitude, FusionSource, GRAVITY_EARTH};
use parking_lot::Mutex;
use sensord_config::FusionConfig;
use sensord_protocol::{EventType, SensorEvent, SensorPrivilege, SensorType};
use std::sync::Arc;

struct FusionState {
    filter: Box<dyn FusionAlgorithm>,
    accel: Option<Vec3>,
    mag: Option<Vec3>,
    last_gyro_timestamp: Option<u64>,
    gyro_seen: bool,
    has_gyro: bool,
}

impl FusionState {
    fn orientation(&self) -> Option<Quaternion> {
        if self.accel.is_none() || (self.has_gyro && !self.gyro_seen) {
            return None;
        }
        self.filter.orientation()
    }
}

pub struct FusionSynthesis {
    state: Mutex<FusionState>,
    use_magnetometer: bool,
}

impl FusionSynthesis {
    pub fn new(algorithm: Box<dyn FusionAlgorithm>, use_magnetometer: bool) -> Self {
        Self {
            state: Mutex::new(FusionState {
                filter: algorithm,
                accel: None,
                mag: None,
                last_gyro_timestamp: None,
                gyro_seen: false,
                has_gyro: false,
            }),
            use_magnetometer,
        }
    }
}

impl Synthesis for FusionSynthesis {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent> {
        let Some(source) = event.sensor_id.sensor_type() else {
            return Vec::new();
        };
        let values = vec3(event.data.values());
        let mut state = self.state.lock();
        state.has_gyro = core.has_upstream(SensorType::Gyroscope);

        match source {
            SensorType::Accelerometer => {
                state.accel = Some(values);
                let mag = if self.use_magnetometer { state.mag } else { None };
                state.filter.update(values, mag);
            }
            SensorType::Gyroscope => {
                let timestamp = event.data.timestamp;
                if let Some(previous) = state.last_gyro_timestamp {
                    if timestamp > previous {
                        let dt = (timestamp - previous) as f32 / 1_000_000.0;
                        state.filter.predict(values, dt);
                    }
                }
                state.last_gyro_timestamp = Some(timestamp);
                state.gyro_seen = true;
            }
            SensorType::Geomagnetic => {
                state.mag = Some(values);
                return Vec::new();
            }
            _ => return Vec::new(),
        }

        let Some(q) = state.orientation() else {
            return Vec::new();
        };
        drop(state);
        output_event(
            core,
            EventType::raw_data(SensorType::Fusion),
            event,
            &[q.x, q.y, q.z, q.w],
        )
        .into_iter()
        .collect()
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.filter.reset();
        state.accel = None;
        state.mag = None;
        state.last_gyro_timestamp = None;
        state.gyro_seen = false;
    }

    fn as_fusion(&self) -> Option<&dyn FusionSource> {
        Some(self)
    }
}

impl FusionSource for FusionSynthesis {
    fn get_rotation_matrix(&self) -> Option<[f32; 9]> {
        self.get_orientation().map(|q| q.to_rotation_matrix())
    }

    fn get_attitude(&self) -> Option<Attitude> {
        let (azimuth, pitch, roll) = attitude_from_matrix(&self.get_rotation_matrix()?);
        Some(Attitude {
            azimuth,
            pitch,
            roll,
        })
    }

    fn get_gravity(&self) -> Option<Vec3> {
        let m = self.get_rotation_matrix()?;
        Some(scale([m[6], m[7], m[8]], GRAVITY_EARTH))
    }

    fn get_linear_acceleration(&self) -> Option<Vec3> {
        let accel = self.state.lock().accel?;
        Some(sub(accel, self.get_gravity()?))
    }

    fn get_orientation(&self) -> Option<Quaternion> {
        self.state.lock().orientation()
    }
}

pub type FusionSensor = VirtualSensor<FusionSynthesis>;

impl FusionSensor {
    pub fn new(
        config: &FusionConfig,
        active: Arc<ActiveVirtualSensors>,
        default_interval_ms: u32,
    ) -> Self {
        let mut optional = vec![SensorType::Gyroscope];
        if config.use_magnetometer {
            optional.push(SensorType::Geomagnetic);
        }
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::Fusion,
                "fusion",
                SensorPrivilege::Internal,
                1.0,
                vec![EventType::raw_data(SensorType::Fusion)],
            ),
            vec![SensorType::Accelerometer],
            optional,
            active,
            default_interval_ms,
        );
        let algorithm = Box::new(ComplementaryFilter::new(config.gyro_weight));
        Self::with_synthesis(core, FusionSynthesis::new(algorithm, config.use_magnetometer))
    }
}
