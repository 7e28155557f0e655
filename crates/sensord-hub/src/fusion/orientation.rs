// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Azimuth / pitch / roll in degrees

use crate::events::ActiveVirtualSensors;
use crate::fusion::core::{output_event, virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
use sensord_config::OrientationConfig;
use sensord_protocol::{EventType, SensorEvent, SensorPrivilege, SensorType};
use std::sync::Arc;

pub struct OrientationSynthesis {
    azimuth_offset_deg: f32,
    azimuth_reversed: bool,
}

impl OrientationSynthesis {
    pub fn new(config: &OrientationConfig) -> Self {
        Self {
            azimuth_offset_deg: config.azimuth_offset_deg,
            azimuth_reversed: config.azimuth_reversed,
        }
    }

    /// Azimuth folded into `[0, 360)`
    fn azimuth_degrees(&self, azimuth_rad: f32) -> f32 {
        let mut azimuth = azimuth_rad.to_degrees() + self.azimuth_offset_deg;
        if self.azimuth_reversed {
            azimuth = -azimuth;
        }
        let folded = azimuth.rem_euclid(360.0);
        if folded >= 360.0 {
            0.0
        } else {
            folded
        }
    }
}

impl Synthesis for OrientationSynthesis {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent> {
        if event.sensor_id.sensor_type() != Some(SensorType::Fusion) {
            return Vec::new();
        }
        let attitude = core
            .upstream(SensorType::Fusion)
            .and_then(|fusion| fusion.as_fusion().and_then(|f| f.get_attitude()));
        let Some(attitude) = attitude else {
            return Vec::new();
        };

        let values = [
            self.azimuth_degrees(attitude.azimuth),
            attitude.pitch.to_degrees(),
            attitude.roll.to_degrees(),
        ];
        output_event(core, EventType::raw_data(SensorType::Orientation), event, &values)
            .into_iter()
            .collect()
    }
}

pub type OrientationSensor = VirtualSensor<OrientationSynthesis>;

impl OrientationSensor {
    pub fn new(
        config: &OrientationConfig,
        active: Arc<ActiveVirtualSensors>,
        default_interval_ms: u32,
    ) -> Self {
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::Orientation,
                "orientation",
                SensorPrivilege::Public,
                360.0,
                vec![EventType::raw_data(SensorType::Orientation)],
            ),
            vec![SensorType::Fusion],
            Vec::new(),
            active,
            default_interval_ms,
        );
        Self::with_synthesis(core, OrientationSynthesis::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azimuth_offset_and_reversal() {
        let plain = OrientationSynthesis::new(&OrientationConfig::default());
        assert!((plain.azimuth_degrees((-90.0f32).to_radians()) - 270.0).abs() < 1e-3);

        let shifted = OrientationSynthesis::new(&OrientationConfig {
            enabled: true,
            azimuth_offset_deg: 30.0,
            azimuth_reversed: true,
        });
        // -(10 + 30) folded
        assert!((shifted.azimuth_degrees(10.0f32.to_radians()) - 320.0).abs() < 1e-3);
    }
}
