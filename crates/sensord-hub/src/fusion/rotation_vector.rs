// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Orientation quaternion as `[x, y, z, w]`

use crate::events::ActiveVirtualSensors;
use crate::fusion::core::{output_event, virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
use sensord_protocol::{EventType, SensorEvent, SensorPrivilege, SensorType};
use std::sync::Arc;

#[derive(Default)]
pub struct RotationVectorSynthesis;

impl Synthesis for RotationVectorSynthesis {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent> {
        if event.sensor_id.sensor_type() != Some(SensorType::Fusion) {
            return Vec::new();
        }
        let orientation = core
            .upstream(SensorType::Fusion)
            .and_then(|fusion| fusion.as_fusion().and_then(|f| f.get_orientation()));
        let Some(q) = orientation else {
            return Vec::new();
        };
        output_event(
            core,
            EventType::raw_data(SensorType::RotationVector),
            event,
            &[q.x, q.y, q.z, q.w],
        )
        .into_iter()
        .collect()
    }
}

pub type RotationVectorSensor = VirtualSensor<RotationVectorSynthesis>;

impl RotationVectorSensor {
    pub fn new(active: Arc<ActiveVirtualSensors>, default_interval_ms: u32) -> Self {
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::RotationVector,
                "rotation_vector",
                SensorPrivilege::Public,
                1.0,
                vec![EventType::raw_data(SensorType::RotationVector)],
            ),
            vec![SensorType::Fusion],
            Vec::new(),
            active,
            default_interval_ms,
        );
        Self::with_synthesis(core, RotationVectorSynthesis)
    }
}
