// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Acceleration with gravity removed

use crate::events::ActiveVirtualSensors;
use crate::fusion::core::{output_event, virtual_descriptor, Synthesis, VirtualSensor, VirtualSensorCore};
use crate::fusion::math::{sub, vec3, Vec3};
use crate::fusion::GRAVITY_EARTH;
use parking_lot::Mutex;
use sensord_protocol::{EventType, SensorEvent, SensorPrivilege, SensorType};
use std::sync::Arc;

#[derive(Default)]
pub struct LinearAccelSynthesis {
    gravity: Mutex<Option<Vec3>>,
}

impl LinearAccelSynthesis {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Synthesis for LinearAccelSynthesis {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent> {
        let values = vec3(event.data.values());
        match event.sensor_id.sensor_type() {
            Some(SensorType::Gravity) => {
                *self.gravity.lock() = Some(values);
                Vec::new()
            }
            Some(SensorType::Accelerometer) => {
                let Some(gravity) = *self.gravity.lock() else {
                    return Vec::new();
                };
                output_event(
                    core,
                    EventType::raw_data(SensorType::LinearAccel),
                    event,
                    &sub(values, gravity),
                )
                .into_iter()
                .collect()
            }
            _ => Vec::new(),
        }
    }

    fn reset(&self) {
        *self.gravity.lock() = None;
    }
}

pub type LinearAccelSensor = VirtualSensor<LinearAccelSynthesis>;

impl LinearAccelSensor {
    pub fn new(active: Arc<ActiveVirtualSensors>, default_interval_ms: u32) -> Self {
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::LinearAccel,
                "linear_accel",
                SensorPrivilege::Public,
                GRAVITY_EARTH * 4.0,
                vec![EventType::raw_data(SensorType::LinearAccel)],
            ),
            vec![SensorType::Accelerometer, SensorType::Gravity],
            Vec::new(),
            active,
            default_interval_ms,
        );
        Self::with_synthesis(core, LinearAccelSynthesis::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientSessionRegistry;
    use crate::core::AlwaysOnDisplay;
    use crate::events::sink::testing::RecordingSink;
    use crate::events::{EventDispatcher, EventQueue, HubEvent};
    use crate::fusion::testing::{assert_close, raw_event, registry_with};
    use crate::fusion::{FusionSensor, GravitySensor};
    use crate::sensors::{Sensor, SensorHandle, Synthesizable};
    use sensord_config::FusionConfig;
    use sensord_protocol::Permission;

    #[test]
    fn test_needs_gravity_before_output() {
        let registry = registry_with(&[SensorType::Accelerometer, SensorType::Gravity]);
        let linear = LinearAccelSensor::new(Arc::new(ActiveVirtualSensors::new()), 1000);
        linear.init(&registry).unwrap();

        let accel = raw_event(SensorType::Accelerometer, 1, &[1.0, 2.0, 12.0]);
        assert!(linear.synthesize(&accel).is_empty());

        let gravity = raw_event(SensorType::Gravity, 2, &[0.0, 0.0, 10.0]);
        assert!(linear.synthesize(&gravity).is_empty());

        let derived = linear.synthesize(&accel);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].event_type, EventType::raw_data(SensorType::LinearAccel));
        assert_close(derived[0].data.values(), &[1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_fusion_chain_through_dispatcher() {
        let registry = registry_with(&[SensorType::Accelerometer]);
        let active = Arc::new(ActiveVirtualSensors::new());
        let fusion: SensorHandle = Arc::new(FusionSensor::new(
            &FusionConfig::default(),
            Arc::clone(&active),
            1000,
        ));
        let gravity: SensorHandle = Arc::new(GravitySensor::new(Arc::clone(&active), 1000));
        let linear: SensorHandle = Arc::new(LinearAccelSensor::new(Arc::clone(&active), 1000));
        for sensor in [&fusion, &gravity, &linear] {
            registry.register_sensor(Arc::clone(sensor)).unwrap();
        }

        let clients = Arc::new(ClientSessionRegistry::new());
        let dispatcher = EventDispatcher::new(
            Arc::new(EventQueue::new(64)),
            Arc::clone(&clients),
            Arc::clone(&registry),
            Arc::clone(&active),
            Arc::new(AlwaysOnDisplay),
        );
        let raw = EventType::raw_data(SensorType::LinearAccel);
        let client = clients.create_client(1, Permission::STANDARD);
        let sink = RecordingSink::new();
        clients.set_event_channel(client, sink.clone()).unwrap();
        clients.add_sensor_usage(client, linear.id()).unwrap();
        clients.register_event(client, linear.id(), raw).unwrap();
        clients.set_start(client, linear.id(), true).unwrap();

        linear.start().unwrap();
        assert!(active.contains(fusion.id()));
        assert!(active.contains(gravity.id()));

        let accel = raw_event(SensorType::Accelerometer, 1, &[0.0, 0.0, GRAVITY_EARTH + 1.0]);
        dispatcher.dispatch(&HubEvent::Sensor(accel));

        let received = sink.sensor_events();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event_type, raw);
        assert_eq!(received[0].sensor_id, linear.id());
        assert_close(received[0].data.values(), &[0.0, 0.0, 1.0]);

        linear.stop().unwrap();
        assert!(active.is_empty());
        dispatcher.dispatch(&HubEvent::Sensor(accel));
        assert_eq!(sink.sensor_events().len(), 1);
    }
}
