// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! FIFO between the sensor pollers and the dispatcher thread
//!
//! `push` never refuses an event. The configured capacity is a soft limit:
//! crossing it logs one warning per overload episode, and the warning is
//! re-armed once the queue drains back under the limit.

use parking_lot::{Condvar, Mutex};
use sensord_protocol::{SensorEvent, SensorId, SensorhubEvent};
use std::collections::VecDeque;
use tracing::warn;

/// Anything a sensor can emit
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Sensor(SensorEvent),
    Sensorhub(SensorhubEvent),
}

impl HubEvent {
    pub fn sensor_id(&self) -> SensorId {
        match self {
            HubEvent::Sensor(e) => e.sensor_id,
            HubEvent::Sensorhub(e) => e.sensor_id,
        }
    }

    pub fn event_type(&self) -> sensord_protocol::EventType {
        match self {
            HubEvent::Sensor(e) => e.event_type,
            HubEvent::Sensorhub(e) => e.event_type,
        }
    }

    /// Wire bytes as written on the event channel
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            HubEvent::Sensor(e) => e.to_bytes(),
            HubEvent::Sensorhub(e) => e.to_bytes(),
        }
    }
}

struct QueueState {
    events: VecDeque<HubEvent>,
    overloaded: bool,
}

/// Mutex + condvar event queue
pub struct EventQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity.min(1024)),
                overloaded: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    pub fn push(&self, event: HubEvent) {
        let mut state = self.state.lock();
        if state.events.len() >= self.capacity {
            if !state.overloaded {
                state.overloaded = true;
                warn!(
                    "🦀 [EVENT-QUEUE] ⚠️ Queue reached {} pending events, consumer is falling behind",
                    state.events.len()
                );
            }
        } else if state.overloaded {
            state.overloaded = false;
        }
        state.events.push_back(event);
        drop(state);
        self.available.notify_one();
    }

    /// Block until an event is available
    pub fn pop(&self) -> HubEvent {
        let mut state = self.state.lock();
        loop {
            if let Some(event) = state.events.pop_front() {
                return event;
            }
            self.available.wait(&mut state);
        }
    }

    /// Non-blocking variant of [`EventQueue::pop`]
    pub fn try_pop(&self) -> Option<HubEvent> {
        self.state.lock().events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the soft limit is currently exceeded
    pub fn is_overloaded(&self) -> bool {
        self.state.lock().overloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensord_protocol::{EventType, SensorData, SensorType};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn accel_event(seq: u64) -> HubEvent {
        HubEvent::Sensor(SensorEvent::new(
            EventType::raw_data(SensorType::Accelerometer),
            SensorId::new(SensorType::Accelerometer, 0),
            SensorData::new(seq, 1, &[seq as f32]).unwrap(),
        ))
    }

    fn seq_of(event: &HubEvent) -> u64 {
        match event {
            HubEvent::Sensor(e) => e.data.timestamp,
            HubEvent::Sensorhub(e) => e.data.timestamp,
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::new(1000);
        for i in 0..50 {
            queue.push(accel_event(i));
        }
        for i in 0..50 {
            assert_eq!(seq_of(&queue.pop()), i);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_past_capacity_is_never_dropped() {
        let queue = EventQueue::new(4);
        for i in 0..10 {
            queue.push(accel_event(i));
        }
        assert_eq!(queue.len(), 10);
        assert!(queue.is_overloaded());

        for _ in 0..9 {
            queue.pop();
        }
        // Re-armed on the next push once drained
        queue.push(accel_event(10));
        assert!(!queue.is_overloaded());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(EventQueue::new(10));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || seq_of(&queue.pop()))
        };

        thread::sleep(Duration::from_millis(50));
        queue.push(accel_event(7));
        assert_eq!(consumer.join().unwrap(), 7);
    }

    #[test]
    fn test_interleaved_producers_keep_per_sensor_order() {
        let queue = Arc::new(EventQueue::new(1000));
        let producers: Vec<_> = (0..2u32)
            .map(|index| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for seq in 0..100u64 {
                        queue.push(HubEvent::Sensor(SensorEvent::new(
                            EventType::raw_data(SensorType::Light),
                            SensorId::new(SensorType::Light, index),
                            SensorData::new(seq, 1, &[0.0]).unwrap(),
                        )));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last = [None::<u64>; 2];
        while let Some(event) = queue.try_pop() {
            let index = event.sensor_id().index() as usize;
            let seq = seq_of(&event);
            if let Some(prev) = last[index] {
                assert!(seq > prev);
            }
            last[index] = Some(seq);
        }
        assert_eq!(last, [Some(99), Some(99)]);
    }
}
