// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event dispatcher
//!
//! One thread drains the [`EventQueue`]. For each event it:
//!
//! 1. retains record events (state changes) for late joiners
//! 2. feeds the event to every active virtual sensor consuming its source,
//!    dispatching the derived events depth-first before moving on
//! 3. writes the event to every listening client's event channel
//!
//! Listener channels are collected under the client registry lock and
//! written after it is released. A failing channel is detached and closed
//! without affecting the other listeners.
//!
//! Dispatching and replaying share one delivery lock. A replay therefore
//! never interleaves with the fan-out of a newer record event, and a client
//! always ends on the latest retained state.

use crate::clients::ClientSessionRegistry;
use crate::core::{ClientId, DisplayStateSource, HubError, Result};
use crate::events::active::ActiveVirtualSensors;
use crate::events::queue::{EventQueue, HubEvent};
use crate::events::sink::SinkHandle;
use crate::sensors::SensorRegistry;
use ahash::AHashMap;
use parking_lot::Mutex;
use sensord_protocol::{EventType, SensorEvent, SensorId};
use std::os::unix::net::UnixListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Bound on virtual-on-virtual chains (fusion → gravity → linear_accel is 3)
const MAX_SYNTHESIS_DEPTH: usize = 8;

pub struct EventDispatcher {
    queue: Arc<EventQueue>,
    clients: Arc<ClientSessionRegistry>,
    sensors: Arc<SensorRegistry>,
    active: Arc<ActiveVirtualSensors>,
    display: Arc<dyn DisplayStateSource>,
    last_events: Mutex<AHashMap<EventType, SensorEvent>>,
    delivery: Mutex<()>,
}

impl EventDispatcher {
    pub fn new(
        queue: Arc<EventQueue>,
        clients: Arc<ClientSessionRegistry>,
        sensors: Arc<SensorRegistry>,
        active: Arc<ActiveVirtualSensors>,
        display: Arc<dyn DisplayStateSource>,
    ) -> Self {
        Self {
            queue,
            clients,
            sensors,
            active,
            display,
            last_events: Mutex::new(AHashMap::new()),
            delivery: Mutex::new(()),
        }
    }

    pub fn clients(&self) -> &Arc<ClientSessionRegistry> {
        &self.clients
    }

    /// Start the event-channel acceptor and the drain thread
    pub fn run(self: &Arc<Self>, event_listener: UnixListener) -> Result<Vec<JoinHandle<()>>> {
        let acceptor = crate::transports::uds::spawn_event_acceptor(event_listener, Arc::clone(self))?;
        let drain = self.spawn_drain()?;
        Ok(vec![acceptor, drain])
    }

    /// Drain the queue on a dedicated thread for the life of the process
    pub fn spawn_drain(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let dispatcher = Arc::clone(self);
        thread::Builder::new()
            .name("event-dispatcher".to_string())
            .spawn(move || {
                info!("🦀 [DISPATCHER] Drain loop started");
                loop {
                    let event = dispatcher.queue.pop();
                    dispatcher.dispatch(&event);
                }
            })
            .map_err(|e| HubError::AllocationFailure(format!("dispatcher thread: {}", e)))
    }

    /// Route one event; see the module docs for the steps
    pub fn dispatch(&self, event: &HubEvent) {
        let _delivery = self.delivery.lock();
        self.dispatch_at_depth(event, 0);
    }

    fn dispatch_at_depth(&self, event: &HubEvent, depth: usize) {
        if let HubEvent::Sensor(sensor_event) = event {
            if sensor_event.event_type.is_record_event() {
                self.last_events
                    .lock()
                    .insert(sensor_event.event_type, *sensor_event);
            }
            if depth < MAX_SYNTHESIS_DEPTH {
                self.synthesize(sensor_event, depth);
            } else {
                warn!(
                    "🦀 [DISPATCHER] ⚠️ Synthesis chain from {} exceeds depth {}",
                    sensor_event.sensor_id, MAX_SYNTHESIS_DEPTH
                );
            }
        }
        self.fan_out(event);
    }

    fn synthesize(&self, event: &SensorEvent, depth: usize) {
        if self.active.is_empty() {
            return;
        }
        for sensor in self.sensors.all_virtual() {
            if !self.active.contains(sensor.id()) {
                continue;
            }
            let Some(synthesizable) = sensor.as_synthesizable() else {
                continue;
            };
            if !synthesizable.upstream_ids().contains(&event.sensor_id) {
                continue;
            }
            for derived in synthesizable.synthesize(event) {
                self.dispatch_at_depth(&HubEvent::Sensor(derived), depth + 1);
            }
        }
    }

    fn fan_out(&self, event: &HubEvent) {
        let screen_off = self.display.is_screen_off();
        let listeners =
            self.clients
                .get_listener_channels(event.sensor_id(), event.event_type(), screen_off);
        if listeners.is_empty() {
            return;
        }
        let bytes = event.to_bytes();
        for (client_id, channel) in listeners {
            if let Err(e) = channel.send(&bytes) {
                warn!(
                    "🦀 [DISPATCHER] ⚠️ Event channel of client {} failed, detaching: {}",
                    client_id, e
                );
                self.drop_channel(client_id, &channel);
            }
        }
    }

    fn drop_channel(&self, client_id: ClientId, channel: &SinkHandle) {
        channel.close();
        if let Some(current) = self.clients.event_channel(client_id) {
            if Arc::ptr_eq(&current, channel) {
                self.clients.detach_event_channel(client_id);
            }
        }
    }

    /// Replay retained record events of `sensor_id` to a client that just
    /// started or registered
    pub fn request_last_event(&self, client_id: ClientId, sensor_id: SensorId) -> Result<usize> {
        let _delivery = self.delivery.lock();
        if !self.clients.is_started(client_id, sensor_id)? {
            return Ok(0);
        }
        let Some(channel) = self.clients.event_channel(client_id) else {
            return Ok(0);
        };
        let events: Vec<SensorEvent> = {
            let registered = self.clients.get_registered_events(client_id, sensor_id)?;
            let last_events = self.last_events.lock();
            registered
                .iter()
                .filter_map(|event_type| last_events.get(event_type))
                .filter(|event| event.sensor_id == sensor_id)
                .copied()
                .collect()
        };

        for event in &events {
            if let Err(e) = channel.send(&event.to_bytes()) {
                warn!(
                    "🦀 [DISPATCHER] ⚠️ Replay to client {} failed, detaching: {}",
                    client_id, e
                );
                self.drop_channel(client_id, &channel);
                return Err(HubError::Io(e));
            }
        }
        if !events.is_empty() {
            debug!(
                "🦀 [DISPATCHER] Replayed {} record event(s) of {} to client {}",
                events.len(),
                sensor_id,
                client_id
            );
        }
        Ok(events.len())
    }

    /// Retained record event, if any
    pub fn last_event(&self, event_type: EventType) -> Option<SensorEvent> {
        self.last_events.lock().get(&event_type).copied()
    }

    /// Bind a handshaken event channel to its client
    pub fn attach_event_channel(&self, client_id: ClientId, channel: SinkHandle) -> Result<()> {
        self.clients.set_event_channel(client_id, channel)?;
        info!(
            "🦀 [DISPATCHER] Event channel attached for client {}",
            client_id
        );
        Ok(())
    }
}
