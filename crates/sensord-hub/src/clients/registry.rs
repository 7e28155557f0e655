// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registry of connected clients and their sensor usages
//!
//! Every operation takes the one registry-wide mutex. Command rates are low
//! compared to sampling rates, and the dispatcher only reads here: it
//! collects listener channels under the lock and writes to them after
//! releasing it.
//!
//! A client lives as long as at least one command session is attached to
//! it. `get_id` and `hello` attach, session teardown detaches; the client is
//! removed with its last session.
//!
//! Usage records belong to `hello`: a session claims the record when it binds
//! a sensor and removes it on teardown. Event, interval, option and start
//! operations only edit an existing record and fail with `NotRegistered`
//! otherwise, so no record outlives the session that bound it.

use crate::clients::session::{ClientSession, SensorUsage};
use crate::core::{ClientId, HubError, Result};
use crate::events::SinkHandle;
use ahash::AHashMap;
use parking_lot::Mutex;
use sensord_protocol::{EventType, Permission, SensorId, SensorOption, SENSOR_INTERVAL_NORMAL_MS};
use tracing::{debug, info};

struct RegistryInner {
    next_client_id: ClientId,
    clients: AHashMap<ClientId, ClientSession>,
}

impl RegistryInner {
    fn client(&self, client_id: ClientId) -> Result<&ClientSession> {
        self.clients
            .get(&client_id)
            .ok_or(HubError::InvalidClient(client_id))
    }

    fn client_mut(&mut self, client_id: ClientId) -> Result<&mut ClientSession> {
        self.clients
            .get_mut(&client_id)
            .ok_or(HubError::InvalidClient(client_id))
    }

    fn usage_mut(&mut self, client_id: ClientId, sensor_id: SensorId) -> Result<&mut SensorUsage> {
        self.client_mut(client_id)?
            .usages
            .get_mut(&sensor_id)
            .ok_or_else(|| {
                HubError::NotRegistered(format!(
                    "client {} has not bound sensor {}",
                    client_id, sensor_id
                ))
            })
    }
}

pub struct ClientSessionRegistry {
    inner: Mutex<RegistryInner>,
    default_interval_ms: u32,
}

impl Default for ClientSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSessionRegistry {
    pub fn new() -> Self {
        Self::with_default_interval(SENSOR_INTERVAL_NORMAL_MS)
    }

    /// `default_interval_ms` is reported by `get_min_interval` for sensors
    /// nobody has set an interval on
    pub fn with_default_interval(default_interval_ms: u32) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_client_id: 1,
                clients: AHashMap::new(),
            }),
            default_interval_ms,
        }
    }

    /// Allocate a new client id; ids are never reused within a run
    pub fn create_client(&self, pid: i32, permission: Permission) -> ClientId {
        let mut inner = self.inner.lock();
        let client_id = inner.next_client_id;
        inner.next_client_id += 1;
        inner
            .clients
            .insert(client_id, ClientSession::new(client_id, pid, permission));
        info!(
            "🦀 [CLIENT-REGISTRY] Created client {} (pid {}, permission {:#x})",
            client_id,
            pid,
            permission.bits()
        );
        client_id
    }

    /// Drop a client with all its usages; its event channel is closed
    pub fn remove_client(&self, client_id: ClientId) -> Result<()> {
        let removed = self
            .inner
            .lock()
            .clients
            .remove(&client_id)
            .ok_or(HubError::InvalidClient(client_id))?;
        if let Some(channel) = removed.event_channel {
            channel.close();
        }
        info!("🦀 [CLIENT-REGISTRY] Removed client {}", client_id);
        Ok(())
    }

    pub fn has_client(&self, client_id: ClientId) -> bool {
        self.inner.lock().clients.contains_key(&client_id)
    }

    pub fn client_count(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn permission(&self, client_id: ClientId) -> Result<Permission> {
        Ok(self.inner.lock().client(client_id)?.permission)
    }

    /// Count one more command session acting for `client_id`
    pub fn attach_session(&self, client_id: ClientId) -> Result<()> {
        self.inner.lock().client_mut(client_id)?.attached_sessions += 1;
        Ok(())
    }

    /// Release one command session; returns true when this removed the client
    pub fn detach_session(&self, client_id: ClientId) -> Result<bool> {
        let removed = {
            let mut inner = self.inner.lock();
            let client = inner.client_mut(client_id)?;
            client.attached_sessions = client.attached_sessions.saturating_sub(1);
            if client.attached_sessions > 0 {
                return Ok(false);
            }
            inner.clients.remove(&client_id)
        };
        if let Some(channel) = removed.and_then(|client| client.event_channel) {
            channel.close();
        }
        info!(
            "🦀 [CLIENT-REGISTRY] Client {} has no sessions left, removed",
            client_id
        );
        Ok(true)
    }

    /// Create the usage record if it does not exist yet
    pub fn add_sensor_usage(&self, client_id: ClientId, sensor_id: SensorId) -> Result<()> {
        self.inner
            .lock()
            .client_mut(client_id)?
            .usages
            .entry(sensor_id)
            .or_default();
        debug!(
            "🦀 [CLIENT-REGISTRY] Client {} uses sensor {}",
            client_id, sensor_id
        );
        Ok(())
    }

    /// Create the usage record, failing with `AlreadyRegistered` when one
    /// exists; check and insert happen under one lock
    pub fn claim_sensor_usage(&self, client_id: ClientId, sensor_id: SensorId) -> Result<()> {
        let mut inner = self.inner.lock();
        let usages = &mut inner.client_mut(client_id)?.usages;
        if usages.contains_key(&sensor_id) {
            return Err(HubError::AlreadyRegistered(format!(
                "client {} already uses {}",
                client_id, sensor_id
            )));
        }
        usages.insert(sensor_id, SensorUsage::default());
        drop(inner);
        debug!(
            "🦀 [CLIENT-REGISTRY] Client {} claimed sensor {}",
            client_id, sensor_id
        );
        Ok(())
    }

    /// Remove the usage record; absent records are not an error
    pub fn remove_sensor_usage(&self, client_id: ClientId, sensor_id: SensorId) -> Result<()> {
        self.inner
            .lock()
            .client_mut(client_id)?
            .usages
            .remove(&sensor_id);
        Ok(())
    }

    pub fn has_sensor_usage(&self, client_id: ClientId, sensor_id: SensorId) -> bool {
        self.inner
            .lock()
            .clients
            .get(&client_id)
            .is_some_and(|client| client.usages.contains_key(&sensor_id))
    }

    pub fn register_event(
        &self,
        client_id: ClientId,
        sensor_id: SensorId,
        event_type: EventType,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let usage = inner.usage_mut(client_id, sensor_id)?;
        if !usage.events.insert(event_type) {
            return Err(HubError::AlreadyRegistered(format!(
                "client {} event {} on {}",
                client_id, event_type, sensor_id
            )));
        }
        Ok(())
    }

    pub fn unregister_event(
        &self,
        client_id: ClientId,
        sensor_id: SensorId,
        event_type: EventType,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let removed = inner
            .client_mut(client_id)?
            .usages
            .get_mut(&sensor_id)
            .is_some_and(|usage| usage.events.remove(&event_type));
        if !removed {
            return Err(HubError::NotRegistered(format!(
                "client {} event {} on {}",
                client_id, event_type, sensor_id
            )));
        }
        Ok(())
    }

    pub fn get_registered_events(
        &self,
        client_id: ClientId,
        sensor_id: SensorId,
    ) -> Result<Vec<EventType>> {
        let inner = self.inner.lock();
        Ok(inner
            .client(client_id)?
            .usages
            .get(&sensor_id)
            .map(|usage| usage.events.iter().copied().collect())
            .unwrap_or_default())
    }

    pub fn set_interval(
        &self,
        client_id: ClientId,
        sensor_id: SensorId,
        interval_ms: u32,
    ) -> Result<()> {
        if interval_ms == 0 {
            return Err(HubError::InvalidArgument("interval must be positive".to_string()));
        }
        self.inner.lock().usage_mut(client_id, sensor_id)?.interval_ms = Some(interval_ms);
        Ok(())
    }

    pub fn unset_interval(&self, client_id: ClientId, sensor_id: SensorId) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(usage) = inner.client_mut(client_id)?.usages.get_mut(&sensor_id) {
            usage.interval_ms = None;
        }
        Ok(())
    }

    /// Smallest interval any client set on `sensor_id`, or the default
    pub fn get_min_interval(&self, sensor_id: SensorId) -> u32 {
        self.inner
            .lock()
            .clients
            .values()
            .filter_map(|client| client.usages.get(&sensor_id))
            .filter_map(|usage| usage.interval_ms)
            .min()
            .unwrap_or(self.default_interval_ms)
    }

    pub fn set_option(
        &self,
        client_id: ClientId,
        sensor_id: SensorId,
        option: SensorOption,
    ) -> Result<()> {
        self.inner.lock().usage_mut(client_id, sensor_id)?.option = option;
        Ok(())
    }

    pub fn set_start(&self, client_id: ClientId, sensor_id: SensorId, started: bool) -> Result<()> {
        self.inner.lock().usage_mut(client_id, sensor_id)?.started = started;
        Ok(())
    }

    pub fn is_started(&self, client_id: ClientId, sensor_id: SensorId) -> Result<bool> {
        let inner = self.inner.lock();
        Ok(inner
            .client(client_id)?
            .usages
            .get(&sensor_id)
            .is_some_and(|usage| usage.started))
    }

    /// Started clients registered for `event_type` on `sensor_id`, ascending
    pub fn get_listener_ids(&self, sensor_id: SensorId, event_type: EventType) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self
            .inner
            .lock()
            .clients
            .values()
            .filter(|client| {
                client
                    .usages
                    .get(&sensor_id)
                    .is_some_and(|usage| usage.listens_to(event_type))
            })
            .map(|client| client.client_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Event channels of the listeners that should receive this event now
    ///
    /// With `screen_off` set, listeners whose option does not deliver in
    /// screen-off are left out.
    pub fn get_listener_channels(
        &self,
        sensor_id: SensorId,
        event_type: EventType,
        screen_off: bool,
    ) -> Vec<(ClientId, SinkHandle)> {
        let mut channels: Vec<(ClientId, SinkHandle)> = self
            .inner
            .lock()
            .clients
            .values()
            .filter_map(|client| {
                let usage = client.usages.get(&sensor_id)?;
                if !usage.listens_to(event_type) {
                    return None;
                }
                if screen_off && !usage.option.delivers_in_screen_off() {
                    return None;
                }
                let channel = client.event_channel.as_ref()?;
                Some((client.client_id, SinkHandle::clone(channel)))
            })
            .collect();
        channels.sort_unstable_by_key(|(client_id, _)| *client_id);
        channels
    }

    /// Attach the event channel; a client gets exactly one
    pub fn set_event_channel(&self, client_id: ClientId, channel: SinkHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        let client = inner.client_mut(client_id)?;
        if client.event_channel.is_some() {
            return Err(HubError::AlreadyRegistered(format!(
                "event channel of client {}",
                client_id
            )));
        }
        client.event_channel = Some(channel);
        Ok(())
    }

    pub fn event_channel(&self, client_id: ClientId) -> Option<SinkHandle> {
        self.inner
            .lock()
            .clients
            .get(&client_id)
            .and_then(|client| client.event_channel.clone())
    }

    /// Take the event channel away, leaving the client in place
    pub fn detach_event_channel(&self, client_id: ClientId) -> Option<SinkHandle> {
        self.inner
            .lock()
            .clients
            .get_mut(&client_id)
            .and_then(|client| client.event_channel.take())
    }
}
