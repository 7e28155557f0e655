// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-client state

use crate::core::ClientId;
use crate::events::SinkHandle;
use ahash::AHashMap;
use sensord_protocol::{EventType, Permission, SensorId, SensorOption};
use std::collections::BTreeSet;

/// One client's subscription to one sensor
#[derive(Debug, Clone, Default)]
pub struct SensorUsage {
    pub events: BTreeSet<EventType>,
    pub interval_ms: Option<u32>,
    pub option: SensorOption,
    pub started: bool,
}

impl SensorUsage {
    /// Started and registered for `event_type`
    pub fn listens_to(&self, event_type: EventType) -> bool {
        self.started && self.events.contains(&event_type)
    }
}

/// A client as seen by the hub: identity, event channel, subscriptions
pub struct ClientSession {
    pub client_id: ClientId,
    pub pid: i32,
    pub permission: Permission,
    pub event_channel: Option<SinkHandle>,
    pub usages: AHashMap<SensorId, SensorUsage>,
    /// Command connections currently acting for this client
    pub(crate) attached_sessions: usize,
}

impl ClientSession {
    pub fn new(client_id: ClientId, pid: i32, permission: Permission) -> Self {
        Self {
            client_id,
            pid,
            permission,
            event_channel: None,
            usages: AHashMap::new(),
            attached_sessions: 0,
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("client_id", &self.client_id)
            .field("pid", &self.pid)
            .field("permission", &self.permission)
            .field("has_event_channel", &self.event_channel.is_some())
            .field("usages", &self.usages)
            .field("attached_sessions", &self.attached_sessions)
            .finish()
    }
}
