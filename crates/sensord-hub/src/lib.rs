// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! sensord hub
//!
//! Multiplexes physical and virtual sensors into per-client event streams.
//!
//! # Architecture
//!
//! - **`core/`**: error taxonomy, hub configuration, permission and display hooks
//! - **`sensors/`**: sensor registry, HAL abstraction, pollers, plugin loading
//! - **`fusion/`**: virtual sensors synthesized from upstream events
//! - **`events/`**: event queue, dispatcher, client event sinks
//! - **`clients/`**: client and subscription bookkeeping
//! - **`command/`**: per-connection command protocol state machine
//! - **`transports/`**: Unix domain socket listeners
//!
//! ```text
//! HAL ─> poller ─> EventQueue ─> EventDispatcher ─┬─> virtual sensors ─┐
//!                                     ▲           └─> client sinks     │
//!                                     └────────── derived events ──────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sensord_config::SensordConfig;
//! use sensord_hub::{BuiltinPluginLoader, SensorHub};
//!
//! let config = SensordConfig::default();
//! let hub = SensorHub::from_config(&config);
//! hub.load_plugins(&BuiltinPluginLoader::new(&config));
//! hub.start().unwrap();
//! ```

use parking_lot::{Mutex, RwLock};
use sensord_config::SensordConfig;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

pub mod clients;
pub mod command;
pub mod core;
pub mod events;
pub mod fusion;
pub mod sensors;
pub mod transports;

pub use crate::core::{
    now_micros, AlwaysOnDisplay, ClientId, ConfiguredPermissionChecker, DisplayStateSource,
    HubConfig, HubError, PermissionChecker, Result, SwitchableDisplay,
};
pub use clients::{ClientSession, ClientSessionRegistry, SensorUsage};
pub use command::{CommandSession, HubServices, SessionState};
pub use events::{ActiveVirtualSensors, EventDispatcher, EventQueue, EventSink, HubEvent};
pub use fusion::{FusionSource, GRAVITY_EARTH};
pub use sensors::{
    load_plugins, BuiltinPluginLoader, LoadReport, PluginContext, PluginLoader, Sensor,
    SensorHal, SensorHandle, SensorRegistry, SimulatedHal, Synthesizable,
};

/// The daemon context: owns every shared service and the server threads
pub struct SensorHub {
    config: HubConfig,
    sensors: Arc<SensorRegistry>,
    clients: Arc<ClientSessionRegistry>,
    queue: Arc<EventQueue>,
    active: Arc<ActiveVirtualSensors>,
    dispatcher: Arc<EventDispatcher>,
    permissions: Arc<dyn PermissionChecker>,
    running: RwLock<bool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SensorHub {
    pub fn new(
        config: HubConfig,
        permissions: Arc<dyn PermissionChecker>,
        display: Arc<dyn DisplayStateSource>,
    ) -> Self {
        let sensors = Arc::new(SensorRegistry::new());
        let clients = Arc::new(ClientSessionRegistry::with_default_interval(
            config.default_interval_ms,
        ));
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        let active = Arc::new(ActiveVirtualSensors::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&queue),
            Arc::clone(&clients),
            Arc::clone(&sensors),
            Arc::clone(&active),
            display,
        ));
        Self {
            config,
            sensors,
            clients,
            queue,
            active,
            dispatcher,
            permissions,
            running: RwLock::new(false),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Hub with the configured permission grants and an always-on display
    pub fn from_config(config: &SensordConfig) -> Self {
        Self::new(
            HubConfig::from_config(config),
            Arc::new(ConfiguredPermissionChecker::new(&config.permissions)),
            Arc::new(AlwaysOnDisplay),
        )
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn sensors(&self) -> &Arc<SensorRegistry> {
        &self.sensors
    }

    pub fn clients(&self) -> &Arc<ClientSessionRegistry> {
        &self.clients
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn active_virtual_sensors(&self) -> &Arc<ActiveVirtualSensors> {
        &self.active
    }

    /// Context handed to sensor modules built by a [`PluginLoader`]
    pub fn plugin_context(&self) -> PluginContext {
        PluginContext {
            queue: Arc::clone(&self.queue),
            active: Arc::clone(&self.active),
            default_interval_ms: self.config.default_interval_ms,
        }
    }

    pub fn load_plugins(&self, loader: &dyn PluginLoader) -> LoadReport {
        load_plugins(loader, &self.sensors, &self.plugin_context())
    }

    pub fn services(&self) -> HubServices {
        HubServices {
            sensors: Arc::clone(&self.sensors),
            clients: Arc::clone(&self.clients),
            dispatcher: Arc::clone(&self.dispatcher),
            permissions: Arc::clone(&self.permissions),
        }
    }

    /// Bind both sockets and start the dispatcher and acceptor threads
    ///
    /// The threads run for the life of the process.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.write();
        if *running {
            return Err(HubError::AlreadyRegistered("hub is already running".to_string()));
        }

        info!(
            "🦀 [HUB] Starting with {} sensors",
            self.sensors.sensor_count()
        );
        let event_listener =
            transports::bind_listener(&self.config.event_socket, self.config.socket_mode)?;
        let command_listener =
            transports::bind_listener(&self.config.command_socket, self.config.socket_mode)?;

        let mut threads = self.dispatcher.run(event_listener)?;
        threads.push(transports::spawn_command_acceptor(
            command_listener,
            self.services(),
            self.config.max_payload_bytes,
        )?);
        self.threads.lock().extend(threads);

        *running = true;
        info!(
            "🦀 [HUB] ✅ Serving commands on {} and events on {}",
            self.config.command_socket.display(),
            self.config.event_socket.display()
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }
}
