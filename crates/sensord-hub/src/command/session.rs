// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Protocol state machine of one command connection
//!
//! ```text
//! Connected ──hello──> Identified ──start──> Started ⇄ Stopped
//!     │                    │                    │
//!     └──────── byebye / disconnect ────────────┴──> Closed
//! ```
//!
//! Every failure is answered with a negative status; only the transport
//! decides to drop a connection.

use crate::clients::ClientSessionRegistry;
use crate::core::{ClientId, HubError, PermissionChecker, Result};
use crate::events::EventDispatcher;
use crate::sensors::{SensorHandle, SensorRegistry};
use sensord_protocol::{
    Command, CommandCode, EventType, Packet, Permission, Response, SensorData, SensorDescriptor,
    SensorId, SensorOption, SensorPrivilege,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Services shared by every command session
#[derive(Clone)]
pub struct HubServices {
    pub sensors: Arc<SensorRegistry>,
    pub clients: Arc<ClientSessionRegistry>,
    pub dispatcher: Arc<EventDispatcher>,
    pub permissions: Arc<dyn PermissionChecker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Identified,
    Started,
    Stopped,
    Closed,
}

pub struct CommandSession {
    services: HubServices,
    state: SessionState,
    client_id: Option<ClientId>,
    sensor: Option<SensorHandle>,
    permission: Permission,
    interval_set: bool,
}

impl CommandSession {
    pub fn new(services: HubServices) -> Self {
        let permission = services.permissions.default_permission();
        Self {
            services,
            state: SessionState::Connected,
            client_id: None,
            sensor: None,
            permission,
            interval_set: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn sensor_id(&self) -> Option<SensorId> {
        self.sensor.as_ref().map(|sensor| sensor.id())
    }

    /// Decode and execute one request packet
    pub fn handle_packet(&mut self, packet: &Packet) -> Response {
        match Command::from_packet(packet) {
            Ok(command) => self.handle(command),
            Err(e) => {
                warn!(
                    "🦀 [COMMAND] ⚠️ Malformed request (cmd {}) from client {:?}: {}",
                    packet.cmd, self.client_id, e
                );
                Response::Done(HubError::Protocol(e).status())
            }
        }
    }

    pub fn handle(&mut self, command: Command) -> Response {
        let code = command.code();
        match command {
            Command::GetId { pid } => match self.get_id(pid) {
                Ok(client_id) => Response::ClientId(client_id),
                Err(e) => self.failed(code, e),
            },
            Command::GetSensorList => Response::SensorList(self.sensor_list()),
            Command::GetData { data_type } => match self.get_data(data_type) {
                Ok(data) => Response::Data { state: 0, data },
                Err(e) => {
                    let state = e.status() as i32;
                    self.log_failure(code, &e);
                    Response::Data {
                        state,
                        data: SensorData::empty(),
                    }
                }
            },
            other => match self.execute(other) {
                Ok(()) => Response::Done(0),
                Err(e) => self.failed(code, e),
            },
        }
    }

    fn failed(&self, code: CommandCode, e: HubError) -> Response {
        self.log_failure(code, &e);
        Response::Done(e.status())
    }

    fn log_failure(&self, code: CommandCode, e: &HubError) {
        match e {
            HubError::PermissionDenied(_) => warn!(
                "🦀 [COMMAND] ⚠️ {:?} denied for client {:?}: {}",
                code, self.client_id, e
            ),
            _ => debug!(
                "🦀 [COMMAND] {:?} failed for client {:?}: {}",
                code, self.client_id, e
            ),
        }
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Hello { client_id, sensor } => self.hello(client_id, sensor),
            Command::Byebye => {
                self.close();
                Ok(())
            }
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Register { event_type } => self.register_event(event_type),
            Command::Unregister { event_type } => {
                let (client_id, sensor) = self.bound()?;
                self.services
                    .clients
                    .unregister_event(client_id, sensor.id(), event_type)
            }
            Command::SetOption { option } => {
                let (client_id, sensor) = self.bound()?;
                let option = SensorOption::from_i32(option)
                    .ok_or_else(|| HubError::InvalidArgument(format!("option {}", option)))?;
                self.services.clients.set_option(client_id, sensor.id(), option)
            }
            Command::SetInterval { interval_ms } => self.set_interval(interval_ms),
            Command::UnsetInterval => self.unset_interval(),
            Command::SetCommand { cmd, value } => {
                let (_, sensor) = self.bound()?;
                sensor.set_command(cmd, value)
            }
            Command::SendSensorhubData { data } => {
                let (_, sensor) = self.bound()?;
                sensor.send_sensorhub_data(&data)
            }
            other @ (Command::GetId { .. } | Command::GetSensorList | Command::GetData { .. }) => {
                Err(HubError::InvalidArgument(format!(
                    "{:?} has a dedicated answer",
                    other.code()
                )))
            }
        }
    }

    fn get_id(&mut self, pid: i32) -> Result<ClientId> {
        if self.sensor.is_some() {
            return Err(HubError::InvalidArgument(
                "session is already bound to a sensor".to_string(),
            ));
        }
        if self.state == SessionState::Closed {
            return Err(HubError::NotBound);
        }
        let clients = &self.services.clients;
        let permission = self.services.permissions.permission_for(pid);
        let client_id = clients.create_client(pid, permission);
        clients.attach_session(client_id)?;
        if let Some(previous) = self.client_id.replace(client_id) {
            let _ = clients.detach_session(previous);
        }
        self.permission = permission;
        Ok(client_id)
    }

    /// Public sensors this session is allowed to use
    fn sensor_list(&self) -> Vec<SensorDescriptor> {
        self.services
            .sensors
            .descriptors()
            .into_iter()
            .filter(|d| d.privilege == SensorPrivilege::Public)
            .filter(|d| self.permission.contains(d.sensor_type.required_permission()))
            .collect()
    }

    fn hello(&mut self, client_id: ClientId, sensor_id: SensorId) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(HubError::InvalidArgument(format!(
                "session is {:?}, hello needs a fresh session",
                self.state
            )));
        }
        let clients = &self.services.clients;
        let permission = clients.permission(client_id)?;
        let sensor = self.services.sensors.resolve_sensor_by_id(sensor_id)?;
        if sensor.descriptor().privilege != SensorPrivilege::Public {
            return Err(HubError::PermissionDenied(format!(
                "{} is internal",
                sensor_id
            )));
        }
        if !permission.contains(sensor.sensor_type().required_permission()) {
            return Err(HubError::PermissionDenied(format!(
                "client {} may not use {}",
                client_id, sensor_id
            )));
        }
        // One session per (client, sensor); the claim is atomic
        clients.claim_sensor_usage(client_id, sensor_id)?;
        if self.client_id != Some(client_id) {
            if let Err(e) = clients.attach_session(client_id) {
                let _ = clients.remove_sensor_usage(client_id, sensor_id);
                return Err(e);
            }
            if let Some(previous) = self.client_id.replace(client_id) {
                let _ = clients.detach_session(previous);
            }
        }

        self.permission = permission;
        self.sensor = Some(sensor);
        self.state = SessionState::Identified;
        info!(
            "🦀 [COMMAND] Client {} bound to sensor {}",
            client_id, sensor_id
        );
        Ok(())
    }

    /// Client and sensor of a hello'd session that may still use the sensor
    fn bound(&self) -> Result<(ClientId, SensorHandle)> {
        let (Some(client_id), Some(sensor)) = (self.client_id, self.sensor.as_ref()) else {
            return Err(HubError::NotBound);
        };
        let required = sensor.sensor_type().required_permission();
        if !self.permission.contains(required) {
            return Err(HubError::PermissionDenied(format!(
                "client {} may not use {}",
                client_id,
                sensor.id()
            )));
        }
        Ok((client_id, Arc::clone(sensor)))
    }

    fn start(&mut self) -> Result<()> {
        let (client_id, sensor) = self.bound()?;
        if self.state == SessionState::Started {
            return Ok(());
        }
        sensor.start()?;
        if let Err(e) = self.services.clients.set_start(client_id, sensor.id(), true) {
            let _ = sensor.stop();
            return Err(e);
        }
        self.state = SessionState::Started;
        debug!("🦀 [COMMAND] Client {} started {}", client_id, sensor.id());
        self.replay_last_events(client_id, sensor.id());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let (client_id, sensor) = self.bound()?;
        if self.state != SessionState::Started {
            return Ok(());
        }
        self.services.clients.set_start(client_id, sensor.id(), false)?;
        self.state = SessionState::Stopped;
        sensor.stop()?;
        debug!("🦀 [COMMAND] Client {} stopped {}", client_id, sensor.id());
        Ok(())
    }

    fn register_event(&mut self, event_type: EventType) -> Result<()> {
        let (client_id, sensor) = self.bound()?;
        if !sensor.descriptor().supports_event(event_type) {
            return Err(HubError::InvalidArgument(format!(
                "{} does not emit {}",
                sensor.id(),
                event_type
            )));
        }
        self.services
            .clients
            .register_event(client_id, sensor.id(), event_type)?;
        if self.state == SessionState::Started {
            self.replay_last_events(client_id, sensor.id());
        }
        Ok(())
    }

    fn replay_last_events(&self, client_id: ClientId, sensor_id: SensorId) {
        if let Err(e) = self
            .services
            .dispatcher
            .request_last_event(client_id, sensor_id)
        {
            debug!(
                "🦀 [COMMAND] No replay for client {} on {}: {}",
                client_id, sensor_id, e
            );
        }
    }

    fn set_interval(&mut self, interval_ms: u32) -> Result<()> {
        let (client_id, sensor) = self.bound()?;
        if interval_ms == 0 {
            return Err(HubError::InvalidArgument("interval must be positive".to_string()));
        }
        sensor.add_interval(client_id as i64, interval_ms, false)?;
        self.interval_set = true;
        self.services
            .clients
            .set_interval(client_id, sensor.id(), interval_ms)
    }

    fn unset_interval(&mut self) -> Result<()> {
        let (client_id, sensor) = self.bound()?;
        self.services.clients.unset_interval(client_id, sensor.id())?;
        if self.interval_set {
            self.interval_set = false;
            sensor.delete_interval(client_id as i64, false)?;
        }
        Ok(())
    }

    fn get_data(&self, data_type: u32) -> Result<SensorData> {
        let (_, sensor) = self.bound()?;
        sensor.get_data(data_type)
    }

    /// Release everything this session holds; safe to call repeatedly
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let clients = Arc::clone(&self.services.clients);

        if let (Some(client_id), Some(sensor)) = (self.client_id, self.sensor.take()) {
            let sensor_id = sensor.id();
            if self.state == SessionState::Started {
                if let Err(e) = sensor.stop() {
                    warn!(
                        "🦀 [COMMAND] ⚠️ Stopping {} for client {} failed: {}",
                        sensor_id, client_id, e
                    );
                }
            }
            if self.interval_set {
                self.interval_set = false;
                if let Err(e) = sensor.delete_interval(client_id as i64, false) {
                    warn!(
                        "🦀 [COMMAND] ⚠️ Dropping interval of client {} on {} failed: {}",
                        client_id, sensor_id, e
                    );
                }
            }
            let _ = clients.remove_sensor_usage(client_id, sensor_id);
        }

        if let Some(client_id) = self.client_id.take() {
            if let Err(e) = clients.detach_session(client_id) {
                debug!("🦀 [COMMAND] Client {} already gone: {}", client_id, e);
            }
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AlwaysOnDisplay, ConfiguredPermissionChecker};
    use crate::events::{ActiveVirtualSensors, EventQueue};
    use crate::sensors::{PhysicalSensor, ScaleConversion, SimulatedHal};
    use sensord_config::PermissionsConfig;
    use sensord_protocol::SensorType;

    const BIO_PID: i32 = 4242;

    struct Hub {
        services: HubServices,
        accel_hal: Arc<SimulatedHal>,
    }

    fn add_sensor(
        sensors: &SensorRegistry,
        queue: &Arc<EventQueue>,
        sensor_type: SensorType,
    ) -> Arc<SimulatedHal> {
        let hal = Arc::new(SimulatedHal::injected(sensor_type, sensor_type.name()).unwrap());
        sensors.register_hal(hal.clone()).unwrap();
        sensors
            .register_sensor(Arc::new(PhysicalSensor::new(
                SensorId::new(sensor_type, 0),
                hal.clone(),
                Arc::new(ScaleConversion::new(1.0)),
                Arc::clone(queue),
                1000,
            )))
            .unwrap();
        hal
    }

    fn hub() -> Hub {
        let queue = Arc::new(EventQueue::new(64));
        let sensors = Arc::new(SensorRegistry::new());
        let clients = Arc::new(ClientSessionRegistry::new());
        let accel_hal = add_sensor(&sensors, &queue, SensorType::Accelerometer);
        add_sensor(&sensors, &queue, SensorType::BioHrm);
        let dispatcher = Arc::new(EventDispatcher::new(
            queue,
            Arc::clone(&clients),
            Arc::clone(&sensors),
            Arc::new(ActiveVirtualSensors::new()),
            Arc::new(AlwaysOnDisplay),
        ));
        let permissions = ConfiguredPermissionChecker::new(&PermissionsConfig {
            grant_all_bio: false,
            bio_pids: vec![BIO_PID],
        });
        Hub {
            services: HubServices {
                sensors,
                clients,
                dispatcher,
                permissions: Arc::new(permissions),
            },
            accel_hal,
        }
    }

    fn accel() -> SensorId {
        SensorId::new(SensorType::Accelerometer, 0)
    }

    fn bound_session(hub: &Hub, pid: i32, sensor: SensorId) -> CommandSession {
        let mut session = CommandSession::new(hub.services.clone());
        let Response::ClientId(client_id) = session.handle(Command::GetId { pid }) else {
            panic!("get_id must answer with a client id");
        };
        assert_eq!(
            session.handle(Command::Hello { client_id, sensor }),
            Response::Done(0)
        );
        session
    }

    #[test]
    fn test_first_client_scenario() {
        let hub = hub();
        let mut session = CommandSession::new(hub.services.clone());
        assert_eq!(session.handle(Command::GetId { pid: 10 }), Response::ClientId(1));
        assert_eq!(
            session.handle(Command::Hello {
                client_id: 1,
                sensor: accel()
            }),
            Response::Done(0)
        );
        assert_eq!(session.state(), SessionState::Identified);
        assert_eq!(
            session.handle(Command::Register {
                event_type: EventType::raw_data(SensorType::Accelerometer)
            }),
            Response::Done(0)
        );
        assert_eq!(
            session.handle(Command::SetInterval { interval_ms: 100 }),
            Response::Done(0)
        );
        assert_eq!(hub.accel_hal.interval_ms(), 100);
        assert_eq!(hub.services.clients.get_min_interval(accel()), 100);
    }

    #[test]
    fn test_commands_before_hello_are_not_bound() {
        let hub = hub();
        let mut session = CommandSession::new(hub.services.clone());
        let not_bound = Response::Done(HubError::NotBound.status());
        assert_eq!(session.handle(Command::Start), not_bound);
        assert_eq!(
            session.handle(Command::SetInterval { interval_ms: 10 }),
            not_bound
        );
        assert!(matches!(
            session.handle(Command::GetData { data_type: 0 }),
            Response::Data { state: -107, .. }
        ));
    }

    #[test]
    fn test_hello_validation() {
        let hub = hub();
        let mut session = CommandSession::new(hub.services.clone());
        assert_eq!(
            session.handle(Command::Hello {
                client_id: 99,
                sensor: accel()
            }),
            Response::Done(-22)
        );
        let Response::ClientId(client_id) = session.handle(Command::GetId { pid: 1 }) else {
            panic!("expected client id");
        };
        assert_eq!(
            session.handle(Command::Hello {
                client_id,
                sensor: SensorId::new(SensorType::Light, 0)
            }),
            Response::Done(-2)
        );
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_bio_sensor_needs_permission() {
        let hub = hub();
        let bio = SensorId::new(SensorType::BioHrm, 0);

        let mut standard = CommandSession::new(hub.services.clone());
        let Response::ClientId(client_id) = standard.handle(Command::GetId { pid: 1 }) else {
            panic!("expected client id");
        };
        let Response::SensorList(list) = standard.handle(Command::GetSensorList) else {
            panic!("expected sensor list");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, accel());
        assert_eq!(
            standard.handle(Command::Hello {
                client_id,
                sensor: bio
            }),
            Response::Done(-13)
        );

        let mut privileged = CommandSession::new(hub.services.clone());
        privileged.handle(Command::GetId { pid: BIO_PID });
        let Response::SensorList(list) = privileged.handle(Command::GetSensorList) else {
            panic!("expected sensor list");
        };
        assert_eq!(list.len(), 2);
        let _session = bound_session(&hub, BIO_PID, bio);
    }

    #[test]
    fn test_byebye_without_hello() {
        let hub = hub();
        let mut session = CommandSession::new(hub.services.clone());
        assert_eq!(session.handle(Command::Byebye), Response::Done(0));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.handle(Command::Byebye), Response::Done(0));
        assert_eq!(hub.services.clients.client_count(), 0);
    }

    #[test]
    fn test_start_is_reference_counted_across_clients() {
        let hub = hub();
        let mut first = bound_session(&hub, 1, accel());
        let mut second = bound_session(&hub, 2, accel());

        assert_eq!(first.handle(Command::Start), Response::Done(0));
        assert_eq!(first.handle(Command::Start), Response::Done(0));
        assert_eq!(second.handle(Command::Start), Response::Done(0));
        assert!(hub.accel_hal.is_enabled());

        first.close();
        assert!(hub.accel_hal.is_enabled());
        assert_eq!(second.handle(Command::Stop), Response::Done(0));
        assert_eq!(second.state(), SessionState::Stopped);
        assert!(!hub.accel_hal.is_enabled());
        assert_eq!(second.handle(Command::Start), Response::Done(0));
        assert!(hub.accel_hal.is_enabled());
    }

    #[test]
    fn test_interval_recomputed_when_client_leaves() {
        let hub = hub();
        let mut slow = bound_session(&hub, 1, accel());
        let mut fast = bound_session(&hub, 2, accel());
        slow.handle(Command::SetInterval { interval_ms: 200 });
        fast.handle(Command::SetInterval { interval_ms: 50 });
        assert_eq!(hub.accel_hal.interval_ms(), 50);

        fast.handle(Command::Byebye);
        assert_eq!(hub.accel_hal.interval_ms(), 200);
        assert_eq!(hub.services.clients.get_min_interval(accel()), 200);

        slow.handle(Command::UnsetInterval);
        assert_eq!(hub.accel_hal.interval_ms(), 1000);
    }

    #[test]
    fn test_event_registration_errors() {
        let hub = hub();
        let mut session = bound_session(&hub, 1, accel());
        let raw = EventType::raw_data(SensorType::Accelerometer);
        assert_eq!(
            session.handle(Command::Register { event_type: raw }),
            Response::Done(0)
        );
        assert_eq!(
            session.handle(Command::Register { event_type: raw }),
            Response::Done(-17)
        );
        assert_eq!(
            session.handle(Command::Register {
                event_type: EventType::raw_data(SensorType::Gyroscope)
            }),
            Response::Done(-22)
        );
        assert_eq!(
            session.handle(Command::Unregister { event_type: raw }),
            Response::Done(0)
        );
        assert_eq!(
            session.handle(Command::Unregister { event_type: raw }),
            Response::Done(-22)
        );
        assert_eq!(
            session.handle(Command::SetOption { option: 7 }),
            Response::Done(-22)
        );
    }

    #[test]
    fn test_get_data_before_first_sample() {
        let hub = hub();
        let mut session = bound_session(&hub, 1, accel());
        assert!(matches!(
            session.handle(Command::GetData { data_type: 0 }),
            Response::Data { state: -61, .. }
        ));
    }

    #[test]
    fn test_malformed_packet_keeps_session() {
        let hub = hub();
        let mut session = bound_session(&hub, 1, accel());
        assert_eq!(
            session.handle_packet(&Packet::new(77, Vec::new())),
            Response::Done(-74)
        );
        assert_eq!(
            session.handle_packet(&Packet::new(CommandCode::SetInterval as i32, vec![1])),
            Response::Done(-74)
        );
        assert_eq!(session.state(), SessionState::Identified);
    }

    #[test]
    fn test_teardown_removes_client_and_usage() {
        let hub = hub();
        let mut session = bound_session(&hub, 1, accel());
        let client_id = session.client_id().unwrap();
        session.handle(Command::Register {
            event_type: EventType::raw_data(SensorType::Accelerometer),
        });
        session.handle(Command::Start);
        drop(session);

        assert!(!hub.services.clients.has_client(client_id));
        assert!(!hub.accel_hal.is_enabled());
        assert!(hub
            .services
            .clients
            .get_listener_ids(accel(), EventType::raw_data(SensorType::Accelerometer))
            .is_empty());
    }

    #[test]
    fn test_second_session_of_a_client_shares_it() {
        let hub = hub();
        let mut first = bound_session(&hub, 1, accel());
        let client_id = first.client_id().unwrap();
        let mut second = CommandSession::new(hub.services.clone());
        assert_eq!(
            second.handle(Command::Hello {
                client_id,
                sensor: SensorId::new(SensorType::BioHrm, 0)
            }),
            Response::Done(-13)
        );
        assert_eq!(
            second.handle(Command::Hello {
                client_id,
                sensor: accel()
            }),
            Response::Done(-17)
        );

        first.close();
        assert!(!hub.services.clients.has_client(client_id));
        drop(second);
    }
}
