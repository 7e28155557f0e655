// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unix domain socket transport
//!
//! Two listening sockets: command connections get one worker thread each,
//! event connections are handshaken on the acceptor thread and then handed
//! to the dispatcher as write-only [`EventSink`]s.

use crate::command::{spawn_command_worker, HubServices};
use crate::core::{HubError, Result};
use crate::events::{EventDispatcher, EventSink};
use parking_lot::Mutex;
use sensord_protocol::EventChannelReady;
use std::fs;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a new event connection may take to send its handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// A client that stops reading must not stall the dispatcher for longer
const EVENT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Bind a listening socket, replacing a stale socket file
pub fn bind_listener(path: &Path, mode: u32) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        debug!("🦀 [UDS] Removing stale socket {}", path.display());
        fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    info!(
        "🦀 [UDS] Listening on {} (mode {:o})",
        path.display(),
        mode
    );
    Ok(listener)
}

/// Write half of a client's event connection
pub struct UnixEventChannel {
    stream: Mutex<UnixStream>,
}

impl UnixEventChannel {
    pub fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_write_timeout(Some(EVENT_WRITE_TIMEOUT))?;
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }
}

impl EventSink for UnixEventChannel {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        self.stream.lock().write_all(bytes)
    }

    fn close(&self) {
        let _ = self.stream.lock().shutdown(Shutdown::Both);
    }
}

/// Accept command connections forever, one worker thread per connection
pub fn spawn_command_acceptor(
    listener: UnixListener,
    services: HubServices,
    max_payload: usize,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("command-acceptor".to_string())
        .spawn(move || {
            info!("🦀 [UDS] Command acceptor started");
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        if let Err(e) = spawn_command_worker(stream, services.clone(), max_payload) {
                            warn!("🦀 [UDS] ⚠️ Could not start command worker: {}", e);
                        }
                    }
                    Err(e) => warn!("🦀 [UDS] ⚠️ Command accept failed: {}", e),
                }
            }
        })
        .map_err(|e| HubError::AllocationFailure(format!("command acceptor thread: {}", e)))
}

/// Accept event connections forever
pub fn spawn_event_acceptor(
    listener: UnixListener,
    dispatcher: Arc<EventDispatcher>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("event-acceptor".to_string())
        .spawn(move || {
            info!("🦀 [UDS] Event acceptor started");
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        if let Err(e) = accept_event_channel(stream, &dispatcher) {
                            warn!("🦀 [UDS] ⚠️ Event channel rejected: {}", e);
                        }
                    }
                    Err(e) => warn!("🦀 [UDS] ⚠️ Event accept failed: {}", e),
                }
            }
        })
        .map_err(|e| HubError::AllocationFailure(format!("event acceptor thread: {}", e)))
}

/// Handshake, attach, echo; on any error the stream is dropped (closed)
///
/// The channel is attached while its write lock is held, so the echo always
/// precedes the first event and a client that has read the echo is already
/// reachable.
fn accept_event_channel(mut stream: UnixStream, dispatcher: &EventDispatcher) -> Result<()> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let ready = EventChannelReady::read_from(&mut stream)?;
    stream.set_read_timeout(None)?;

    let client_id = ready.client_id;
    if !dispatcher.clients().has_client(client_id) {
        return Err(HubError::InvalidClient(client_id));
    }
    if dispatcher.clients().event_channel(client_id).is_some() {
        return Err(HubError::AlreadyRegistered(format!(
            "event channel of client {}",
            client_id
        )));
    }

    let channel = Arc::new(UnixEventChannel::new(stream.try_clone()?)?);
    let mut writer = channel.stream.lock();
    dispatcher.attach_event_channel(client_id, Arc::clone(&channel) as Arc<dyn EventSink>)?;
    if let Err(e) = writer.write_all(&ready.to_bytes()) {
        drop(writer);
        dispatcher.clients().detach_event_channel(client_id);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientSessionRegistry;
    use crate::core::AlwaysOnDisplay;
    use crate::events::{ActiveVirtualSensors, EventQueue};
    use crate::sensors::SensorRegistry;
    use sensord_protocol::Permission;
    use std::io::Read;

    fn dispatcher() -> Arc<EventDispatcher> {
        Arc::new(EventDispatcher::new(
            Arc::new(EventQueue::new(16)),
            Arc::new(ClientSessionRegistry::new()),
            Arc::new(SensorRegistry::new()),
            Arc::new(ActiveVirtualSensors::new()),
            Arc::new(AlwaysOnDisplay),
        ))
    }

    #[test]
    fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("event.sock");
        drop(bind_listener(&path, 0o666).unwrap());
        assert!(path.exists());

        let _listener = bind_listener(&path, 0o600).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_handshake_is_echoed_and_channel_attached() {
        let dispatcher = dispatcher();
        let client = dispatcher
            .clients()
            .create_client(1, Permission::STANDARD);
        let (server, mut peer) = UnixStream::pair().unwrap();

        peer.write_all(&EventChannelReady::new(client).to_bytes())
            .unwrap();
        accept_event_channel(server, &dispatcher).unwrap();

        let mut echo = [0u8; EventChannelReady::SIZE];
        peer.read_exact(&mut echo).unwrap();
        assert_eq!(EventChannelReady::from_bytes(&echo).unwrap().client_id, client);
        assert!(dispatcher.clients().event_channel(client).is_some());
    }

    #[test]
    fn test_handshake_for_unknown_client_closes_socket() {
        let dispatcher = dispatcher();
        let (server, mut peer) = UnixStream::pair().unwrap();
        peer.write_all(&EventChannelReady::new(42).to_bytes())
            .unwrap();

        assert!(matches!(
            accept_event_channel(server, &dispatcher),
            Err(HubError::InvalidClient(42))
        ));
        let mut buf = [0u8; 1];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dispatcher = dispatcher();
        let client = dispatcher
            .clients()
            .create_client(1, Permission::STANDARD);
        let (server, mut peer) = UnixStream::pair().unwrap();
        let mut bytes = EventChannelReady::new(client).to_bytes();
        bytes[0] = 0xAB;
        peer.write_all(&bytes).unwrap();

        assert!(matches!(
            accept_event_channel(server, &dispatcher),
            Err(HubError::Protocol(_))
        ));
        assert!(dispatcher.clients().event_channel(client).is_none());
    }
}
