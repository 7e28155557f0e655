// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Blocking read loop serving one command connection

use crate::command::session::{CommandSession, HubServices, SessionState};
use crate::core::{HubError, Result};
use sensord_protocol::{read_packet, write_packet, ProtocolError, Response};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Serve `stream` on its own thread until byebye or disconnect
pub fn spawn_command_worker(
    stream: UnixStream,
    services: HubServices,
    max_payload: usize,
) -> Result<JoinHandle<()>> {
    let worker_id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
    thread::Builder::new()
        .name(format!("command-worker-{}", worker_id))
        .spawn(move || {
            let mut stream = stream;
            let mut session = CommandSession::new(services);
            debug!("🦀 [COMMAND] Worker {} serving new connection", worker_id);
            match run_command_loop(&mut stream, &mut session, max_payload) {
                Ok(()) => debug!("🦀 [COMMAND] Worker {} finished", worker_id),
                Err(e) => warn!(
                    "🦀 [COMMAND] ⚠️ Worker {} dropped its connection: {}",
                    worker_id, e
                ),
            }
        })
        .map_err(|e| HubError::AllocationFailure(format!("command worker thread: {}", e)))
}

/// Read, execute and answer packets until the session closes
///
/// The session is always torn down before returning. Only framing errors
/// end the loop early; bad commands are answered and the loop continues.
pub fn run_command_loop<S: Read + Write>(
    stream: &mut S,
    session: &mut CommandSession,
    max_payload: usize,
) -> Result<()> {
    let outcome = serve(stream, session, max_payload);
    if let Some(client_id) = session.client_id() {
        info!(
            "🦀 [COMMAND] Connection of client {} closed ({:?})",
            client_id,
            session.state()
        );
    }
    session.close();
    outcome
}

fn serve<S: Read + Write>(
    stream: &mut S,
    session: &mut CommandSession,
    max_payload: usize,
) -> Result<()> {
    loop {
        let packet = match read_packet(stream, max_payload) {
            Ok(packet) => packet,
            Err(ProtocolError::Disconnected) => return Ok(()),
            Err(e @ ProtocolError::PayloadTooLarge { .. }) => {
                // The oversized payload is still in the stream, so answer and give up
                let error = HubError::Protocol(e);
                let _ = write_packet(stream, &Response::Done(error.status()).to_packet());
                return Err(error);
            }
            Err(e) => return Err(e.into()),
        };

        let response = session.handle_packet(&packet);
        write_packet(stream, &response.to_packet())?;
        if session.state() == SessionState::Closed {
            return Ok(());
        }
    }
}
