// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # sensord Wire Protocol
//!
//! Binary formats exchanged between the sensor daemon and its clients over the
//! two per-client Unix sockets:
//!
//! - **Command channel**: request/response [`Packet`]s. Requests decode into
//!   [`Command`], answers encode from [`Response`].
//! - **Event channel**: opened with an [`EventChannelReady`] handshake, then
//!   carries unsolicited [`SensorEvent`] / [`SensorhubEvent`] records.
//!
//! All structures are little-endian with C natural alignment, so unmodified
//! C clients can read them directly.
//!
//! ## Basic Usage
//!
//! ```rust
//! use sensord_protocol::{Command, Packet, SensorId, SensorType};
//!
//! let hello = Command::Hello {
//!     client_id: 1,
//!     sensor: SensorId::new(SensorType::Accelerometer, 0),
//! };
//! let packet = hello.to_packet();
//! assert_eq!(Command::from_packet(&packet).unwrap(), hello);
//! ```

pub mod command;
pub mod constants;
pub mod descriptor;
pub mod event;
pub mod handshake;
pub mod packet;
pub mod sensor_type;

pub use command::{Command, CommandCode, Response};
pub use constants::*;
pub use descriptor::SensorDescriptor;
pub use event::{SensorData, SensorEvent, SensorhubData, SensorhubEvent};
pub use handshake::EventChannelReady;
pub use packet::{read_packet, write_packet, Packet, PACKET_HEADER_SIZE};
pub use sensor_type::{EventType, SensorId, SensorType};

use thiserror::Error;

/// Errors raised while framing or decoding protocol data
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Peer closed the connection")]
    Disconnected,
    #[error("Truncated data: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("Unknown command code: {0}")]
    UnknownCommand(i32),
    #[error("Command {cmd} expects a {expected}-byte payload, got {got}")]
    PayloadSize { cmd: i32, expected: usize, got: usize },
    #[error("Payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: u64, limit: usize },
    #[error("Bad handshake magic: {0:#010x}")]
    BadMagic(u32),
    #[error("Too many values: {0}")]
    TooManyValues(usize),
    #[error("Invalid field: {0}")]
    InvalidField(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the stream can no longer be trusted for further packets
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Disconnected
                | ProtocolError::PayloadTooLarge { .. }
                | ProtocolError::Io(_)
        )
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

pub(crate) fn ensure_len(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            got: bytes.len(),
        });
    }
    Ok(())
}
