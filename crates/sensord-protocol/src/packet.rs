// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command channel framing: `{cmd: i32, pad: 4, payload_size: u64}` + payload

use byteorder::{ByteOrder, LittleEndian};
use std::io::{ErrorKind, Read, Write};

use crate::{ProtocolError, Result};

pub const PACKET_HEADER_SIZE: usize = 16;

/// One framed message on the command channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub cmd: i32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(cmd: i32, payload: Vec<u8>) -> Self {
        Self { cmd, payload }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; PACKET_HEADER_SIZE + self.payload.len()];
        LittleEndian::write_i32(&mut out[0..4], self.cmd);
        LittleEndian::write_u64(&mut out[8..16], self.payload.len() as u64);
        out[PACKET_HEADER_SIZE..].copy_from_slice(&self.payload);
        out
    }
}

fn read_exact_or_disconnect<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ProtocolError::Disconnected
        } else {
            ProtocolError::Io(e)
        }
    })
}

/// Read one packet, blocking until it is complete
///
/// # Errors
/// - `Disconnected` when the peer closes mid-stream or between packets
/// - `PayloadTooLarge` when the header announces more than `max_payload` bytes
///   (the payload is not consumed, so the stream is no longer usable)
pub fn read_packet<R: Read>(reader: &mut R, max_payload: usize) -> Result<Packet> {
    let mut header = [0u8; PACKET_HEADER_SIZE];
    read_exact_or_disconnect(reader, &mut header)?;

    let cmd = LittleEndian::read_i32(&header[0..4]);
    let size = LittleEndian::read_u64(&header[8..16]);
    if size > max_payload as u64 {
        return Err(ProtocolError::PayloadTooLarge {
            size,
            limit: max_payload,
        });
    }

    let mut payload = vec![0u8; size as usize];
    read_exact_or_disconnect(reader, &mut payload)?;
    Ok(Packet { cmd, payload })
}

/// Write one packet in a single buffer
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    writer.write_all(&packet.to_bytes())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_is_sixteen_bytes_with_padding() {
        let bytes = Packet::new(3, vec![0xAA; 5]).to_bytes();
        assert_eq!(bytes.len(), 21);
        assert_eq!(LittleEndian::read_i32(&bytes[0..4]), 3);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(LittleEndian::read_u64(&bytes[8..16]), 5);
    }

    #[test]
    fn reads_back_to_back_packets() {
        let mut stream = Packet::new(5, vec![]).to_bytes();
        stream.extend(Packet::new(7, vec![1, 0, 0, 0]).to_bytes());
        let mut cursor = Cursor::new(stream);

        assert_eq!(read_packet(&mut cursor, 1024).unwrap(), Packet::new(5, vec![]));
        assert_eq!(
            read_packet(&mut cursor, 1024).unwrap(),
            Packet::new(7, vec![1, 0, 0, 0])
        );
        assert!(matches!(
            read_packet(&mut cursor, 1024),
            Err(ProtocolError::Disconnected)
        ));
    }

    #[test]
    fn truncated_payload_is_a_disconnect() {
        let mut bytes = Packet::new(14, vec![9; 8]).to_bytes();
        bytes.truncate(PACKET_HEADER_SIZE + 3);
        let result = read_packet(&mut Cursor::new(bytes), 1024);
        assert!(matches!(result, Err(ProtocolError::Disconnected)));
    }

    #[test]
    fn oversized_payload_is_fatal() {
        let bytes = Packet::new(14, vec![0; 64]).to_bytes();
        let err = read_packet(&mut Cursor::new(bytes), 32).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { size: 64, limit: 32 }));
        assert!(err.is_fatal());
    }
}
