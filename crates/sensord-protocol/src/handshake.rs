// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event channel handshake (`event_channel_ready_t`)

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Write};

use crate::constants::EVENT_CHANNEL_MAGIC;
use crate::{ensure_len, ProtocolError, Result};

/// First message on a new event channel; echoed back by the server on accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventChannelReady {
    pub magic: u32,
    pub client_id: i32,
}

impl EventChannelReady {
    pub const SIZE: usize = 8;

    pub fn new(client_id: i32) -> Self {
        Self {
            magic: EVENT_CHANNEL_MAGIC,
            client_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut out[0..4], self.magic);
        LittleEndian::write_i32(&mut out[4..8], self.client_id);
        out
    }

    /// Parse and check the magic constant
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE)?;
        let magic = LittleEndian::read_u32(&bytes[0..4]);
        if magic != EVENT_CHANNEL_MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }
        Ok(Self {
            magic,
            client_id: LittleEndian::read_i32(&bytes[4..8]),
        })
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}
