// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command channel requests and responses

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptor::SensorDescriptor;
use crate::event::SensorData;
use crate::packet::Packet;
use crate::sensor_type::{EventType, SensorId};
use crate::{ensure_len, ProtocolError, Result};

/// On-wire command codes
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Done = -1,
    None = 0,
    GetId = 1,
    GetSensorList = 2,
    Hello = 3,
    Byebye = 4,
    Start = 5,
    Stop = 6,
    Reg = 7,
    Unreg = 8,
    SetOption = 9,
    SetInterval = 10,
    UnsetInterval = 11,
    SetCommand = 12,
    GetData = 13,
    SendSensorhubData = 14,
}

impl CommandCode {
    pub fn from_i32(value: i32) -> Option<CommandCode> {
        use CommandCode::*;
        Some(match value {
            -1 => Done,
            0 => None,
            1 => GetId,
            2 => GetSensorList,
            3 => Hello,
            4 => Byebye,
            5 => Start,
            6 => Stop,
            7 => Reg,
            8 => Unreg,
            9 => SetOption,
            10 => SetInterval,
            11 => UnsetInterval,
            12 => SetCommand,
            13 => GetData,
            14 => SendSensorhubData,
            _ => return Option::None,
        })
    }
}

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetId { pid: i32 },
    GetSensorList,
    Hello { client_id: i32, sensor: SensorId },
    Byebye,
    Start,
    Stop,
    Register { event_type: EventType },
    Unregister { event_type: EventType },
    /// Raw option value; range checked by the session
    SetOption { option: i32 },
    SetInterval { interval_ms: u32 },
    UnsetInterval,
    SetCommand { cmd: u32, value: i64 },
    GetData { data_type: u32 },
    SendSensorhubData { data: Vec<u8> },
}

fn expect_size(cmd: CommandCode, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(ProtocolError::PayloadSize {
            cmd: cmd as i32,
            expected,
            got: payload.len(),
        });
    }
    Ok(())
}

impl Command {
    pub fn code(&self) -> CommandCode {
        match self {
            Command::GetId { .. } => CommandCode::GetId,
            Command::GetSensorList => CommandCode::GetSensorList,
            Command::Hello { .. } => CommandCode::Hello,
            Command::Byebye => CommandCode::Byebye,
            Command::Start => CommandCode::Start,
            Command::Stop => CommandCode::Stop,
            Command::Register { .. } => CommandCode::Reg,
            Command::Unregister { .. } => CommandCode::Unreg,
            Command::SetOption { .. } => CommandCode::SetOption,
            Command::SetInterval { .. } => CommandCode::SetInterval,
            Command::UnsetInterval => CommandCode::UnsetInterval,
            Command::SetCommand { .. } => CommandCode::SetCommand,
            Command::GetData { .. } => CommandCode::GetData,
            Command::SendSensorhubData { .. } => CommandCode::SendSensorhubData,
        }
    }

    /// Decode a request packet
    ///
    /// # Errors
    /// `UnknownCommand` for codes outside the request set, `PayloadSize` /
    /// `Truncated` for payloads that do not match the command's struct.
    pub fn from_packet(packet: &Packet) -> Result<Command> {
        let code = CommandCode::from_i32(packet.cmd)
            .ok_or(ProtocolError::UnknownCommand(packet.cmd))?;
        let p = packet.payload.as_slice();

        let command = match code {
            CommandCode::Done | CommandCode::None => {
                return Err(ProtocolError::UnknownCommand(packet.cmd))
            }
            CommandCode::GetId => {
                expect_size(code, p, 4)?;
                Command::GetId {
                    pid: LittleEndian::read_i32(p),
                }
            }
            CommandCode::GetSensorList => Command::GetSensorList,
            CommandCode::Hello => {
                expect_size(code, p, 16)?;
                Command::Hello {
                    client_id: LittleEndian::read_i32(&p[0..4]),
                    sensor: SensorId::from_raw(LittleEndian::read_i64(&p[8..16])),
                }
            }
            CommandCode::Byebye => Command::Byebye,
            CommandCode::Start => Command::Start,
            CommandCode::Stop => Command::Stop,
            CommandCode::Reg => {
                expect_size(code, p, 4)?;
                Command::Register {
                    event_type: EventType::from_raw(LittleEndian::read_u32(p)),
                }
            }
            CommandCode::Unreg => {
                expect_size(code, p, 4)?;
                Command::Unregister {
                    event_type: EventType::from_raw(LittleEndian::read_u32(p)),
                }
            }
            CommandCode::SetOption => {
                expect_size(code, p, 4)?;
                Command::SetOption {
                    option: LittleEndian::read_i32(p),
                }
            }
            CommandCode::SetInterval => {
                expect_size(code, p, 4)?;
                Command::SetInterval {
                    interval_ms: LittleEndian::read_u32(p),
                }
            }
            CommandCode::UnsetInterval => Command::UnsetInterval,
            CommandCode::SetCommand => {
                expect_size(code, p, 16)?;
                Command::SetCommand {
                    cmd: LittleEndian::read_u32(&p[0..4]),
                    value: LittleEndian::read_i64(&p[8..16]),
                }
            }
            CommandCode::GetData => {
                expect_size(code, p, 4)?;
                Command::GetData {
                    data_type: LittleEndian::read_u32(p),
                }
            }
            CommandCode::SendSensorhubData => {
                ensure_len(p, 4)?;
                let declared = LittleEndian::read_i32(&p[0..4]);
                let data = &p[4..];
                if usize::try_from(declared).ok() != Some(data.len()) {
                    return Err(ProtocolError::PayloadSize {
                        cmd: packet.cmd,
                        expected: 4 + declared.max(0) as usize,
                        got: p.len(),
                    });
                }
                Command::SendSensorhubData {
                    data: data.to_vec(),
                }
            }
        };
        Ok(command)
    }

    /// Encode as a request packet (client side)
    pub fn to_packet(&self) -> Packet {
        let payload = match self {
            Command::GetId { pid } => i32_bytes(*pid),
            Command::Hello { client_id, sensor } => {
                let mut p = vec![0u8; 16];
                LittleEndian::write_i32(&mut p[0..4], *client_id);
                LittleEndian::write_i64(&mut p[8..16], sensor.raw());
                p
            }
            Command::Register { event_type } | Command::Unregister { event_type } => {
                u32_bytes(event_type.raw())
            }
            Command::SetOption { option } => i32_bytes(*option),
            Command::SetInterval { interval_ms } => u32_bytes(*interval_ms),
            Command::SetCommand { cmd, value } => {
                let mut p = vec![0u8; 16];
                LittleEndian::write_u32(&mut p[0..4], *cmd);
                LittleEndian::write_i64(&mut p[8..16], *value);
                p
            }
            Command::GetData { data_type } => u32_bytes(*data_type),
            Command::SendSensorhubData { data } => {
                let mut p = i32_bytes(data.len() as i32);
                p.extend_from_slice(data);
                p
            }
            Command::GetSensorList
            | Command::Byebye
            | Command::Start
            | Command::Stop
            | Command::UnsetInterval => Vec::new(),
        };
        Packet::new(self.code() as i32, payload)
    }
}

fn i32_bytes(value: i32) -> Vec<u8> {
    let mut p = vec![0u8; 4];
    LittleEndian::write_i32(&mut p, value);
    p
}

fn u32_bytes(value: u32) -> Vec<u8> {
    let mut p = vec![0u8; 4];
    LittleEndian::write_u32(&mut p, value);
    p
}

/// A server answer
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `CMD_DONE` + `cmd_done_t{value}`; negative values are error statuses
    Done(i64),
    /// `CMD_GET_ID` + `cmd_get_id_done_t{client_id}`
    ClientId(i32),
    /// `CMD_GET_SENSOR_LIST` + count + size-prefixed descriptors
    SensorList(Vec<SensorDescriptor>),
    /// `CMD_GET_DATA` + `cmd_get_data_done_t{state, data}`
    Data { state: i32, data: SensorData },
}

impl Response {
    pub fn to_packet(&self) -> Packet {
        match self {
            Response::Done(value) => {
                let mut p = vec![0u8; 8];
                LittleEndian::write_i64(&mut p, *value);
                Packet::new(CommandCode::Done as i32, p)
            }
            Response::ClientId(client_id) => {
                Packet::new(CommandCode::GetId as i32, i32_bytes(*client_id))
            }
            Response::SensorList(descriptors) => {
                let mut p = i32_bytes(descriptors.len() as i32);
                for descriptor in descriptors {
                    let bytes = descriptor.to_bytes();
                    let mut size = [0u8; 8];
                    LittleEndian::write_u64(&mut size, bytes.len() as u64);
                    p.extend_from_slice(&size);
                    p.extend_from_slice(&bytes);
                }
                Packet::new(CommandCode::GetSensorList as i32, p)
            }
            Response::Data { state, data } => {
                let mut p = vec![0u8; 8 + SensorData::SIZE];
                LittleEndian::write_i32(&mut p[0..4], *state);
                data.encode_into(&mut p[8..]);
                Packet::new(CommandCode::GetData as i32, p)
            }
        }
    }

    /// Decode an answer packet (client side)
    pub fn from_packet(packet: &Packet) -> Result<Response> {
        let p = packet.payload.as_slice();
        match CommandCode::from_i32(packet.cmd) {
            Some(CommandCode::Done) => {
                ensure_len(p, 8)?;
                Ok(Response::Done(LittleEndian::read_i64(p)))
            }
            Some(CommandCode::GetId) => {
                ensure_len(p, 4)?;
                Ok(Response::ClientId(LittleEndian::read_i32(p)))
            }
            Some(CommandCode::GetSensorList) => {
                ensure_len(p, 4)?;
                let count = LittleEndian::read_i32(&p[0..4]).max(0) as usize;
                let mut offset = 4;
                // Every entry carries at least its 8-byte length
                let mut descriptors = Vec::with_capacity(count.min(p.len() / 8));
                for _ in 0..count {
                    ensure_len(p, offset + 8)?;
                    let raw_size = LittleEndian::read_u64(&p[offset..offset + 8]);
                    offset += 8;
                    let end = usize::try_from(raw_size)
                        .ok()
                        .and_then(|size| offset.checked_add(size))
                        .ok_or_else(|| {
                            ProtocolError::InvalidField(format!("descriptor size {}", raw_size))
                        })?;
                    ensure_len(p, end)?;
                    descriptors.push(SensorDescriptor::from_bytes(&p[offset..end])?);
                    offset = end;
                }
                Ok(Response::SensorList(descriptors))
            }
            Some(CommandCode::GetData) => {
                ensure_len(p, 8 + SensorData::SIZE)?;
                Ok(Response::Data {
                    state: LittleEndian::read_i32(&p[0..4]),
                    data: SensorData::decode(&p[8..])?,
                })
            }
            _ => Err(ProtocolError::UnknownCommand(packet.cmd)),
        }
    }
}
