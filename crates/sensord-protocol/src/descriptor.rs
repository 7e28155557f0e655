// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static description of a sensor, as listed by `GET_SENSOR_LIST`

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

use crate::constants::SensorPrivilege;
use crate::sensor_type::{EventType, SensorId, SensorType};
use crate::{ProtocolError, Result};

/// Immutable once the owning sensor module is registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub sensor_type: SensorType,
    pub id: SensorId,
    pub privilege: SensorPrivilege,
    pub name: String,
    pub vendor: String,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
    pub min_interval_ms: i32,
    pub fifo_count: i32,
    pub max_batch_count: i32,
    pub supported_event_types: Vec<EventType>,
}

impl SensorDescriptor {
    pub fn supports_event(&self, event_type: EventType) -> bool {
        self.supported_event_types.contains(&event_type)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.name.len() + self.vendor.len());
        // Writes into a Vec cannot fail
        let _ = self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.write_i32::<LittleEndian>(self.sensor_type as i32)?;
        out.write_i64::<LittleEndian>(self.id.raw())?;
        out.write_i32::<LittleEndian>(self.privilege as i32)?;
        write_string(out, &self.name)?;
        write_string(out, &self.vendor)?;
        out.write_f32::<LittleEndian>(self.min_range)?;
        out.write_f32::<LittleEndian>(self.max_range)?;
        out.write_f32::<LittleEndian>(self.resolution)?;
        out.write_i32::<LittleEndian>(self.min_interval_ms)?;
        out.write_i32::<LittleEndian>(self.fifo_count)?;
        out.write_i32::<LittleEndian>(self.max_batch_count)?;
        out.write_u32::<LittleEndian>(self.supported_event_types.len() as u32)?;
        for event_type in &self.supported_event_types {
            out.write_u32::<LittleEndian>(event_type.raw())?;
        }
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        Self::read_from(&mut cursor).map_err(|e| match e {
            ProtocolError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                ProtocolError::Truncated {
                    needed: bytes.len() + 1,
                    got: bytes.len(),
                }
            }
            other => other,
        })
    }

    fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let raw_type = cursor.read_i32::<LittleEndian>()?;
        let sensor_type = SensorType::from_i32(raw_type)
            .ok_or_else(|| ProtocolError::InvalidField(format!("sensor type {}", raw_type)))?;
        let id = SensorId::from_raw(cursor.read_i64::<LittleEndian>()?);
        let raw_privilege = cursor.read_i32::<LittleEndian>()?;
        let privilege = SensorPrivilege::from_i32(raw_privilege)
            .ok_or_else(|| ProtocolError::InvalidField(format!("privilege {}", raw_privilege)))?;
        let name = read_string(cursor)?;
        let vendor = read_string(cursor)?;
        let min_range = cursor.read_f32::<LittleEndian>()?;
        let max_range = cursor.read_f32::<LittleEndian>()?;
        let resolution = cursor.read_f32::<LittleEndian>()?;
        let min_interval_ms = cursor.read_i32::<LittleEndian>()?;
        let fifo_count = cursor.read_i32::<LittleEndian>()?;
        let max_batch_count = cursor.read_i32::<LittleEndian>()?;
        let event_count = cursor.read_u32::<LittleEndian>()?;
        let mut supported_event_types = Vec::new();
        for _ in 0..event_count {
            supported_event_types.push(EventType::from_raw(cursor.read_u32::<LittleEndian>()?));
        }

        Ok(Self {
            sensor_type,
            id,
            privilege,
            name,
            vendor,
            min_range,
            max_range,
            resolution,
            min_interval_ms,
            fifo_count,
            max_batch_count,
            supported_event_types,
        })
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(value.len() as u32)?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if len as u64 > remaining {
        return Err(ProtocolError::Truncated {
            needed: len,
            got: remaining as usize,
        });
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| ProtocolError::InvalidField(format!("string: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel_descriptor() -> SensorDescriptor {
        SensorDescriptor {
            sensor_type: SensorType::Accelerometer,
            id: SensorId::new(SensorType::Accelerometer, 0),
            privilege: SensorPrivilege::Public,
            name: "sim-accel".to_string(),
            vendor: "sensord".to_string(),
            min_range: -19.6,
            max_range: 19.6,
            resolution: 0.01,
            min_interval_ms: 10,
            fifo_count: 0,
            max_batch_count: 0,
            supported_event_types: vec![EventType::raw_data(SensorType::Accelerometer)],
        }
    }

    #[test]
    fn descriptor_serializes_and_parses() {
        let descriptor = accel_descriptor();
        let bytes = descriptor.to_bytes();
        // type + id + privilege + 2 strings + 3 floats + 3 ints + count + 1 event
        assert_eq!(bytes.len(), 4 + 8 + 4 + (4 + 9) + (4 + 7) + 12 + 12 + 4 + 4);
        assert_eq!(SensorDescriptor::from_bytes(&bytes).unwrap(), descriptor);
    }

    #[test]
    fn truncated_descriptor_rejected() {
        let bytes = accel_descriptor().to_bytes();
        let result = SensorDescriptor::from_bytes(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn descriptor_json_uses_type_names() {
        let json = serde_json::to_value(accel_descriptor()).unwrap();
        assert_eq!(json["sensor_type"], "accelerometer");
        assert_eq!(json["privilege"], "public");
    }
}
