// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor samples as they travel on the event channel
//!
//! Byte layouts (little-endian, C alignment):
//!
//! ```text
//! sensor_data_t      (88)   accuracy:i32 | pad:4 | timestamp:u64 | value_count:i32 | values:f32[16] | pad:4
//! sensor_event_t     (104)  event_type:u32 | pad:4 | sensor_id:i64 | data:sensor_data_t
//! sensorhub_data_t   (4120) accuracy:i32 | pad:4 | timestamp:u64 | hub_data_size:i32 | hub_data:u8[4096] | pad:4
//! sensorhub_event_t  (4136) event_type:u32 | pad:4 | sensor_id:i64 | data:sensorhub_data_t
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::constants::{MAX_HUB_DATA_SIZE, MAX_VALUE_COUNT};
use crate::sensor_type::{EventType, SensorId};
use crate::{ensure_len, ProtocolError, Result};

pub const ACCURACY_UNDEFINED: i32 = -1;
pub const ACCURACY_BAD: i32 = 0;
pub const ACCURACY_NORMAL: i32 = 1;
pub const ACCURACY_GOOD: i32 = 2;
pub const ACCURACY_VERY_GOOD: i32 = 3;

/// One sample: up to 16 values with accuracy and timestamp (µs)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorData {
    pub accuracy: i32,
    pub timestamp: u64,
    value_count: usize,
    values: [f32; MAX_VALUE_COUNT],
}

impl SensorData {
    pub const SIZE: usize = 88;

    /// # Errors
    /// `TooManyValues` when more than 16 values are given
    pub fn new(timestamp: u64, accuracy: i32, values: &[f32]) -> Result<Self> {
        if values.len() > MAX_VALUE_COUNT {
            return Err(ProtocolError::TooManyValues(values.len()));
        }
        let mut buffer = [0.0f32; MAX_VALUE_COUNT];
        buffer[..values.len()].copy_from_slice(values);
        Ok(Self {
            accuracy,
            timestamp,
            value_count: values.len(),
            values: buffer,
        })
    }

    /// Zeroed sample used in failed `get_data` answers
    pub fn empty() -> Self {
        Self {
            accuracy: ACCURACY_UNDEFINED,
            timestamp: 0,
            value_count: 0,
            values: [0.0; MAX_VALUE_COUNT],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values[..self.value_count]
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Value at `index`, 0.0 past the populated range
    pub fn value(&self, index: usize) -> f32 {
        if index < self.value_count {
            self.values[index]
        } else {
            0.0
        }
    }

    pub fn encode_into(&self, out: &mut [u8]) {
        LittleEndian::write_i32(&mut out[0..4], self.accuracy);
        out[4..8].fill(0);
        LittleEndian::write_u64(&mut out[8..16], self.timestamp);
        LittleEndian::write_i32(&mut out[16..20], self.value_count as i32);
        LittleEndian::write_f32_into(&self.values, &mut out[20..84]);
        out[84..88].fill(0);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE)?;
        let count = LittleEndian::read_i32(&bytes[16..20]);
        let value_count = usize::try_from(count)
            .ok()
            .filter(|c| *c <= MAX_VALUE_COUNT)
            .ok_or_else(|| ProtocolError::InvalidField(format!("value_count {}", count)))?;
        let mut values = [0.0f32; MAX_VALUE_COUNT];
        LittleEndian::read_f32_into(&bytes[20..84], &mut values);
        Ok(Self {
            accuracy: LittleEndian::read_i32(&bytes[0..4]),
            timestamp: LittleEndian::read_u64(&bytes[8..16]),
            value_count,
            values,
        })
    }
}

/// A sample tagged with its source and kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub event_type: EventType,
    pub sensor_id: SensorId,
    pub data: SensorData,
}

impl SensorEvent {
    pub const SIZE: usize = 104;

    pub fn new(event_type: EventType, sensor_id: SensorId, data: SensorData) -> Self {
        Self {
            event_type,
            sensor_id,
            data,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE];
        LittleEndian::write_u32(&mut out[0..4], self.event_type.raw());
        LittleEndian::write_i64(&mut out[8..16], self.sensor_id.raw());
        self.data.encode_into(&mut out[16..]);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE)?;
        Ok(Self {
            event_type: EventType::from_raw(LittleEndian::read_u32(&bytes[0..4])),
            sensor_id: SensorId::from_raw(LittleEndian::read_i64(&bytes[8..16])),
            data: SensorData::decode(&bytes[16..])?,
        })
    }
}

/// Opaque sensorhub payload
#[derive(Debug, Clone, PartialEq)]
pub struct SensorhubData {
    pub accuracy: i32,
    pub timestamp: u64,
    pub hub_data: Vec<u8>,
}

impl SensorhubData {
    pub const SIZE: usize = 4120;

    pub fn new(timestamp: u64, accuracy: i32, hub_data: Vec<u8>) -> Result<Self> {
        if hub_data.len() > MAX_HUB_DATA_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: hub_data.len() as u64,
                limit: MAX_HUB_DATA_SIZE,
            });
        }
        Ok(Self {
            accuracy,
            timestamp,
            hub_data,
        })
    }

    fn encode_into(&self, out: &mut [u8]) {
        LittleEndian::write_i32(&mut out[0..4], self.accuracy);
        LittleEndian::write_u64(&mut out[8..16], self.timestamp);
        LittleEndian::write_i32(&mut out[16..20], self.hub_data.len() as i32);
        out[20..20 + self.hub_data.len()].copy_from_slice(&self.hub_data);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE)?;
        let size = LittleEndian::read_i32(&bytes[16..20]);
        let size = usize::try_from(size)
            .ok()
            .filter(|s| *s <= MAX_HUB_DATA_SIZE)
            .ok_or_else(|| ProtocolError::InvalidField(format!("hub_data_size {}", size)))?;
        Ok(Self {
            accuracy: LittleEndian::read_i32(&bytes[0..4]),
            timestamp: LittleEndian::read_u64(&bytes[8..16]),
            hub_data: bytes[20..20 + size].to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorhubEvent {
    pub event_type: EventType,
    pub sensor_id: SensorId,
    pub data: SensorhubData,
}

impl SensorhubEvent {
    pub const SIZE: usize = 4136;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE];
        LittleEndian::write_u32(&mut out[0..4], self.event_type.raw());
        LittleEndian::write_i64(&mut out[8..16], self.sensor_id.raw());
        self.data.encode_into(&mut out[16..]);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE)?;
        Ok(Self {
            event_type: EventType::from_raw(LittleEndian::read_u32(&bytes[0..4])),
            sensor_id: SensorId::from_raw(LittleEndian::read_i64(&bytes[8..16])),
            data: SensorhubData::decode(&bytes[16..])?,
        })
    }
}
