// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor type, sensor id and event type encodings
//!
//! These numeric values are part of the wire protocol and must not change.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::constants::Permission;

/// Kind of sensor. The discriminant is the on-wire `sensor_type_t`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Wildcard used by lookups, never a concrete sensor
    All = -1,
    Accelerometer = 0,
    Geomagnetic = 1,
    Light = 2,
    Proximity = 3,
    Thermometer = 4,
    Gyroscope = 5,
    Pressure = 6,
    Motion = 7,
    Fusion = 8,
    Pedometer = 9,
    Context = 10,
    Flat = 11,
    Bio = 12,
    BioHrm = 13,
    AutoRotation = 14,
    Gravity = 15,
    LinearAccel = 16,
    RotationVector = 17,
    GeomagneticRv = 18,
    GamingRv = 19,
    Orientation = 20,
    Tilt = 21,
    Pir = 22,
    PirLong = 23,
    Temperature = 24,
    Humidity = 25,
    Ultraviolet = 26,
    Dust = 27,
    BioLedGreen = 28,
    BioLedIr = 29,
    BioLedRed = 30,
    RvRaw = 31,
    UncalGyroscope = 32,
    UncalGeomagnetic = 33,
}

impl SensorType {
    /// Every concrete type, in discriminant order
    pub const CONCRETE: [SensorType; 34] = [
        SensorType::Accelerometer,
        SensorType::Geomagnetic,
        SensorType::Light,
        SensorType::Proximity,
        SensorType::Thermometer,
        SensorType::Gyroscope,
        SensorType::Pressure,
        SensorType::Motion,
        SensorType::Fusion,
        SensorType::Pedometer,
        SensorType::Context,
        SensorType::Flat,
        SensorType::Bio,
        SensorType::BioHrm,
        SensorType::AutoRotation,
        SensorType::Gravity,
        SensorType::LinearAccel,
        SensorType::RotationVector,
        SensorType::GeomagneticRv,
        SensorType::GamingRv,
        SensorType::Orientation,
        SensorType::Tilt,
        SensorType::Pir,
        SensorType::PirLong,
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Ultraviolet,
        SensorType::Dust,
        SensorType::BioLedGreen,
        SensorType::BioLedIr,
        SensorType::BioLedRed,
        SensorType::RvRaw,
        SensorType::UncalGyroscope,
        SensorType::UncalGeomagnetic,
    ];

    pub fn from_i32(value: i32) -> Option<SensorType> {
        if value == -1 {
            return Some(SensorType::All);
        }
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::CONCRETE.get(index).copied())
    }

    /// Configuration name, e.g. `linear_accel`
    pub fn name(&self) -> &'static str {
        match self {
            SensorType::All => "all",
            SensorType::Accelerometer => "accelerometer",
            SensorType::Geomagnetic => "geomagnetic",
            SensorType::Light => "light",
            SensorType::Proximity => "proximity",
            SensorType::Thermometer => "thermometer",
            SensorType::Gyroscope => "gyroscope",
            SensorType::Pressure => "pressure",
            SensorType::Motion => "motion",
            SensorType::Fusion => "fusion",
            SensorType::Pedometer => "pedometer",
            SensorType::Context => "context",
            SensorType::Flat => "flat",
            SensorType::Bio => "bio",
            SensorType::BioHrm => "bio_hrm",
            SensorType::AutoRotation => "auto_rotation",
            SensorType::Gravity => "gravity",
            SensorType::LinearAccel => "linear_accel",
            SensorType::RotationVector => "rotation_vector",
            SensorType::GeomagneticRv => "geomagnetic_rv",
            SensorType::GamingRv => "gaming_rv",
            SensorType::Orientation => "orientation",
            SensorType::Tilt => "tilt",
            SensorType::Pir => "pir",
            SensorType::PirLong => "pir_long",
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Ultraviolet => "ultraviolet",
            SensorType::Dust => "dust",
            SensorType::BioLedGreen => "bio_led_green",
            SensorType::BioLedIr => "bio_led_ir",
            SensorType::BioLedRed => "bio_led_red",
            SensorType::RvRaw => "rv_raw",
            SensorType::UncalGyroscope => "uncal_gyroscope",
            SensorType::UncalGeomagnetic => "uncal_geomagnetic",
        }
    }

    pub fn from_name(name: &str) -> Option<SensorType> {
        let name = name.trim().to_lowercase();
        if name == "all" {
            return Some(SensorType::All);
        }
        Self::CONCRETE.iter().copied().find(|t| t.name() == name)
    }

    /// Permission a client needs to see or use sensors of this type
    pub fn required_permission(&self) -> Permission {
        match self {
            SensorType::Bio
            | SensorType::BioHrm
            | SensorType::BioLedGreen
            | SensorType::BioLedIr
            | SensorType::BioLedRed => Permission::BIO,
            _ => Permission::STANDARD,
        }
    }

    /// Sensors whose samples travel as `sensorhub_event_t` blobs
    pub fn is_sensorhub_controlled(&self) -> bool {
        matches!(self, SensorType::Context)
    }
}

impl Display for SensorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Server-wide sensor handle: `(sensor_type << 32) | index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(i64);

impl SensorId {
    pub fn new(sensor_type: SensorType, index: u32) -> Self {
        SensorId(((sensor_type as i32 as i64) << 32) | index as i64)
    }

    pub fn from_raw(raw: i64) -> Self {
        SensorId(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    /// Decoded type, `None` if the upper half is not a known type
    pub fn sensor_type(&self) -> Option<SensorType> {
        SensorType::from_i32((self.0 >> 32) as i32)
    }

    pub fn index(&self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl Display for SensorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.sensor_type() {
            Some(t) => write!(f, "{}#{}", t, self.index()),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

/// Periodic report subcode shared by all continuous sensors
pub const RAW_DATA_REPORT_ON_TIME: u16 = 0x0001;
/// Change-state notification subcode for state sensors
pub const CHANGE_STATE: u16 = 0x0001;
/// Raw report subcode for state sensors
pub const STATE_RAW_DATA_REPORT_ON_TIME: u16 = 0x0002;

/// Event code: `(sensor_type << 16) | subcode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(u32);

impl EventType {
    pub fn new(sensor_type: SensorType, subcode: u16) -> Self {
        EventType(((sensor_type as i32 as u32) << 16) | subcode as u32)
    }

    pub fn from_raw(raw: u32) -> Self {
        EventType(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn sensor_type(&self) -> Option<SensorType> {
        SensorType::from_i32((self.0 >> 16) as i32)
    }

    pub fn subcode(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Periodic data report for a continuous sensor
    pub fn raw_data(sensor_type: SensorType) -> Self {
        match sensor_type {
            SensorType::AutoRotation | SensorType::Proximity => {
                Self::new(sensor_type, STATE_RAW_DATA_REPORT_ON_TIME)
            }
            _ => Self::new(sensor_type, RAW_DATA_REPORT_ON_TIME),
        }
    }

    /// Change notification for a state sensor
    pub fn change_state(sensor_type: SensorType) -> Self {
        Self::new(sensor_type, CHANGE_STATE)
    }

    /// Events whose latest value is retained and replayed to late joiners
    pub fn is_record_event(&self) -> bool {
        matches!(
            self.sensor_type(),
            Some(SensorType::AutoRotation) | Some(SensorType::Proximity)
        ) && self.subcode() == CHANGE_STATE
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.sensor_type() {
            Some(t) => write!(f, "{}:{:#06x}", t, self.subcode()),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}
