// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Protocol constants shared with clients

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

pub const DEFAULT_COMMAND_SOCKET_PATH: &str = "/tmp/sensord_command_socket";
pub const DEFAULT_EVENT_SOCKET_PATH: &str = "/tmp/sensord_event_socket";

/// First word of `event_channel_ready_t`
pub const EVENT_CHANNEL_MAGIC: u32 = 0xCAFE_CAFE;

/// Values carried by one `sensor_data_t`
pub const MAX_VALUE_COUNT: usize = 16;
/// Bytes carried by one `sensorhub_data_t`
pub const MAX_HUB_DATA_SIZE: usize = 4096;

/// Poll intervals (ms)
pub const POLL_100HZ_MS: u32 = 10;
pub const POLL_50HZ_MS: u32 = 20;
pub const POLL_25HZ_MS: u32 = 40;
pub const POLL_20HZ_MS: u32 = 50;
pub const POLL_10HZ_MS: u32 = 100;
pub const POLL_5HZ_MS: u32 = 200;
pub const POLL_1HZ_MS: u32 = 1000;
pub const POLL_MAX_HZ_MS: u32 = POLL_100HZ_MS;
/// Slowest allowed, and the interval used while nobody asks for one
pub const SENSOR_INTERVAL_NORMAL_MS: u32 = POLL_1HZ_MS;

/// Client permission bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const NONE: Permission = Permission(0);
    pub const STANDARD: Permission = Permission(1 << 0);
    pub const BIO: Permission = Permission(1 << 1);

    pub fn from_bits(bits: u32) -> Self {
        Permission(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True when every bit of `required` is present
    pub fn contains(&self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        Permission(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Permission) {
        self.0 |= rhs.0;
    }
}

/// Per-usage delivery option set through `SET_OPTION`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorOption {
    /// Delivered only while the display is on
    #[default]
    Default = 0,
    OnInScreenOff = 1,
    OnInPowersaveMode = 2,
    AlwaysOn = 3,
}

impl SensorOption {
    pub fn from_i32(value: i32) -> Option<SensorOption> {
        match value {
            0 => Some(SensorOption::Default),
            1 => Some(SensorOption::OnInScreenOff),
            2 => Some(SensorOption::OnInPowersaveMode),
            3 => Some(SensorOption::AlwaysOn),
            _ => None,
        }
    }

    /// Whether events keep flowing with the screen off
    pub fn delivers_in_screen_off(&self) -> bool {
        matches!(self, SensorOption::OnInScreenOff | SensorOption::AlwaysOn)
    }
}

/// Visibility of a sensor to clients
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorPrivilege {
    #[default]
    Public = 0,
    /// Used inside the daemon only; omitted from sensor lists
    Internal = 1,
}

impl SensorPrivilege {
    pub fn from_i32(value: i32) -> Option<SensorPrivilege> {
        match value {
            0 => Some(SensorPrivilege::Public),
            1 => Some(SensorPrivilege::Internal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_contains_all_required_bits() {
        let both = Permission::STANDARD | Permission::BIO;
        assert!(both.contains(Permission::BIO));
        assert!(both.contains(Permission::STANDARD));
        assert!(!Permission::STANDARD.contains(Permission::BIO));
        assert!(Permission::STANDARD.contains(Permission::NONE));
    }

    #[test]
    fn screen_off_delivery() {
        assert!(!SensorOption::Default.delivers_in_screen_off());
        assert!(!SensorOption::OnInPowersaveMode.delivers_in_screen_off());
        assert!(SensorOption::OnInScreenOff.delivers_in_screen_off());
        assert!(SensorOption::AlwaysOn.delivers_in_screen_off());
        assert_eq!(SensorOption::from_i32(4), None);
    }
}
