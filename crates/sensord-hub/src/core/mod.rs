// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core types shared by every hub module

pub mod config;
pub mod permission;
pub mod types;

pub use config::HubConfig;
pub use permission::{
    AlwaysOnDisplay, ConfiguredPermissionChecker, DisplayStateSource, PermissionChecker,
    SwitchableDisplay,
};
pub use types::{now_micros, ClientId, HubError, Result};
