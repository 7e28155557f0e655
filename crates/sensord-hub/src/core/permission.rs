// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Platform collaborators: client privilege lookup and display state

use ahash::AHashSet;
use sensord_config::PermissionsConfig;
use sensord_protocol::Permission;
use std::sync::atomic::{AtomicBool, Ordering};

/// Decides which permission bits a client process holds
pub trait PermissionChecker: Send + Sync {
    /// Bits granted to `pid`, queried once per `get_id`
    fn permission_for(&self, pid: i32) -> Permission;

    /// Bits assumed for a session that has not identified itself yet
    fn default_permission(&self) -> Permission {
        Permission::STANDARD
    }
}

/// Grants STANDARD to everyone and BIO to configured pids
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPermissionChecker {
    grant_all_bio: bool,
    bio_pids: AHashSet<i32>,
}

impl ConfiguredPermissionChecker {
    pub fn new(config: &PermissionsConfig) -> Self {
        Self {
            grant_all_bio: config.grant_all_bio,
            bio_pids: config.bio_pids.iter().copied().collect(),
        }
    }
}

impl PermissionChecker for ConfiguredPermissionChecker {
    fn permission_for(&self, pid: i32) -> Permission {
        let mut permission = Permission::STANDARD;
        if self.grant_all_bio || self.bio_pids.contains(&pid) {
            permission |= Permission::BIO;
        }
        permission
    }
}

/// Source of the display on/off state used to gate event delivery
pub trait DisplayStateSource: Send + Sync {
    fn is_screen_off(&self) -> bool;
}

/// Headless default: the screen is always on
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnDisplay;

impl DisplayStateSource for AlwaysOnDisplay {
    fn is_screen_off(&self) -> bool {
        false
    }
}

/// Display state driven by an external listener
#[derive(Debug, Default)]
pub struct SwitchableDisplay {
    screen_off: AtomicBool,
}

impl SwitchableDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_screen_off(&self, off: bool) {
        self.screen_off.store(off, Ordering::Release);
    }
}

impl DisplayStateSource for SwitchableDisplay {
    fn is_screen_off(&self) -> bool {
        self.screen_off.load(Ordering::Acquire)
    }
}
