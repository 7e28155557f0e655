// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # sensord-observability
//!
//! Logging infrastructure shared by the sensord crates.
//!
//! Provides consistent subscriber setup with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: File-based log rotation under a timestamped run folder

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known sensord crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "sensord",
    "sensord-hub",
    "sensord-protocol",
    "sensord-config",
    "sensord-observability",
];

/// Errors raised while configuring logging
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("Unknown log level '{0}' (expected trace, debug, info, warn or error)")]
    InvalidLevel(String),
}

/// Convert a crate name to the target prefix tracing uses for it
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
