// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy and small shared helpers

use sensord_protocol::ProtocolError;
use std::sync::OnceLock;
use std::time::Instant;
use thiserror::Error;

/// Server-assigned client handle, as carried on the wire
pub type ClientId = i32;

/// Errors that can occur in hub operations
///
/// Every variant maps to the negative status returned to clients in a
/// `CMD_DONE` answer, see [`HubError::status`].
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Not registered: {0}")]
    NotRegistered(String),
    #[error("Invalid client: {0}")]
    InvalidClient(ClientId),
    #[error("Session is not bound to a sensor")]
    NotBound,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No data: {0}")]
    NoData(String),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HubError {
    /// Negative errno-style status for `cmd_done_t`
    pub fn status(&self) -> i64 {
        match self {
            HubError::NotFound(_) => -2,           // ENOENT
            HubError::Io(_) => -5,                 // EIO
            HubError::AllocationFailure(_) => -12, // ENOMEM
            HubError::PermissionDenied(_) => -13,  // EACCES
            HubError::AlreadyRegistered(_) => -17, // EEXIST
            HubError::InvalidClient(_)
            | HubError::NotRegistered(_)
            | HubError::InvalidArgument(_)
            | HubError::Config(_) => -22, // EINVAL
            HubError::NoData(_) => -61,            // ENODATA
            HubError::Protocol(_) => -74,          // EBADMSG
            HubError::Unsupported(_) => -95,       // EOPNOTSUPP
            HubError::NotBound => -107,            // ENOTCONN
        }
    }
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

static CLOCK_BASE: OnceLock<Instant> = OnceLock::new();

/// Monotonic timestamp in microseconds, shared by every event source
pub fn now_micros() -> u64 {
    let base = CLOCK_BASE.get_or_init(Instant::now);
    base.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_negative_and_distinct_where_it_matters() {
        assert_eq!(HubError::NotFound("x".into()).status(), -2);
        assert_eq!(HubError::PermissionDenied("x".into()).status(), -13);
        assert_eq!(HubError::AlreadyRegistered("x".into()).status(), -17);
        assert_eq!(HubError::NotBound.status(), -107);
        assert_eq!(HubError::InvalidClient(3).status(), -22);
        assert_eq!(
            HubError::Protocol(ProtocolError::UnknownCommand(99)).status(),
            -74
        );
    }

    #[test]
    fn timestamps_are_monotonic() {
        let a = now_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(now_micros() > a);
    }
}
