// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Socket transports for the command and event channels

pub mod uds;

pub use uds::{bind_listener, spawn_command_acceptor, spawn_event_acceptor, UnixEventChannel};
