// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command channel: per-connection protocol state machine and its worker

pub mod session;
pub mod worker;

pub use session::{CommandSession, HubServices, SessionState};
pub use worker::{run_command_loop, spawn_command_worker};
