// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Client bookkeeping shared by command sessions and the dispatcher

pub mod registry;
pub mod session;

pub use registry::ClientSessionRegistry;
pub use session::{ClientSession, SensorUsage};
