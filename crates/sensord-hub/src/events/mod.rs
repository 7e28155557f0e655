// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event flow: pollers → [`EventQueue`] → [`EventDispatcher`] → client sinks

pub mod active;
pub mod dispatcher;
pub mod queue;
pub mod sink;

pub use active::ActiveVirtualSensors;
pub use dispatcher::EventDispatcher;
pub use queue::{EventQueue, HubEvent};
pub use sink::{EventSink, SinkHandle};
