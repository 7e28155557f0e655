// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Write side of a client's event channel

use std::io;
use std::sync::Arc;

pub trait EventSink: Send + Sync {
    /// Write one complete event record
    fn send(&self, bytes: &[u8]) -> io::Result<()>;

    /// Tear the channel down; later sends fail
    fn close(&self) {}
}

pub type SinkHandle = Arc<dyn EventSink>;
