// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-sensor interval aggregation
//!
//! The effective interval of a sensor is the minimum over every registered
//! listener, or the default when nobody registered one.

/// One listener's requested interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalInfo {
    /// Client id, or sensor id of a consuming virtual sensor
    pub client_id: i64,
    pub is_processor: bool,
    pub interval_ms: u32,
}

#[derive(Debug, Clone)]
pub struct IntervalTracker {
    default_ms: u32,
    entries: Vec<IntervalInfo>,
}

impl IntervalTracker {
    pub fn new(default_ms: u32) -> Self {
        Self {
            default_ms,
            entries: Vec::new(),
        }
    }

    /// Insert or replace the entry of `(client_id, is_processor)`.
    /// Returns whether the minimum changed.
    pub fn add(&mut self, client_id: i64, is_processor: bool, interval_ms: u32) -> bool {
        let before = self.min_interval();
        match self
            .entries
            .iter_mut()
            .find(|e| e.client_id == client_id && e.is_processor == is_processor)
        {
            Some(entry) => entry.interval_ms = interval_ms,
            None => self.entries.push(IntervalInfo {
                client_id,
                is_processor,
                interval_ms,
            }),
        }
        self.min_interval() != before
    }

    /// Returns whether the minimum changed
    pub fn delete(&mut self, client_id: i64, is_processor: bool) -> bool {
        let before = self.min_interval();
        self.entries
            .retain(|e| !(e.client_id == client_id && e.is_processor == is_processor));
        self.min_interval() != before
    }

    /// Interval currently recorded for `(client_id, is_processor)`
    pub fn get(&self, client_id: i64, is_processor: bool) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.client_id == client_id && e.is_processor == is_processor)
            .map(|e| e.interval_ms)
    }

    /// Put `(client_id, is_processor)` back to a value read with [`Self::get`]
    pub fn restore(&mut self, client_id: i64, is_processor: bool, previous: Option<u32>) {
        match previous {
            Some(interval_ms) => {
                self.add(client_id, is_processor, interval_ms);
            }
            None => {
                self.delete(client_id, is_processor);
            }
        }
    }

    pub fn min_interval(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.interval_ms)
            .min()
            .unwrap_or(self.default_ms)
    }

    pub fn entries(&self) -> &[IntervalInfo] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
