// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reference-counted set of virtual sensors that currently have listeners

use ahash::AHashMap;
use parking_lot::Mutex;
use sensord_protocol::SensorId;
use tracing::debug;

#[derive(Default)]
pub struct ActiveVirtualSensors {
    counts: Mutex<AHashMap<SensorId, usize>>,
}

impl ActiveVirtualSensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the sensor just became active
    pub fn add(&self, id: SensorId) -> bool {
        let mut counts = self.counts.lock();
        let count = counts.entry(id).or_insert(0);
        *count += 1;
        if *count == 1 {
            debug!("🦀 [DISPATCHER] Virtual sensor {} activated", id);
            true
        } else {
            false
        }
    }

    /// Returns true when the last reference went away
    pub fn delete(&self, id: SensorId) -> bool {
        let mut counts = self.counts.lock();
        match counts.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(&id);
                debug!("🦀 [DISPATCHER] Virtual sensor {} deactivated", id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.counts.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.counts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensord_protocol::SensorType;

    #[test]
    fn test_refcounted_activation() {
        let active = ActiveVirtualSensors::new();
        let id = SensorId::new(SensorType::Gravity, 0);

        assert!(active.add(id));
        assert!(!active.add(id));
        assert!(!active.delete(id));
        assert!(active.contains(id));
        assert!(active.delete(id));
        assert!(!active.contains(id));
        assert!(!active.delete(id));
    }
}
