// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conversion strategies applied to raw HAL samples

use crate::sensors::hal::RawSample;

/// Turns a raw HAL sample into reported units
///
/// Returning `None` swallows the sample (e.g. a filter still warming up).
pub trait SensorAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, sample: RawSample) -> Option<RawSample>;
}

/// Multiplies every value by a constant factor (e.g. g → m/s²)
#[derive(Debug, Clone, Copy)]
pub struct ScaleConversion {
    scale: f32,
}

impl ScaleConversion {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }
}

impl SensorAlgorithm for ScaleConversion {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn process(&self, mut sample: RawSample) -> Option<RawSample> {
        if self.scale != 1.0 {
            for value in sample.values.iter_mut() {
                *value *= self.scale;
            }
        }
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_applies_to_values_only() {
        let algorithm = ScaleConversion::new(9.80665);
        let sample = RawSample {
            timestamp: 5,
            accuracy: 2,
            values: vec![0.0, 1.0, -0.5],
            hub_data: vec![7],
        };
        let out = algorithm.process(sample).unwrap();
        assert_eq!(out.values, vec![0.0, 9.80665, -4.903325]);
        assert_eq!(out.hub_data, vec![7]);
        assert_eq!(out.timestamp, 5);
    }
}
