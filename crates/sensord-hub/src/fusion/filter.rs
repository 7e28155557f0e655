// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Orientation estimators behind a small strategy trait

use crate::fusion::math::{rotation_from_vectors, Quaternion, Vec3};

/// Gyro steps longer than this are treated as a gap
pub const MAX_GYRO_STEP_SECS: f32 = 0.2;

/// Orientation estimator fed by the fusion sensor
pub trait FusionAlgorithm: Send {
    /// Propagate with an angular rate (rad/s, device frame)
    fn predict(&mut self, gyro: Vec3, dt_secs: f32);

    /// Correct with gravity and, when available, the geomagnetic field
    fn update(&mut self, accel: Vec3, mag: Option<Vec3>);

    /// Device → world orientation, `None` until the first correction
    fn orientation(&self) -> Option<Quaternion>;

    fn reset(&mut self);
}

/// Gyro integration blended towards the accel/mag absolute orientation
///
/// `gyro_weight` is the share of the propagated estimate kept on every
/// correction. Without a magnetometer the current north row stands in for
/// the field, so heading follows the gyro alone.
#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    gyro_weight: f32,
    estimate: Option<Quaternion>,
}

impl ComplementaryFilter {
    pub fn new(gyro_weight: f32) -> Self {
        Self {
            gyro_weight: gyro_weight.clamp(0.0, 1.0),
            estimate: None,
        }
    }

    fn reference_for(&self, accel: Vec3, mag: Option<Vec3>) -> Option<[f32; 9]> {
        if let Some(mag) = mag {
            return rotation_from_vectors(accel, mag);
        }
        let north = match self.estimate {
            Some(q) => {
                let m = q.to_rotation_matrix();
                [m[3], m[4], m[5]]
            }
            None => [0.0, 1.0, 0.0],
        };
        rotation_from_vectors(accel, north)
            .or_else(|| rotation_from_vectors(accel, [0.0, 0.0, -1.0]))
    }
}

impl FusionAlgorithm for ComplementaryFilter {
    fn predict(&mut self, gyro: Vec3, dt_secs: f32) {
        if let Some(q) = self.estimate {
            let dt = dt_secs.clamp(0.0, MAX_GYRO_STEP_SECS);
            let dq = Quaternion::from_angular_rate(gyro, dt);
            self.estimate = Some(q.mul(&dq).normalized());
        }
    }

    fn update(&mut self, accel: Vec3, mag: Option<Vec3>) {
        let Some(matrix) = self.reference_for(accel, mag) else {
            return;
        };
        let absolute = Quaternion::from_rotation_matrix(&matrix);
        self.estimate = Some(match self.estimate {
            Some(q) => q.nlerp(&absolute, 1.0 - self.gyro_weight),
            None => absolute,
        });
    }

    fn orientation(&self) -> Option<Quaternion> {
        self.estimate
    }

    fn reset(&mut self) {
        self.estimate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::math::attitude_from_matrix;

    #[test]
    fn test_first_update_initializes() {
        let mut filter = ComplementaryFilter::new(0.98);
        assert!(filter.orientation().is_none());
        filter.predict([0.0, 0.0, 1.0], 0.01);
        assert!(filter.orientation().is_none());

        filter.update([0.0, 0.0, 9.8], None);
        let (azimuth, pitch, roll) =
            attitude_from_matrix(&filter.orientation().unwrap().to_rotation_matrix());
        assert!(azimuth.abs() < 1e-4 && pitch.abs() < 1e-4 && roll.abs() < 1e-4);
    }

    #[test]
    fn test_gyro_drives_heading_without_magnetometer() {
        let mut filter = ComplementaryFilter::new(0.98);
        filter.update([0.0, 0.0, 9.8], None);
        // 0.5 rad/s about z for 1 s, in 10 ms steps, with level corrections
        for _ in 0..100 {
            filter.predict([0.0, 0.0, 0.5], 0.01);
            filter.update([0.0, 0.0, 9.8], None);
        }
        let m = filter.orientation().unwrap().to_rotation_matrix();
        let (azimuth, _, _) = attitude_from_matrix(&m);
        assert!((azimuth + 0.5).abs() < 0.02, "azimuth {}", azimuth);
    }

    #[test]
    fn test_magnetometer_pulls_heading() {
        let mut filter = ComplementaryFilter::new(0.5);
        for _ in 0..50 {
            filter.update([0.0, 0.0, 9.8], Some([-30.0, 0.0, -40.0]));
        }
        let m = filter.orientation().unwrap().to_rotation_matrix();
        let (azimuth, _, _) = attitude_from_matrix(&m);
        assert!((azimuth.to_degrees() - 90.0).abs() < 0.5);
    }

    #[test]
    fn test_large_gyro_gap_clamped() {
        let mut a = ComplementaryFilter::new(1.0);
        let mut b = ComplementaryFilter::new(1.0);
        a.update([0.0, 0.0, 9.8], None);
        b.update([0.0, 0.0, 9.8], None);
        a.predict([0.0, 0.0, 1.0], 5.0);
        b.predict([0.0, 0.0, 1.0], MAX_GYRO_STEP_SECS);
        assert!(a.orientation().unwrap().dot(&b.orientation().unwrap()).abs() > 0.9999);
    }
}
