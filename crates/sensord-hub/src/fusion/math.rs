// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Small vector and quaternion helpers for the fusion pipeline
//!
//! Rotation matrices are row-major `[f32; 9]` mapping device coordinates to
//! world coordinates (rows: east, north, up expressed in the device frame).

pub type Vec3 = [f32; 3];

pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(v: Vec3) -> f32 {
    dot(v, v).sqrt()
}

pub fn scale(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn normalize(v: Vec3) -> Option<Vec3> {
    let n = norm(v);
    (n > f32::EPSILON).then(|| scale(v, 1.0 / n))
}

/// First three values of a sample, zero-filled
pub fn vec3(values: &[f32]) -> Vec3 {
    let mut out = [0.0; 3];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = *value;
    }
    out
}

/// Unit quaternion (w, x, y, z)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    pub fn dot(&self, other: &Quaternion) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn normalized(&self) -> Quaternion {
        let n = self.dot(self).sqrt();
        if n <= f32::EPSILON {
            return Quaternion::IDENTITY;
        }
        Quaternion::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product `self ⊗ rhs`
    pub fn mul(&self, rhs: &Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Rotation by angular rate `omega` (rad/s, device frame) over `dt` seconds
    pub fn from_angular_rate(omega: Vec3, dt: f32) -> Quaternion {
        let rate = norm(omega);
        if rate <= f32::EPSILON || dt <= 0.0 {
            return Quaternion::IDENTITY;
        }
        let half = rate * dt * 0.5;
        let s = half.sin() / rate;
        Quaternion::new(half.cos(), omega[0] * s, omega[1] * s, omega[2] * s)
    }

    pub fn to_rotation_matrix(&self) -> [f32; 9] {
        let Quaternion { w, x, y, z } = *self;
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ]
    }

    pub fn from_rotation_matrix(m: &[f32; 9]) -> Quaternion {
        let trace = m[0] + m[4] + m[8];
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quaternion::new(0.25 * s, (m[7] - m[5]) / s, (m[2] - m[6]) / s, (m[3] - m[1]) / s)
        } else if m[0] > m[4] && m[0] > m[8] {
            let s = (1.0 + m[0] - m[4] - m[8]).sqrt() * 2.0;
            Quaternion::new((m[7] - m[5]) / s, 0.25 * s, (m[1] + m[3]) / s, (m[2] + m[6]) / s)
        } else if m[4] > m[8] {
            let s = (1.0 + m[4] - m[0] - m[8]).sqrt() * 2.0;
            Quaternion::new((m[2] - m[6]) / s, (m[1] + m[3]) / s, 0.25 * s, (m[5] + m[7]) / s)
        } else {
            let s = (1.0 + m[8] - m[0] - m[4]).sqrt() * 2.0;
            Quaternion::new((m[3] - m[1]) / s, (m[2] + m[6]) / s, (m[5] + m[7]) / s, 0.25 * s)
        };
        q.normalized()
    }

    /// Normalized linear interpolation along the shorter arc
    pub fn nlerp(&self, target: &Quaternion, t: f32) -> Quaternion {
        let target = if self.dot(target) < 0.0 {
            Quaternion::new(-target.w, -target.x, -target.y, -target.z)
        } else {
            *target
        };
        Quaternion::new(
            self.w + (target.w - self.w) * t,
            self.x + (target.x - self.x) * t,
            self.y + (target.y - self.y) * t,
            self.z + (target.z - self.z) * t,
        )
        .normalized()
    }
}

/// Device → world rotation from gravity and a north-ish reference vector
///
/// `accel` points up (what an accelerometer reads at rest). `reference` is
/// the geomagnetic field, or any vector with a horizontal component towards
/// north. `None` when the two are (nearly) parallel.
pub fn rotation_from_vectors(accel: Vec3, reference: Vec3) -> Option<[f32; 9]> {
    let up = normalize(accel)?;
    let east_raw = cross(reference, up);
    if norm(east_raw) < 0.1 * norm(reference) {
        return None;
    }
    let east = normalize(east_raw)?;
    let north = cross(up, east);
    Some([
        east[0], east[1], east[2], north[0], north[1], north[2], up[0], up[1], up[2],
    ])
}

/// (azimuth, pitch, roll) in radians from a device → world matrix
pub fn attitude_from_matrix(m: &[f32; 9]) -> (f32, f32, f32) {
    let azimuth = m[1].atan2(m[4]);
    let pitch = (-m[7]).clamp(-1.0, 1.0).asin();
    let roll = (-m[6]).atan2(m[8]);
    (azimuth, pitch, roll)
}
