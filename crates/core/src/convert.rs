//! Host (left-handed, Z-up, centimetres) to engine (right-handed, Y-up, metres)
//! conversions.

use conduit_scene::HostTransform;
use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POSITION_SCALE: f32 = 100.0;

pub fn host_to_engine_position(p: [f32; 3], scale: f32) -> [f32; 3] {
    [p[0] / scale, p[2] / scale, p[1] / scale]
}

pub fn engine_to_host_position(p: [f32; 3], scale: f32) -> [f32; 3] {
    [p[0] * scale, p[2] * scale, p[1] * scale]
}

/// Direction remap without unit scaling.
pub fn host_to_engine_vector(v: [f32; 3]) -> [f32; 3] {
    [v[0], v[2], v[1]]
}

pub fn host_to_engine_uv(uv: [f32; 2]) -> [f32; 3] {
    [uv[0], 1.0 - uv[1], 0.0]
}

/// Normal transform for baking host-space normals through `matrix`: inverse-transpose
/// of the linear part, with the output sign flipped for mirroring matrices.
#[derive(Debug, Clone, Copy)]
pub struct NormalTransform {
    matrix: Mat3,
    sign: f32,
}

impl NormalTransform {
    pub fn new(matrix: Mat4) -> Self {
        let linear = Mat3::from_mat4(matrix);
        let sign = if linear.determinant() < 0.0 { -1.0 } else { 1.0 };
        Self {
            matrix: linear.inverse().transpose(),
            sign,
        }
    }

    pub fn identity() -> Self {
        Self {
            matrix: Mat3::IDENTITY,
            sign: 1.0,
        }
    }

    pub fn sign(&self) -> f32 {
        self.sign
    }

    /// Transformed, renormalized and remapped to engine axes.
    pub fn apply(&self, normal: [f32; 3]) -> [f32; 3] {
        let n = self.matrix * Vec3::from(normal);
        let n = if n.length_squared() > 0.0 {
            n.normalize() * self.sign
        } else {
            Vec3::Z
        };
        host_to_engine_vector(n.to_array())
    }
}

/// Object transform in engine convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineTransform {
    pub position: [f32; 3],
    /// Quaternion `x, y, z, w`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for EngineTransform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl EngineTransform {
    pub fn from_host(transform: &HostTransform, scale_factor: f32) -> Self {
        let q = transform.quat();
        Self {
            position: host_to_engine_position(transform.translation, scale_factor),
            rotation: [q.x, q.z, q.y, -q.w],
            scale: host_to_engine_vector(transform.scale),
        }
    }

    pub fn to_host(&self, scale_factor: f32) -> HostTransform {
        let r = self.rotation;
        HostTransform {
            translation: engine_to_host_position(self.position, scale_factor),
            rotation: [r[0], r[2], r[1], -r[3]],
            scale: host_to_engine_vector(self.scale),
        }
    }
}
