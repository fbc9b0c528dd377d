use glam::{Affine3A, EulerRot, Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local placement of a node: position, rotation and per-axis scale (TRS).
///
/// A plain value: the matrix form is rebuilt by [`Transform::matrix`] on
/// every call, so there is no cache that could go stale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new() -> Self {
        Self::IDENTITY
    }

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_position(Vec3::new(x, y, z))
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Decomposes an affine matrix into TRS.
    ///
    /// Shear cannot be represented and is lost in the decomposition.
    #[must_use]
    pub fn from_matrix(mat: &Affine3A) -> Self {
        let (scale, rotation, position) = mat.to_scale_rotation_translation();
        Self {
            position,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// Scale-rotate-translate matrix of this transform.
    #[inline]
    #[must_use]
    pub fn matrix(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// `true` when no component is NaN or infinite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Returns a copy whose scale axes are at least `min_scale`.
    #[must_use]
    pub fn clamped(mut self, min_scale: f32) -> Self {
        self.scale = self.scale.max(Vec3::splat(min_scale));
        self
    }

    // ========================================================================
    // Rotation helpers
    // ========================================================================

    /// Sets the rotation from Euler angles (XYZ order, radians).
    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
    }

    /// Current rotation as Euler angles (XYZ order).
    #[must_use]
    pub fn rotation_euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    pub fn set_rotation_euler_with_order(&mut self, x: f32, y: f32, z: f32, order: EulerRot) {
        self.rotation = Quat::from_euler(order, x, y, z);
    }

    /// Rotates so that -Z faces `target`.
    ///
    /// `target` and `up` are in the parent's space. Degenerate input (target
    /// on the position, or collinear with `up`) leaves the rotation alone.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let Some(forward) = (target - self.position).try_normalize() else {
            return;
        };
        if forward.cross(up).length_squared() < 1e-4 {
            return;
        }

        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();

        let rot_mat = Mat3::from_cols(right, new_up, -forward);
        self.rotation = Quat::from_mat3(&rot_mat);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_replaces_zero_and_negative_axes() {
        let t = Transform::new().with_scale(Vec3::new(0.0, -2.0, 3.0)).clamped(1e-6);
        assert_eq!(t.scale, Vec3::new(1e-6, 1e-6, 3.0));
    }

    #[test]
    fn non_finite_is_detected() {
        let mut t = Transform::from_xyz(1.0, 2.0, 3.0);
        assert!(t.is_finite());
        t.position.y = f32::NAN;
        assert!(!t.is_finite());
        t.position.y = 0.0;
        t.scale.z = f32::INFINITY;
        assert!(!t.is_finite());
    }
}
