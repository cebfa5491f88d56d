//! Math utilities and types
//!
//! Provides the nalgebra aliases used across the renderer plus the
//! projection builders the camera needs. All matrices are column-major and
//! follow OpenGL clip-space conventions (right-handed view space, camera
//! looking down -Z).

pub use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Unit quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Position, rotation and scale of an object in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Compose translate × rotate × scale
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Inverse of the rigid transform translate × rotate.
///
/// Computed from the parts rather than by general inversion, so it never
/// fails for a unit rotation.
pub fn rigid_inverse(position: &Vec3, rotation: &Quat) -> Mat4 {
    Isometry3::from_parts(Translation3::from(*position), *rotation)
        .inverse()
        .to_homogeneous()
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }
}

/// Projection builders for [`Mat4`]
pub trait Mat4Ext {
    /// OpenGL perspective projection.
    ///
    /// `fov_degrees` is the full vertical field of view. With `flip_y` the
    /// image is mirrored vertically.
    fn gl_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32, flip_y: bool) -> Mat4;

    /// Orthographic projection centred on the origin, mapping depth into
    /// `[0, 1]`. With `flip_y` both axes are mirrored.
    fn gl_orthographic(width: f32, height: f32, near: f32, far: f32, flip_y: bool) -> Mat4;

    /// Projection built from pinhole intrinsics (`fx`, `fy` in pixels) as
    /// produced by a PnP pose solver.
    fn pnp_projection(
        width: f32,
        height: f32,
        fx: f32,
        fy: f32,
        near: f32,
        far: f32,
        flip_y: bool,
    ) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn gl_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32, flip_y: bool) -> Mat4 {
        let f_n = 1.0 / (far - near);
        let half_fov = utils::deg_to_rad(fov_degrees) * 0.5;
        let mut factor = 1.0 / half_fov.tan();
        if flip_y {
            factor = -factor;
        }

        let mut result = Mat4::zeros();
        result[(0, 0)] = factor / aspect;
        result[(1, 1)] = factor;
        result[(2, 2)] = -(far + near) * f_n;
        result[(3, 2)] = -1.0;
        result[(2, 3)] = -2.0 * far * near * f_n;
        result
    }

    fn gl_orthographic(width: f32, height: f32, near: f32, far: f32, flip_y: bool) -> Mat4 {
        let half_width = width * 0.5;
        let half_height = height * 0.5;
        let (left, right, bottom, top) = if flip_y {
            (half_width, -half_width, half_height, -half_height)
        } else {
            (-half_width, half_width, -half_height, half_height)
        };

        let mut result = Mat4::zeros();
        result[(0, 0)] = 2.0 / (right - left);
        result[(1, 1)] = 2.0 / (top - bottom);
        result[(2, 2)] = 1.0 / (near - far);
        result[(0, 3)] = (left + right) / (left - right);
        result[(1, 3)] = (top + bottom) / (bottom - top);
        result[(2, 3)] = near / (near - far);
        result[(3, 3)] = 1.0;
        result
    }

    fn pnp_projection(
        width: f32,
        height: f32,
        fx: f32,
        fy: f32,
        near: f32,
        far: f32,
        flip_y: bool,
    ) -> Mat4 {
        let factor = if flip_y { -1.0 } else { 1.0 };

        let mut result = Mat4::zeros();
        result[(0, 0)] = 2.0 * fx / width * factor;
        result[(1, 1)] = 2.0 * fy / height * factor;
        result[(2, 2)] = -(far + near) / (far - near);
        result[(3, 2)] = -1.0;
        result[(2, 3)] = -2.0 * far * near / (far - near);
        result
    }
}
