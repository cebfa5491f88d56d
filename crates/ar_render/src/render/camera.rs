//! # Camera
//!
//! Position, rotation and projection with lazily recomputed view and
//! view-projection matrices.
//!
//! ## Caching
//!
//! The view matrix and the view-projection matrix each carry their own dirty
//! flag. Moving or rotating the camera dirties both; replacing the projection
//! dirties only the view-projection. Reads recompute at most once per
//! mutation, and recompute counters are kept so callers (and tests) can check
//! that caching works.
//!
//! ## Conventions
//!
//! OpenGL clip space, right-handed, camera looking down -Z. The view matrix
//! is the inverse of the camera's rigid transform `translate × rotate`.

use crate::core::CameraConfig;
use crate::foundation::math::{rigid_inverse, Mat4, Mat4Ext, Quat, Vec3};

/// Matrices captured from a [`Camera`] for one material apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// `projection × view`
    pub view_projection: Mat4,
}

/// Perspective camera with dirty-flag matrix caches
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    rotation: Quat,
    flip_y: bool,

    view: Mat4,
    view_dirty: bool,
    projection: Mat4,
    view_projection: Mat4,
    view_projection_dirty: bool,

    view_recomputes: u64,
    view_projection_recomputes: u64,
}

impl Camera {
    /// Camera for a viewport of `width × height` pixels.
    ///
    /// Placed at `(0, 0, 1000)` with identity rotation and a 60 degree
    /// perspective projection clipping at `0.1` and `5000`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_config(&CameraConfig::default(), width as f32 / height as f32)
    }

    /// Camera from configuration for a viewport aspect ratio
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            position: Vec3::from(config.position),
            rotation: Quat::identity(),
            flip_y: config.flip_y,
            view: Mat4::identity(),
            view_dirty: true,
            projection: Mat4::identity(),
            view_projection: Mat4::identity(),
            view_projection_dirty: true,
            view_recomputes: 0,
            view_projection_recomputes: 0,
        };
        camera.make_perspective(config.fov_degrees, aspect, config.near, config.far);
        camera
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the camera
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.view_dirty = true;
        self.view_projection_dirty = true;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// World rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rotate the camera
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.view_dirty = true;
        self.view_projection_dirty = true;
    }

    /// Whether projection builders mirror the image vertically
    pub fn flip_y(&self) -> bool {
        self.flip_y
    }

    /// Mirror projections built after this call.
    ///
    /// Camera-feed textures on some platforms arrive upside down; flipping
    /// the projection keeps rendered content aligned with them. The current
    /// projection is left as is.
    pub fn set_flip_y(&mut self, flip_y: bool) {
        self.flip_y = flip_y;
    }

    /// View matrix, recomputed only if position or rotation changed
    pub fn view_matrix(&mut self) -> Mat4 {
        if self.view_dirty {
            self.view = rigid_inverse(&self.position, &self.rotation);
            self.view_dirty = false;
            self.view_recomputes += 1;
        }
        self.view
    }

    /// Assign the view matrix directly (e.g. from a tracking pose).
    ///
    /// Overrides position and rotation until either is set again.
    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view = view;
        self.view_dirty = false;
        self.view_projection_dirty = true;
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Assign the projection matrix
    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
        self.view_projection_dirty = true;
    }

    /// `projection × view`, refreshing the view first when needed
    pub fn view_projection_matrix(&mut self) -> Mat4 {
        if self.view_projection_dirty {
            let view = self.view_matrix();
            self.view_projection = self.projection * view;
            self.view_projection_dirty = false;
            self.view_projection_recomputes += 1;
        }
        self.view_projection
    }

    /// Snapshot all three matrices
    pub fn matrices(&mut self) -> CameraMatrices {
        CameraMatrices {
            view: self.view_matrix(),
            projection: self.projection,
            view_projection: self.view_projection_matrix(),
        }
    }

    /// Perspective projection from a vertical field of view in degrees
    pub fn make_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.set_projection_matrix(Mat4::gl_perspective(fov_degrees, aspect, near, far, self.flip_y));
    }

    /// Orthographic projection of a `width × height` region centred on the view axis
    pub fn make_orthographic(&mut self, width: f32, height: f32, near: f32, far: f32) {
        self.set_projection_matrix(Mat4::gl_orthographic(width, height, near, far, self.flip_y));
    }

    /// Projection from pinhole intrinsics of a `width × height` image
    pub fn make_pnp_projection(&mut self, width: f32, height: f32, fx: f32, fy: f32, near: f32, far: f32) {
        self.set_projection_matrix(Mat4::pnp_projection(width, height, fx, fy, near, far, self.flip_y));
    }

    /// Number of view matrix recomputations so far
    pub fn view_recompute_count(&self) -> u64 {
        self.view_recomputes
    }

    /// Number of view-projection recomputations so far
    pub fn view_projection_recompute_count(&self) -> u64 {
        self.view_projection_recomputes
    }
}
