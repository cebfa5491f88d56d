//! Material parameter values

use crate::foundation::collections::TextureId;
use crate::foundation::math::Mat4;

/// Number of spherical-harmonics coefficients (3 bands)
pub const SH_COEFFICIENT_COUNT: usize = 9;

/// Spherical-harmonics lighting coefficients, one RGB triple per basis function
pub type ShCoefficients = [[f32; 3]; SH_COEFFICIENT_COUNT];

/// A typed uniform value stored on a material
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialParam {
    /// `float`
    Float(f32),
    /// `mat4`
    Matrix4(Mat4),
    /// Sampler bound to the next free texture unit; `None` draws without it
    Texture(Option<TextureId>),
    /// `vec3[9]`
    SphericalHarmonics(ShCoefficients),
}

impl MaterialParam {
    /// True for texture parameters, bound or not
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture(_))
    }

    /// Texture carried by this parameter
    pub fn texture(&self) -> Option<TextureId> {
        match self {
            Self::Texture(texture) => *texture,
            _ => None,
        }
    }
}

impl From<f32> for MaterialParam {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Mat4> for MaterialParam {
    fn from(value: Mat4) -> Self {
        Self::Matrix4(value)
    }
}

impl From<TextureId> for MaterialParam {
    fn from(value: TextureId) -> Self {
        Self::Texture(Some(value))
    }
}

impl From<ShCoefficients> for MaterialParam {
    fn from(value: ShCoefficients) -> Self {
        Self::SphericalHarmonics(value)
    }
}
