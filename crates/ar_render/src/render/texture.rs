//! GPU texture records
//!
//! A [`Texture`] is the renderer-side view of an uploaded texture: the
//! backend handle plus the metadata materials need to bind it.

use crate::assets::PixelFormat;
use crate::render::backend::TextureHandle;

/// Texture target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// 2D texture
    Texture2D,
    /// Cube map with six faces
    Cube,
}

/// Texel storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGB
    Rgb,
    /// 8-bit RGBA
    Rgba,
}

impl From<PixelFormat> for TextureFormat {
    fn from(format: PixelFormat) -> Self {
        match format {
            PixelFormat::Rgb => Self::Rgb,
            PixelFormat::Rgba | PixelFormat::Bgra => Self::Rgba,
        }
    }
}

/// Uploaded texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Backend handle
    pub handle: TextureHandle,
    /// Width in pixels (face size for cube maps)
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// 2D or cube
    pub kind: TextureKind,
}

impl Texture {
    /// Record a 2D texture
    pub fn new_2d(handle: TextureHandle, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            handle,
            width,
            height,
            format,
            kind: TextureKind::Texture2D,
        }
    }

    /// Record a cube texture with square faces
    pub fn new_cube(handle: TextureHandle, face_size: u32) -> Self {
        Self {
            handle,
            width: face_size,
            height: face_size,
            format: TextureFormat::Rgba,
            kind: TextureKind::Cube,
        }
    }
}
