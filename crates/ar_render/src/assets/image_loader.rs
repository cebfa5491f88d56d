//! Image loading utilities for texture data
//!
//! Decodes PNG and JPEG with the `image` crate into tightly packed 8-bit
//! pixel buffers ready for upload.

use std::path::Path;

use crate::assets::AssetError;

/// Pixel layout of an [`ImageData`] buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 3 bytes per pixel
    Rgb,
    /// 4 bytes per pixel, alpha last
    Rgba,
    /// 4 bytes per pixel, blue first, alpha last
    Bgra,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Whether the format carries an alpha channel
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra)
    }
}

/// Decoded image data ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bytes per row, at least `width * bytes_per_pixel`
    pub stride: usize,
    /// Pixel layout
    pub format: PixelFormat,
    /// Raw pixel data, `stride * height` bytes
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P, format: PixelFormat) -> Result<Self, AssetError> {
        let path_ref = path.as_ref();
        log::debug!("Loading image from: {:?}", path_ref);

        let bytes = std::fs::read(path_ref).map_err(|e| AssetError::Io {
            path: path_ref.display().to_string(),
            source: e,
        })?;
        Self::from_bytes(&bytes, format)
    }

    /// Decode an image from encoded bytes
    pub fn from_bytes(bytes: &[u8], format: PixelFormat) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::Decode(format!("Failed to decode image: {e}")))?;

        let (width, height, pixels) = match format {
            PixelFormat::Rgb => {
                let rgb = img.to_rgb8();
                let (w, h) = rgb.dimensions();
                (w, h, rgb.into_raw())
            }
            PixelFormat::Rgba => {
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                (w, h, rgba.into_raw())
            }
            PixelFormat::Bgra => {
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                let mut raw = rgba.into_raw();
                for pixel in raw.chunks_exact_mut(4) {
                    pixel.swap(0, 2);
                }
                (w, h, raw)
            }
        };

        log::debug!("Decoded image {}x{} as {:?}", width, height, format);

        Ok(Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            pixels,
        })
    }

    /// Create a solid color RGBA image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            pixels.extend_from_slice(&color);
        }

        Self {
            width,
            height,
            stride: width as usize * 4,
            format: PixelFormat::Rgba,
            pixels,
        }
    }

    /// Wrap raw pixels supplied by the caller
    pub fn from_raw(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, AssetError> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes || pixels.len() < stride * height as usize {
            return Err(AssetError::InvalidPixels(format!(
                "{}x{} {:?} with stride {} needs {} bytes, got {}",
                width,
                height,
                format,
                stride,
                stride * height as usize,
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            stride,
            format,
            pixels,
        })
    }

    /// Size of the pixel buffer in bytes
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }

    /// True if any pixel has `0 < alpha < 255`.
    ///
    /// Always false for formats without alpha. Rows are walked by `stride`,
    /// so padding bytes are never read as alpha.
    pub fn has_partial_alpha(&self) -> bool {
        if !self.format.has_alpha() {
            return false;
        }

        let row_bytes = self.width as usize * 4;
        self.pixels
            .chunks(self.stride.max(1))
            .take(self.height as usize)
            .any(|row| {
                row[..row_bytes.min(row.len())]
                    .chunks_exact(4)
                    .any(|pixel| pixel[3] > 0 && pixel[3] < 255)
            })
    }
}
