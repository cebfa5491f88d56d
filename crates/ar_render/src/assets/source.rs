//! Asset sources
//!
//! Path resolution and file access live behind [`AssetSource`] so the
//! renderer can be driven from disk, an app bundle, or memory in tests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::assets::image_loader::{ImageData, PixelFormat};
use crate::assets::AssetError;

/// Supplies text and decoded images by resource path
pub trait AssetSource {
    /// Read a whole text resource
    fn read_text(&self, path: &str) -> Result<String, AssetError>;

    /// Decode an image resource into the requested pixel format
    fn decode_image(&self, path: &str, format: PixelFormat) -> Result<ImageData, AssetError>;
}

/// Reads resources from the file system
#[derive(Debug, Clone, Default)]
pub struct FileSystemSource {
    root: Option<PathBuf>,
}

impl FileSystemSource {
    /// Open paths exactly as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every path below `root` (a leading `/` is treated as relative)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl AssetSource for FileSystemSource {
    fn read_text(&self, path: &str) -> Result<String, AssetError> {
        let resolved = self.resolve(path);
        std::fs::read_to_string(&resolved).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::NotFound(path.to_string()),
            _ => AssetError::Io {
                path: resolved.display().to_string(),
                source: e,
            },
        })
    }

    fn decode_image(&self, path: &str, format: PixelFormat) -> Result<ImageData, AssetError> {
        let resolved = self.resolve(path);
        if !resolved.exists() {
            return Err(AssetError::NotFound(path.to_string()));
        }
        ImageData::from_file(resolved, format)
    }
}

/// In-memory resources keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    texts: HashMap<String, String>,
    images: HashMap<String, ImageData>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text resource
    pub fn with_text(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert_text(path, text);
        self
    }

    /// Add an image resource
    pub fn with_image(mut self, path: impl Into<String>, image: ImageData) -> Self {
        self.insert_image(path, image);
        self
    }

    /// Add or replace a text resource
    pub fn insert_text(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(path.into(), text.into());
    }

    /// Add or replace an image resource
    pub fn insert_image(&mut self, path: impl Into<String>, image: ImageData) {
        self.images.insert(path.into(), image);
    }
}

impl AssetSource for MemorySource {
    fn read_text(&self, path: &str) -> Result<String, AssetError> {
        self.texts
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }

    fn decode_image(&self, path: &str, format: PixelFormat) -> Result<ImageData, AssetError> {
        let image = self
            .images
            .get(path)
            .ok_or_else(|| AssetError::NotFound(path.to_string()))?;

        if image.format == format {
            return Ok(image.clone());
        }

        // Convert between channel layouts on request
        let bpp = image.format.bytes_per_pixel();
        let mut pixels = Vec::with_capacity(image.width as usize * image.height as usize * format.bytes_per_pixel());
        for row in image.pixels.chunks(image.stride.max(1)).take(image.height as usize) {
            for pixel in row[..image.width as usize * bpp].chunks_exact(bpp) {
                let rgba = match image.format {
                    PixelFormat::Rgb => [pixel[0], pixel[1], pixel[2], 255],
                    PixelFormat::Rgba => [pixel[0], pixel[1], pixel[2], pixel[3]],
                    PixelFormat::Bgra => [pixel[2], pixel[1], pixel[0], pixel[3]],
                };
                match format {
                    PixelFormat::Rgb => pixels.extend_from_slice(&rgba[..3]),
                    PixelFormat::Rgba => pixels.extend_from_slice(&rgba),
                    PixelFormat::Bgra => pixels.extend_from_slice(&[rgba[2], rgba[1], rgba[0], rgba[3]]),
                }
            }
        }

        ImageData::from_raw(
            image.width,
            image.height,
            image.width as usize * format.bytes_per_pixel(),
            format,
            pixels,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_lookup() {
        let source = MemorySource::new().with_text("/models/cube.obj", "v 0 0 0\n");
        assert_eq!(source.read_text("/models/cube.obj").unwrap(), "v 0 0 0\n");
        assert!(matches!(source.read_text("/missing.obj"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_memory_source_converts_format() {
        let source = MemorySource::new().with_image("/t.png", ImageData::solid_color(1, 1, [1, 2, 3, 4]));

        let rgb = source.decode_image("/t.png", PixelFormat::Rgb).unwrap();
        assert_eq!(rgb.pixels, vec![1, 2, 3]);

        let bgra = source.decode_image("/t.png", PixelFormat::Bgra).unwrap();
        assert_eq!(bgra.pixels, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_file_system_source_missing_file() {
        let source = FileSystemSource::with_root(std::env::temp_dir().join("ar_render_missing_root"));
        assert!(matches!(source.read_text("/nothing.obj"), Err(AssetError::NotFound(_))));
        assert!(matches!(
            source.decode_image("/nothing.png", PixelFormat::Rgba),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_system_source_reads_text() {
        let dir = std::env::temp_dir().join(format!("ar_render_source_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("chair.mtl"), "newmtl Chair\n").unwrap();

        let source = FileSystemSource::with_root(&dir);
        assert_eq!(source.read_text("/chair.mtl").unwrap(), "newmtl Chair\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
