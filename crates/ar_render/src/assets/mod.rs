//! Asset loading
//!
//! Mesh text parsing, companion material files, image decoding, and the
//! [`AssetSource`] abstraction the renderer reads everything through.

pub mod image_loader;
pub mod mtl_parser;
pub mod obj_parser;
pub mod source;

pub use image_loader::{ImageData, PixelFormat};
pub use obj_parser::{ParseError, ParseOptions, ParsedMesh, SubmeshGeometry};
pub use source::{AssetSource, FileSystemSource, MemorySource};

use thiserror::Error;

/// Asset errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// No resource at this path
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Reading the resource failed
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Resolved path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The image could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Pixel buffer does not match its declared layout
    #[error("Invalid pixel data: {0}")]
    InvalidPixels(String),
}
