//! # Rendering System
//!
//! GPU-agnostic mesh, material and resource model. Everything here talks to
//! the device through the [`GraphicsBackend`] trait, so the whole pipeline
//! runs against [`HeadlessBackend`] in tests.
//!
//! ## Architecture
//!
//! - **Renderer**: owner of the backend, caches, camera and meshes; runs the
//!   opaque and translucent passes
//! - **Resource cache**: deduplicated programs and textures behind slotmap keys
//! - **Materials**: named parameters plus builtin uniforms resolved from scene
//!   state at apply time
//! - **Meshes / submeshes**: cached world transforms and lazily realized
//!   vertex state
//! - **Camera**: cached view and view-projection matrices

pub mod backend;
pub mod builtins;
pub mod camera;
pub mod environment;
pub mod material;
pub mod mesh;
pub mod presets;
pub mod program;
pub mod renderer;
pub mod resource_cache;
pub mod submesh;
pub mod texture;

#[cfg(test)]
mod pipeline_tests;

pub use backend::{GraphicsBackend, HeadlessBackend, PassState, TextureHandle};
pub use builtins::BuiltinUniform;
pub use camera::{Camera, CameraMatrices};
pub use environment::EnvironmentMaps;
pub use material::{ApplyContext, Material, MaterialParam, ShCoefficients};
pub use mesh::{Mesh, PassFilter};
pub use presets::{MaterialPreset, MeshLoadOptions};
pub use program::Program;
pub use renderer::Renderer;
pub use resource_cache::{LoadedTexture, ProgramKey, ResourceCache};
pub use submesh::Submesh;
pub use texture::{Texture, TextureFormat, TextureKind};

use thiserror::Error;

use crate::assets::{AssetError, ParseError};
use crate::config::ConfigError;

/// Rendering error types
#[derive(Error, Debug)]
pub enum RenderError {
    /// A shader stage failed to compile or the program failed to link
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// A device resource could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Asset could not be read or decoded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Mesh text could not be parsed
    #[error("Failed to parse mesh {path}: {source}")]
    Parse {
        /// Mesh path
        path: String,
        /// Parser error
        #[source]
        source: ParseError,
    },

    /// A key referred to a released resource
    #[error("Stale {0} handle")]
    StaleHandle(&'static str),

    /// A buffer update did not fit the existing vertex data
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
