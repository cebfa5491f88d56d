//! # AR Render
//!
//! GPU-agnostic mesh, material and resource model for a mobile AR renderer.
//!
//! ## Features
//!
//! - **Mesh parsing**: OBJ-style text split into per-material submeshes
//! - **Resource cache**: deduplicated shader programs and textures
//! - **Materials**: named parameters with automatic builtin uniforms
//! - **Matrix caching**: dirty-flag mesh transforms and camera matrices
//! - **Headless backend**: the full pipeline runs without a GPU
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ar_render::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::new(720, 1280).with_resource_dir("./assets");
//!     let source = FileSystemSource::with_root("./assets");
//!     let mut renderer = Renderer::new(HeadlessBackend::new(), source, config)?;
//!
//!     let chair = renderer.create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())?;
//!     renderer.add_mesh(chair);
//!
//!     renderer.begin_frame();
//!     renderer.render_meshes();
//!     renderer.end_frame();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        assets::{AssetSource, FileSystemSource, ImageData, MemorySource, PixelFormat},
        core::{Config, RendererConfig},
        foundation::{
            collections::{MeshId, ProgramId, TextureId},
            math::{Mat4, Quat, Transform, Vec3},
        },
        render::{
            Camera, GraphicsBackend, HeadlessBackend, Material, MaterialParam, MaterialPreset, Mesh,
            MeshLoadOptions, RenderError, RenderResult, Renderer,
        },
    };
}
