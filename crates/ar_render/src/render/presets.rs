//! Mesh presets
//!
//! A [`MaterialPreset`] decides which shaders a loaded mesh uses, which
//! macros they are compiled with and where each submesh finds its textures.
//! Textures sit next to the mesh file and are named after the mesh stem and
//! the submesh's material name:
//!
//! ```text
//! models/chair.obj
//! models/chair_Wood_Base.png
//! models/chair_Wood_RMA.png
//! models/chair_Wood_Normal.png     (optional, enables USE_NORMAL_MAP)
//! models/chair_Wood_Emissive.png   (optional, enables USE_EMISSIVE_MAP)
//! ```

use crate::assets::{AssetSource, ParseOptions};
use crate::core::{RendererConfig, ShaderPair};
use crate::foundation::collections::ProgramId;
use crate::render::backend::GraphicsBackend;
use crate::render::material::Material;
use crate::render::mesh::Mesh;
use crate::render::resource_cache::{LoadedTexture, ProgramKey, ResourceCache};

/// Macro enabling the normal map path of the PBR shader
pub const NORMAL_MAP_MACRO: &str = "#define USE_NORMAL_MAP\n";
/// Macro enabling the emissive map path of the PBR shader
pub const EMISSIVE_MAP_MACRO: &str = "#define USE_EMISSIVE_MAP\n";

/// How a mesh file is turned into materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialPreset {
    /// Metallic-roughness PBR with base, RMA and optional normal / emissive maps
    Pbr,
    /// Base color only
    Unlit,
    /// Photogrammetry scan with a JPEG base map; keeps export triangles
    Scan,
    /// Depth-only mask textured with a fixed pattern
    DepthMask,
    /// Invisible occluder, registered for drawing on creation
    Occluder,
}

impl MaterialPreset {
    /// Shaders this preset compiles
    pub fn shaders(self, config: &RendererConfig) -> &ShaderPair {
        let library = &config.shaders;
        match self {
            Self::Pbr => &library.pbr,
            Self::Unlit => &library.unlit,
            Self::Scan => &library.scan,
            Self::DepthMask => &library.depth_mask,
            Self::Occluder => &library.occluder,
        }
    }

    /// Parser switches this preset needs
    pub fn parse_options(self) -> ParseOptions {
        ParseOptions {
            export_triangles: self == Self::Scan,
        }
    }

    /// Whether materials depend on the mesh file's material names
    pub fn needs_material_names(self) -> bool {
        !matches!(self, Self::Occluder)
    }

    /// Whether the mesh joins the render list as soon as it is created
    pub fn auto_register(self) -> bool {
        matches!(self, Self::Occluder)
    }
}

/// Options for [`crate::render::Renderer::create_mesh`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshLoadOptions {
    /// Texture subdirectory next to the mesh tried before the plain path
    pub texture_variant: Option<String>,
    /// Create every submesh with updatable position buffers
    pub dynamic: bool,
}

impl MeshLoadOptions {
    /// Look for textures in `<dir>/<variant>/` first
    pub fn with_texture_variant(mut self, variant: impl Into<String>) -> Self {
        self.texture_variant = Some(variant.into());
        self
    }

    /// Create dynamic submeshes
    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }
}

/// Mesh path without its extension
pub fn mesh_stem(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    }
}

/// `<dir>/<variant>/<name>` for a stem `<dir>/<name>`
fn variant_stem(stem: &str, variant: &str) -> String {
    match stem.rsplit_once('/') {
        Some((dir, name)) => format!("{dir}/{variant}/{name}"),
        None => format!("{variant}/{stem}"),
    }
}

/// Candidate prefixes `<stem>_<material>_`, variant first
fn texture_prefixes(stem: &str, material: &str, options: &MeshLoadOptions) -> Vec<String> {
    let mut prefixes = Vec::with_capacity(2);
    if let Some(variant) = &options.texture_variant {
        prefixes.push(format!("{}_{material}_", variant_stem(stem, variant)));
    }
    prefixes.push(format!("{stem}_{material}_"));
    prefixes
}

/// Builds preset materials for a freshly parsed mesh
pub(crate) struct PresetLoader<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub source: &'a dyn AssetSource,
    pub cache: &'a mut ResourceCache,
    pub config: &'a RendererConfig,
}

impl PresetLoader<'_> {
    /// Give every submesh its preset material.
    ///
    /// `names` holds one material name per submesh. A submesh whose program
    /// fails to load is left without a material.
    pub fn apply(&mut self, preset: MaterialPreset, mesh: &mut Mesh, names: &[String], stem: &str, options: &MeshLoadOptions) {
        let count = if preset.needs_material_names() {
            names.len().min(mesh.submeshes().len())
        } else {
            mesh.submeshes().len()
        };

        for index in 0..count {
            let name = names.get(index).map_or("", String::as_str);
            let material = match preset {
                MaterialPreset::Pbr => self.pbr_material(mesh, stem, name, options),
                MaterialPreset::Unlit => self.base_only_material(mesh, preset, stem, name, "Base.png", options),
                MaterialPreset::Scan => self.base_only_material(mesh, preset, stem, name, "Base.jpg", options),
                MaterialPreset::DepthMask => self.depth_mask_material(mesh),
                MaterialPreset::Occluder => self.program(preset, String::new()).map(Material::new),
            };

            match material {
                Some(material) if name.is_empty() => mesh.submeshes_mut()[index].set_material(material),
                Some(material) => mesh.submeshes_mut()[index].set_material(material.with_name(name)),
                None => log::warn!("Submesh {} of {} has no material", index, mesh.name()),
            }
        }
    }

    fn pbr_material(&mut self, mesh: &mut Mesh, stem: &str, name: &str, options: &MeshLoadOptions) -> Option<Material> {
        let prefixes = texture_prefixes(stem, name, options);
        let base = self.acquire(mesh, &prefixes, "Base.png", true, true);
        let rma = self.acquire(mesh, &prefixes, "RMA.png", true, true);
        let normal = self.acquire(mesh, &prefixes, "Normal.png", true, false);
        let emissive = self.acquire(mesh, &prefixes, "Emissive.png", true, false);

        let mut macros = String::new();
        if normal.is_some() {
            macros.push_str(NORMAL_MAP_MACRO);
        }
        if emissive.is_some() {
            macros.push_str(EMISSIVE_MAP_MACRO);
        }

        let mut material = Material::new(self.program(MaterialPreset::Pbr, macros)?);
        material.set_texture("baseMap", base.map(|t| t.id));
        material.set_texture("rmaMap", rma.map(|t| t.id));
        material.set_translucent(base.is_some_and(|t| t.translucent));
        if let Some(normal) = normal {
            material.set_texture("normalMap", Some(normal.id));
        }
        if let Some(emissive) = emissive {
            material.set_texture("emissiveMap", Some(emissive.id));
        }
        Some(material)
    }

    fn base_only_material(
        &mut self,
        mesh: &mut Mesh,
        preset: MaterialPreset,
        stem: &str,
        name: &str,
        suffix: &str,
        options: &MeshLoadOptions,
    ) -> Option<Material> {
        let prefixes = texture_prefixes(stem, name, options);
        let base = self.acquire(mesh, &prefixes, suffix, false, true);

        let mut material = Material::new(self.program(preset, String::new())?);
        material.set_texture("baseMap", base.map(|t| t.id));
        material.set_translucent(base.is_some_and(|t| t.translucent));
        Some(material)
    }

    fn depth_mask_material(&mut self, mesh: &mut Mesh) -> Option<Material> {
        let path = self.config.resource_path(&self.config.environment.depth_mask_texture);
        let base = self.acquire(mesh, &[path], "", false, true);

        let mut material = Material::new(self.program(MaterialPreset::DepthMask, String::new())?);
        material.set_texture("baseMap", base.map(|t| t.id));
        material.set_translucent(base.is_some_and(|t| t.translucent));
        Some(material)
    }

    /// Load the first `<prefix><suffix>` that exists and take a reference on it
    fn acquire(
        &mut self,
        mesh: &mut Mesh,
        prefixes: &[String],
        suffix: &str,
        generate_mipmap: bool,
        required: bool,
    ) -> Option<LoadedTexture> {
        for prefix in prefixes {
            let path = format!("{prefix}{suffix}");
            match self.cache.load_texture(self.backend, self.source, &path, generate_mipmap) {
                Ok(loaded) => {
                    self.cache.retain_texture(&path);
                    mesh.track_texture_key(path);
                    return Some(loaded);
                }
                Err(e) => log::debug!("Texture {} not loaded: {}", path, e),
            }
        }

        if required {
            log::warn!("No {} texture for mesh {}", suffix, mesh.name());
        }
        None
    }

    fn program(&mut self, preset: MaterialPreset, macros: String) -> Option<ProgramId> {
        let shaders = preset.shaders(self.config);
        let key = ProgramKey::new(
            self.config.resource_path(&shaders.vertex),
            self.config.resource_path(&shaders.fragment),
            macros,
        );

        match self.cache.load_program(self.backend, self.source, &key) {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("Program {} + {} failed: {}", key.vertex, key.fragment, e);
                None
            }
        }
    }
}
