//! # Renderer
//!
//! Owner of the backend, the resource cache, the camera, the environment
//! textures and every mesh. Meshes are referred to by [`MeshId`]; a mesh in
//! the render list is drawn by [`Renderer::render_meshes`], any other mesh
//! can still be drawn manually with [`Renderer::render_opaque_submeshes`] and
//! [`Renderer::render_translucent_submeshes`].
//!
//! ## Frame
//!
//! ```text
//! begin_frame()
//! render_background(camera_feed)     optional
//! render_meshes()                    opaque pass, then translucent pass
//! end_frame()
//! ```
//!
//! The opaque pass draws with depth test and depth write. The translucent
//! pass keeps the depth test, turns depth write off and blends
//! `ONE, ONE_MINUS_SRC_ALPHA`. Translucent submeshes are drawn in render list
//! order without sorting.

use crate::assets::mtl_parser;
use crate::assets::obj_parser::{self, ParsedMesh};
use crate::assets::{AssetSource, ImageData};
use crate::core::RendererConfig;
use crate::foundation::collections::{HandleMap, MeshId, ProgramId, TextureId};
use crate::render::backend::{GraphicsBackend, PassState, TextureHandle};
use crate::render::builtins::BuiltinUniform;
use crate::render::camera::Camera;
use crate::render::environment::EnvironmentMaps;
use crate::render::material::ApplyContext;
use crate::render::mesh::{Mesh, PassFilter};
use crate::render::presets::{mesh_stem, MaterialPreset, MeshLoadOptions, PresetLoader};
use crate::render::resource_cache::{LoadedTexture, ProgramKey, ResourceCache};
use crate::render::submesh::Submesh;
use crate::render::{RenderError, RenderResult};

/// Mesh, material and resource owner for one rendering surface
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    source: Box<dyn AssetSource>,
    config: RendererConfig,
    cache: ResourceCache,
    camera: Camera,
    environment: EnvironmentMaps,
    meshes: HandleMap<MeshId, Mesh>,
    render_list: Vec<MeshId>,
    clear_color: [f32; 4],
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Create a renderer over a backend and an asset source
    pub fn new(backend: B, source: impl AssetSource + 'static, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!(
            "Renderer created for {}x{} (resources at {:?})",
            config.screen_width,
            config.screen_height,
            config.resource_dir
        );

        Ok(Self {
            camera: Camera::from_config(&config.camera, config.aspect_ratio()),
            environment: EnvironmentMaps::new(&config),
            backend,
            source: Box::new(source),
            config,
            cache: ResourceCache::new(),
            meshes: HandleMap::with_key(),
            render_list: Vec::new(),
            clear_color: [0.0; 4],
        })
    }

    /// Backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Screen width in pixels
    pub fn screen_width(&self) -> u32 {
        self.config.screen_width
    }

    /// Screen height in pixels
    pub fn screen_height(&self) -> u32 {
        self.config.screen_height
    }

    /// Camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Programs and textures
    pub fn resources(&self) -> &ResourceCache {
        &self.cache
    }

    /// Environment textures
    pub fn environment_mut(&mut self) -> &mut EnvironmentMaps {
        &mut self.environment
    }

    /// Color the frame is cleared to
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Compile (or reuse) a program from two shader paths
    pub fn load_program(&mut self, vertex: &str, fragment: &str, macros: &str) -> RenderResult<ProgramId> {
        let key = ProgramKey::new(vertex, fragment, macros);
        self.cache.load_program(&mut self.backend, &*self.source, &key)
    }

    /// Load (or reuse) a 2D texture kept alive for the renderer's lifetime
    pub fn load_texture(&mut self, path: &str, generate_mipmap: bool) -> RenderResult<LoadedTexture> {
        let loaded = self
            .cache
            .load_texture(&mut self.backend, &*self.source, path, generate_mipmap)?;
        self.cache.pin_texture(path);
        Ok(loaded)
    }

    /// Load (or reuse) a cube texture kept alive for the renderer's lifetime
    pub fn load_cube_texture(&mut self, base_path: &str, mip_chain: bool) -> RenderResult<TextureId> {
        let id = self
            .cache
            .load_cube_texture(&mut self.backend, &*self.source, base_path, mip_chain)?;
        self.cache.pin_texture(base_path);
        Ok(id)
    }

    /// Upload pixels owned by a mesh and released with it
    pub fn create_private_texture(&mut self, mesh: MeshId, image: &ImageData, generate_mipmap: bool) -> RenderResult<TextureId> {
        let owner = self.meshes.get_mut(mesh).ok_or(RenderError::StaleHandle("mesh"))?;
        let id = self.cache.create_private_texture(&mut self.backend, image, generate_mipmap)?;
        owner.track_private_texture(id);
        Ok(id)
    }

    /// Load a mesh file and give its submeshes `preset` materials.
    ///
    /// Parse failures produce no mesh. When the file names no materials the
    /// first `newmtl` of the companion `<stem>.mtl` is used; without one the
    /// mesh is returned with no materials.
    pub fn create_mesh(&mut self, path: &str, preset: MaterialPreset, options: &MeshLoadOptions) -> RenderResult<MeshId> {
        let text = self.source.read_text(path)?;
        let ParsedMesh {
            submeshes,
            mut material_names,
        } = obj_parser::parse_with(&text, preset.parse_options()).map_err(|source| RenderError::Parse {
            path: path.to_string(),
            source,
        })?;

        let submeshes = submeshes
            .into_iter()
            .map(|geometry| Submesh::new(geometry).with_dynamic(options.dynamic))
            .collect();
        let mut mesh = Mesh::new(submeshes).with_name(path);

        let stem = mesh_stem(path);
        if material_names.is_empty() && preset.needs_material_names() {
            material_names.extend(self.companion_material_name(stem));
        }
        if !material_names.is_empty() {
            debug_assert_eq!(
                material_names.len(),
                mesh.submeshes().len(),
                "material name count differs from submesh count"
            );
        } else if preset.needs_material_names() {
            log::warn!("Mesh {} names no materials; created without materials", path);
        }

        PresetLoader {
            backend: &mut self.backend,
            source: &*self.source,
            cache: &mut self.cache,
            config: &self.config,
        }
        .apply(preset, &mut mesh, &material_names, stem, options);

        log::debug!("Mesh {} created with {} submeshes ({:?})", path, mesh.submeshes().len(), preset);
        let id = self.meshes.insert(mesh);
        if preset.auto_register() {
            self.add_mesh(id);
        }
        Ok(id)
    }

    fn companion_material_name(&self, stem: &str) -> Option<String> {
        let path = format!("{stem}.mtl");
        match self.source.read_text(&path) {
            Ok(text) => mtl_parser::first_material_name(&text),
            Err(e) => {
                log::debug!("No companion material file {}: {}", path, e);
                None
            }
        }
    }

    /// Take ownership of a mesh built by the caller
    pub fn insert_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// Look up a mesh
    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    /// Look up a mesh, mutably
    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id)
    }

    /// Live meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Overwrite the positions of one dynamic submesh
    pub fn update_submesh_positions(&mut self, id: MeshId, submesh: usize, positions: &[[f32; 3]]) -> RenderResult<()> {
        let mesh = self.meshes.get_mut(id).ok_or(RenderError::StaleHandle("mesh"))?;
        let submesh = mesh
            .submeshes_mut()
            .get_mut(submesh)
            .ok_or_else(|| RenderError::InvalidUpdate(format!("mesh has no submesh {submesh}")))?;
        submesh.update_positions(&mut self.backend, positions)
    }

    /// Destroy a mesh, its device buffers, private textures and texture
    /// references. Returns `false` for an unknown id.
    pub fn destroy_mesh(&mut self, id: MeshId) -> bool {
        let Some(mut mesh) = self.meshes.remove(id) else {
            return false;
        };
        self.remove_mesh(id);
        mesh.release(&mut self.backend, &mut self.cache);
        true
    }

    /// Register a mesh for [`Renderer::render_meshes`]; `false` if already registered
    pub fn add_mesh(&mut self, id: MeshId) -> bool {
        if self.render_list.contains(&id) {
            return false;
        }
        self.render_list.push(id);
        true
    }

    /// Unregister a mesh; `false` if it was not registered
    pub fn remove_mesh(&mut self, id: MeshId) -> bool {
        match self.render_list.iter().position(|registered| *registered == id) {
            Some(index) => {
                self.render_list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Registered meshes in draw order
    pub fn render_list(&self) -> &[MeshId] {
        &self.render_list
    }

    /// Start a frame
    pub fn begin_frame(&mut self) {
        self.backend.begin_frame(self.clear_color);
    }

    /// Draw a full-screen camera feed behind everything else.
    ///
    /// The feed is a device texture owned by the caller, usually a new one
    /// every frame, so it bypasses the resource cache.
    pub fn render_background(&mut self, texture: TextureHandle) {
        self.backend.set_pass_state(PassState::empty());
        self.backend.draw_background(texture);
        self.backend.set_pass_state(PassState::OPAQUE);
    }

    /// Draw every registered mesh: opaque submeshes first, then translucent ones
    pub fn render_meshes(&mut self) {
        self.backend.set_pass_state(PassState::OPAQUE);
        for index in 0..self.render_list.len() {
            self.draw_registered(index, PassFilter::Opaque);
        }

        self.backend.set_pass_state(PassState::TRANSLUCENT);
        for index in 0..self.render_list.len() {
            self.draw_registered(index, PassFilter::Translucent);
        }
    }

    fn draw_registered(&mut self, index: usize, filter: PassFilter) {
        let id = self.render_list[index];
        if let Err(e) = self.draw_mesh(id, filter) {
            log::warn!("Registered mesh {:?} not drawn: {}", id, e);
        }
    }

    /// Draw one mesh's opaque submeshes with the current pass state
    pub fn render_opaque_submeshes(&mut self, id: MeshId) -> RenderResult<usize> {
        self.draw_mesh(id, PassFilter::Opaque)
    }

    /// Draw one mesh's translucent submeshes with the current pass state
    pub fn render_translucent_submeshes(&mut self, id: MeshId) -> RenderResult<usize> {
        self.draw_mesh(id, PassFilter::Translucent)
    }

    /// Restore default state and finish the frame
    pub fn end_frame(&mut self) {
        self.backend.set_pass_state(PassState::OPAQUE);
        self.backend.end_frame();
    }

    fn draw_mesh(&mut self, id: MeshId, filter: PassFilter) -> RenderResult<usize> {
        let Self {
            backend,
            source,
            cache,
            camera,
            environment,
            meshes,
            ..
        } = self;
        let mesh = meshes.get_mut(id).ok_or(RenderError::StaleHandle("mesh"))?;

        let wanted: Vec<BuiltinUniform> = mesh
            .submeshes()
            .iter()
            .filter_map(Submesh::material)
            .filter_map(|material| cache.program(material.program()))
            .flat_map(|program| program.builtins().iter().map(|(_, builtin)| *builtin))
            .filter(|builtin| builtin.is_texture())
            .collect();
        for builtin in wanted {
            environment.ensure(builtin, cache, backend, &**source);
        }

        let camera = camera.matrices();
        let world = mesh.transform();
        let mut ctx = ApplyContext {
            backend,
            resources: cache,
            camera: &camera,
            environment,
            world: &world,
        };
        Ok(mesh.draw(&mut ctx, filter))
    }

    /// Release every mesh, program and texture
    pub fn release_all(&mut self) {
        for (_, mut mesh) in self.meshes.drain() {
            mesh.release(&mut self.backend, &mut self.cache);
        }
        self.render_list.clear();
        self.environment.reset();
        self.cache.release_all(&mut self.backend);
    }
}

impl<B: GraphicsBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.release_all();
        log::debug!("Renderer released");
    }
}
