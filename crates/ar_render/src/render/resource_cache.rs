//! Resource cache
//!
//! Deduplicating owner of every program and texture the renderer creates.
//! Programs are keyed by `(vertex path, fragment path, macros)`, textures by
//! resource path. Everyone else holds [`ProgramId`] / [`TextureId`] keys,
//! which resolve to `None` once the entry is gone.
//!
//! Cached textures pulled in by meshes are reference counted and released
//! when the last mesh lets go. Textures loaded directly through the renderer
//! (environment maps, caller loads) are pinned and live until
//! [`ResourceCache::release_all`]. Private textures have no key and belong to
//! the mesh that created them.

use std::collections::HashMap;

use crate::assets::{AssetSource, ImageData, PixelFormat};
use crate::foundation::collections::{HandleMap, ProgramId, TextureId};
use crate::render::backend::GraphicsBackend;
use crate::render::program::Program;
use crate::render::texture::{Texture, TextureFormat};
use crate::render::{RenderError, RenderResult};

/// Cube map face suffixes in upload order (`+X, -X, +Y, -Y, +Z, -Z`)
pub const CUBE_FACES: [&str; 6] = ["right", "left", "top", "bottom", "back", "front"];

/// Program cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Vertex shader path
    pub vertex: String,
    /// Fragment shader path
    pub fragment: String,
    /// Macro block prepended to both stages
    pub macros: String,
}

impl ProgramKey {
    /// Build a key
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>, macros: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            macros: macros.into(),
        }
    }
}

/// Result of a texture load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTexture {
    /// Cached texture
    pub id: TextureId,
    /// Texture has partially transparent pixels
    pub translucent: bool,
}

#[derive(Debug, Clone)]
struct TextureEntry {
    id: TextureId,
    translucent: bool,
    refs: u32,
    pinned: bool,
}

/// Owner of programs and textures
#[derive(Debug, Default)]
pub struct ResourceCache {
    programs: HandleMap<ProgramId, Program>,
    program_keys: HashMap<ProgramKey, ProgramId>,
    textures: HandleMap<TextureId, Texture>,
    texture_keys: HashMap<String, TextureEntry>,
}

impl ResourceCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile (or reuse) the program for `key`.
    ///
    /// On a miss both sources are read, `macros + "\n"` is prepended to each,
    /// and the result is linked. A failed link caches nothing.
    pub fn load_program(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        source: &dyn AssetSource,
        key: &ProgramKey,
    ) -> RenderResult<ProgramId> {
        if let Some(&id) = self.program_keys.get(key) {
            return Ok(id);
        }

        log::debug!("Program cache miss: {} + {} [{:?}]", key.vertex, key.fragment, key.macros);

        let prefix = format!("{}\n", key.macros);
        let vertex_source = format!("{prefix}{}", source.read_text(&key.vertex)?);
        let fragment_source = format!("{prefix}{}", source.read_text(&key.fragment)?);

        let compiled = backend.compile_link_program(&vertex_source, &fragment_source)?;
        let id = self.programs.insert(Program::from_compiled(compiled));
        self.program_keys.insert(key.clone(), id);
        Ok(id)
    }

    /// Load (or reuse) the 2D texture at `path`.
    ///
    /// A hit returns the cached id and the translucency flag computed when
    /// the texture was first decoded.
    pub fn load_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        source: &dyn AssetSource,
        path: &str,
        generate_mipmap: bool,
    ) -> RenderResult<LoadedTexture> {
        if let Some(entry) = self.texture_keys.get(path) {
            return Ok(LoadedTexture {
                id: entry.id,
                translucent: entry.translucent,
            });
        }

        log::debug!("Texture cache miss: {}", path);

        let image = source.decode_image(path, PixelFormat::Rgba)?;
        let handle = backend.upload_texture_2d(&image, generate_mipmap)?;
        let translucent = image.has_partial_alpha();

        let id = self.textures.insert(Texture::new_2d(
            handle,
            image.width,
            image.height,
            TextureFormat::from(image.format),
        ));
        self.texture_keys.insert(
            path.to_string(),
            TextureEntry {
                id,
                translucent,
                refs: 0,
                pinned: false,
            },
        );

        Ok(LoadedTexture { id, translucent })
    }

    /// Load (or reuse) a cube texture from `<base>_<face>_<level>.png`.
    ///
    /// With `mip_chain`, levels below 0 are uploaded until the face size
    /// halves to zero. A missing level-0 face fails the load; a missing mip
    /// face ends the chain early.
    pub fn load_cube_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        source: &dyn AssetSource,
        base_path: &str,
        mip_chain: bool,
    ) -> RenderResult<TextureId> {
        if let Some(entry) = self.texture_keys.get(base_path) {
            return Ok(entry.id);
        }

        log::debug!("Cube texture cache miss: {}", base_path);

        let faces = load_cube_faces(source, base_path, 0)?;
        let face_size = faces[0].width;
        let handle = backend.create_cube_texture(&faces, mip_chain)?;

        if mip_chain && face_size > 2 {
            let mut level = 1;
            let mut size = face_size / 2;
            while size != 0 {
                match load_cube_faces(source, base_path, level) {
                    Ok(mip_faces) => backend.upload_cube_mip_level(handle, &mip_faces, level)?,
                    Err(e) => {
                        log::warn!("Cube texture {} mip chain stops at level {}: {}", base_path, level, e);
                        break;
                    }
                }
                size /= 2;
                level += 1;
            }
        }

        let id = self.textures.insert(Texture::new_cube(handle, face_size));
        self.texture_keys.insert(
            base_path.to_string(),
            TextureEntry {
                id,
                translucent: false,
                refs: 0,
                pinned: false,
            },
        );
        Ok(id)
    }

    /// Upload pixels that have no resource path.
    ///
    /// The texture is not cached; its owner must call
    /// [`ResourceCache::destroy_private_texture`].
    pub fn create_private_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        image: &ImageData,
        generate_mipmap: bool,
    ) -> RenderResult<TextureId> {
        let handle = backend.upload_texture_2d(image, generate_mipmap)?;
        Ok(self.textures.insert(Texture::new_2d(
            handle,
            image.width,
            image.height,
            TextureFormat::from(image.format),
        )))
    }

    /// Release a private texture
    pub fn destroy_private_texture(&mut self, backend: &mut dyn GraphicsBackend, id: TextureId) {
        if self.texture_keys.values().any(|entry| entry.id == id) {
            log::warn!("Refusing to destroy cached texture {:?} as private", id);
            return;
        }
        if let Some(texture) = self.textures.remove(id) {
            backend.destroy_texture(texture.handle);
        }
    }

    /// Keep a cached texture alive until [`ResourceCache::release_all`]
    pub fn pin_texture(&mut self, path: &str) {
        if let Some(entry) = self.texture_keys.get_mut(path) {
            entry.pinned = true;
        }
    }

    /// Take a reference to a cached texture
    pub fn retain_texture(&mut self, path: &str) -> Option<TextureId> {
        let entry = self.texture_keys.get_mut(path)?;
        entry.refs += 1;
        Some(entry.id)
    }

    /// Drop a reference; unpinned textures with no references are destroyed
    pub fn release_texture(&mut self, backend: &mut dyn GraphicsBackend, path: &str) {
        let Some(entry) = self.texture_keys.get_mut(path) else {
            log::warn!("Release of unknown texture {}", path);
            return;
        };

        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 || entry.pinned {
            return;
        }

        let id = entry.id;
        self.texture_keys.remove(path);
        if let Some(texture) = self.textures.remove(id) {
            log::debug!("Texture {} released", path);
            backend.destroy_texture(texture.handle);
        }
    }

    /// Look up a program
    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id)
    }

    /// Look up a texture
    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Cached texture id for a path
    pub fn texture_id(&self, path: &str) -> Option<TextureId> {
        self.texture_keys.get(path).map(|entry| entry.id)
    }

    /// Mesh references held on a cached texture
    pub fn texture_refs(&self, path: &str) -> Option<u32> {
        self.texture_keys.get(path).map(|entry| entry.refs)
    }

    /// Live programs
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Live textures, cached and private
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Destroy everything
    pub fn release_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, program) in self.programs.drain() {
            backend.destroy_program(program.handle());
        }
        for (_, texture) in self.textures.drain() {
            backend.destroy_texture(texture.handle);
        }
        self.program_keys.clear();
        self.texture_keys.clear();
    }
}

fn load_cube_faces(source: &dyn AssetSource, base_path: &str, level: u32) -> RenderResult<[ImageData; 6]> {
    let mut faces = Vec::with_capacity(CUBE_FACES.len());
    for face in CUBE_FACES {
        let path = format!("{base_path}_{face}_{level}.png");
        faces.push(source.decode_image(&path, PixelFormat::Rgba)?);
    }
    <[ImageData; 6]>::try_from(faces)
        .map_err(|_| RenderError::ResourceCreationFailed(format!("cube texture {base_path} needs six faces")))
}
