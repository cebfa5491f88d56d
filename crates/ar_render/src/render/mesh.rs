//! Meshes
//!
//! A [`Mesh`] is an ordered list of [`Submesh`]es sharing one world
//! transform. The transform matrix is cached and recomputed as
//! `translate × rotate × scale` only after position, rotation or scale
//! changed.
//!
//! A mesh also remembers which cached textures it took references on and
//! which private textures it owns, so [`Mesh::release`] can give them back.

use crate::foundation::collections::TextureId;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::backend::GraphicsBackend;
use crate::render::material::{ApplyContext, ShCoefficients};
use crate::render::resource_cache::ResourceCache;
use crate::render::submesh::Submesh;

/// Which submeshes a draw call covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassFilter {
    /// Submeshes whose material is opaque
    Opaque,
    /// Submeshes whose material is translucent
    Translucent,
}

impl PassFilter {
    fn accepts(self, submesh: &Submesh) -> bool {
        match self {
            Self::Opaque => !submesh.is_translucent(),
            Self::Translucent => submesh.is_translucent(),
        }
    }
}

/// Submeshes with a shared world transform
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    submeshes: Vec<Submesh>,

    transform: Transform,
    matrix: Mat4,
    dirty: bool,
    recomputes: u64,

    texture_keys: Vec<String>,
    private_textures: Vec<TextureId>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Mesh {
    /// Mesh over existing submeshes, at the origin
    pub fn new(submeshes: Vec<Submesh>) -> Self {
        Self {
            name: String::new(),
            submeshes,
            transform: Transform::identity(),
            matrix: Mat4::identity(),
            dirty: true,
            recomputes: 0,
            texture_keys: Vec::new(),
            private_textures: Vec::new(),
        }
    }

    /// Attach a name (usually the source path)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submeshes in draw order
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Submeshes, mutably
    pub fn submeshes_mut(&mut self) -> &mut [Submesh] {
        &mut self.submeshes
    }

    /// Append a submesh
    pub fn add_submesh(&mut self, submesh: Submesh) {
        self.submeshes.push(submesh);
    }

    /// Position
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Move the mesh
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
        self.dirty = true;
    }

    /// Rotation
    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    /// Rotate the mesh
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
        self.dirty = true;
    }

    /// Scale
    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    /// Scale the mesh
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
        self.dirty = true;
    }

    /// World matrix, recomputed only after a position, rotation or scale change
    pub fn transform(&mut self) -> Mat4 {
        if self.dirty {
            self.matrix = self.transform.to_matrix();
            self.dirty = false;
            self.recomputes += 1;
        }
        self.matrix
    }

    /// Assign the world matrix directly.
    ///
    /// The stored position, rotation and scale are left untouched; the next
    /// change to any of them recomputes the matrix from them.
    pub fn set_transform(&mut self, matrix: Mat4) {
        self.matrix = matrix;
        self.dirty = false;
    }

    /// Number of world matrix recomputations so far
    pub fn transform_recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Set a texture parameter on every submesh material
    pub fn replace_texture(&mut self, name: &str, texture: Option<TextureId>) {
        for submesh in &mut self.submeshes {
            submesh.set_texture_param(name, texture);
        }
    }

    /// Set spherical-harmonics coefficients on every submesh material
    pub fn set_sh_param(&mut self, name: &str, coefficients: ShCoefficients) {
        for submesh in &mut self.submeshes {
            submesh.set_sh_param(name, coefficients);
        }
    }

    /// Whether any submesh is drawn in the translucent pass
    pub fn has_translucent(&self) -> bool {
        self.submeshes.iter().any(Submesh::is_translucent)
    }

    /// Cached texture paths this mesh holds references on
    pub fn texture_keys(&self) -> &[String] {
        &self.texture_keys
    }

    /// Private textures this mesh owns
    pub fn private_textures(&self) -> &[TextureId] {
        &self.private_textures
    }

    pub(crate) fn track_texture_key(&mut self, path: impl Into<String>) {
        self.texture_keys.push(path.into());
    }

    pub(crate) fn track_private_texture(&mut self, texture: TextureId) {
        self.private_textures.push(texture);
    }

    /// Draw the submeshes that belong to `filter`'s pass.
    ///
    /// A failing submesh is logged and the rest still draw.
    pub fn draw(&mut self, ctx: &mut ApplyContext<'_>, filter: PassFilter) -> usize {
        let mut drawn = 0;
        for (index, submesh) in self.submeshes.iter_mut().enumerate() {
            if !filter.accepts(submesh) {
                continue;
            }
            match submesh.draw(ctx) {
                Ok(()) => drawn += 1,
                Err(e) => log::warn!("Mesh {} submesh {} failed to draw: {}", self.name, index, e),
            }
        }
        drawn
    }

    /// Give back device buffers, texture references and private textures
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend, cache: &mut ResourceCache) {
        for submesh in &mut self.submeshes {
            submesh.release(backend);
        }
        for path in self.texture_keys.drain(..) {
            cache.release_texture(backend, &path);
        }
        for texture in self.private_textures.drain(..) {
            cache.destroy_private_texture(backend, texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::obj_parser::SubmeshGeometry;
    use crate::assets::{ImageData, MemorySource};
    use crate::foundation::collections::ProgramId;
    use crate::foundation::math::Vec4;
    use crate::render::backend::HeadlessBackend;
    use crate::render::material::{Material, MaterialParam};
    use approx::assert_relative_eq;

    fn geometry() -> SubmeshGeometry {
        SubmeshGeometry {
            positions: vec![[0.0; 3]; 3],
            ..SubmeshGeometry::default()
        }
    }

    #[test]
    fn test_transform_is_cached() {
        let mut mesh = Mesh::default();
        mesh.set_position(Vec3::new(0.5, -1.0, 3.0));
        mesh.set_rotation(Quat::from_axis_angle(&Vec3::y_axis(), 0.3));
        let first = mesh.transform();
        let second = mesh.transform();
        assert_eq!(first, second);
        assert_eq!(mesh.transform_recompute_count(), 1);

        mesh.set_scale(Vec3::new(2.0, 2.0, 2.0));
        mesh.transform();
        assert_eq!(mesh.transform_recompute_count(), 2);
    }

    #[test]
    fn test_transform_order() {
        let mut mesh = Mesh::default();
        mesh.set_position(Vec3::new(10.0, 0.0, 0.0));
        mesh.set_rotation(Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2));
        mesh.set_scale(Vec3::new(2.0, 2.0, 2.0));

        // Scaled, then rotated +X to +Y, then translated
        let point = mesh.transform() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(point, Vec4::new(10.0, 2.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_set_transform_clears_dirty() {
        let mut mesh = Mesh::default();
        let matrix = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        mesh.set_transform(matrix);
        assert_eq!(mesh.transform(), matrix);
        assert_eq!(mesh.transform_recompute_count(), 0);
    }

    #[test]
    fn test_translucency_follows_added_submeshes() {
        let mut mesh = Mesh::default().with_name("panel");
        let mut opaque = Submesh::new(geometry());
        opaque.set_material(Material::new(ProgramId::default()));
        mesh.add_submesh(opaque);
        assert!(!mesh.has_translucent());

        let mut glass = Material::new(ProgramId::default());
        glass.set_translucent(true);
        let mut pane = Submesh::new(geometry());
        pane.set_material(glass);
        mesh.add_submesh(pane);

        assert_eq!(mesh.submeshes().len(), 2);
        assert!(mesh.has_translucent());
    }

    #[test]
    fn test_replace_texture_reaches_every_material() {
        let mut mesh = Mesh::new(vec![Submesh::new(geometry()), Submesh::new(geometry()), Submesh::new(geometry())]);
        mesh.submeshes_mut()[0].set_material(Material::new(ProgramId::default()));
        mesh.submeshes_mut()[2].set_material(Material::new(ProgramId::default()));

        mesh.replace_texture("baseMap", None);
        for index in [0, 2] {
            let material = mesh.submeshes()[index].material().unwrap();
            assert_eq!(material.param("baseMap"), Some(&MaterialParam::Texture(None)));
        }
        assert!(mesh.submeshes()[1].material().is_none());
    }

    #[test]
    fn test_release_returns_textures() {
        let mut backend = HeadlessBackend::new();
        let mut cache = ResourceCache::new();
        let source = MemorySource::new().with_image("/t/a.png", ImageData::solid_color(2, 2, [9; 4]));

        cache.load_texture(&mut backend, &source, "/t/a.png", false).unwrap();
        cache.retain_texture("/t/a.png");
        let private = cache
            .create_private_texture(&mut backend, &ImageData::solid_color(1, 1, [0; 4]), false)
            .unwrap();

        let mut mesh = Mesh::default();
        mesh.track_texture_key("/t/a.png");
        mesh.track_private_texture(private);
        mesh.release(&mut backend, &mut cache);

        assert!(mesh.texture_keys().is_empty());
        assert!(mesh.private_textures().is_empty());
        assert_eq!(cache.texture_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }
}
