//! Submeshes
//!
//! One material plus one block of flat vertex arrays. Vertex state is
//! realized on the first draw: a static submesh uploads its arrays, drops the
//! CPU copy and records a vertex array; a dynamic one keeps its buffers
//! updatable and binds attributes on every draw.

use crate::assets::obj_parser::{SourceTriangles, SubmeshGeometry};
use crate::foundation::collections::TextureId;
use crate::render::backend::{AttributeBinding, BufferHandle, BufferUsage, GraphicsBackend, VertexArrayHandle};
use crate::render::material::{ApplyContext, Material, MaterialParam, ShCoefficients};
use crate::render::program::Program;
use crate::render::{RenderError, RenderResult};

/// Position attribute name
pub const POSITION_ATTRIBUTE: &str = "a_position";
/// Texcoord attribute name
pub const TEXCOORD_ATTRIBUTE: &str = "a_texcoord";
/// Normal attribute name
pub const NORMAL_ATTRIBUTE: &str = "a_normal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VertexBuffers {
    position: BufferHandle,
    texcoord: Option<BufferHandle>,
    normal: Option<BufferHandle>,
}

impl VertexBuffers {
    fn bindings(&self, program: &Program) -> Vec<AttributeBinding> {
        let streams = [
            (POSITION_ATTRIBUTE, Some(self.position), 3),
            (TEXCOORD_ATTRIBUTE, self.texcoord, 2),
            (NORMAL_ATTRIBUTE, self.normal, 3),
        ];

        streams
            .into_iter()
            .filter_map(|(name, buffer, components)| {
                Some(AttributeBinding {
                    location: program.attribute_location(name)?,
                    buffer: buffer?,
                    components,
                })
            })
            .collect()
    }

    fn handles(&self) -> impl Iterator<Item = BufferHandle> {
        [Some(self.position), self.texcoord, self.normal].into_iter().flatten()
    }
}

/// Geometry and material drawn with one program
#[derive(Debug, Clone)]
pub struct Submesh {
    geometry: Option<SubmeshGeometry>,
    source: Option<SourceTriangles>,
    vertex_count: usize,
    material: Option<Material>,
    dynamic: bool,
    buffers: Option<VertexBuffers>,
    vertex_array: Option<VertexArrayHandle>,
}

impl Submesh {
    /// Submesh over parsed geometry, without a material
    pub fn new(mut geometry: SubmeshGeometry) -> Self {
        let source = geometry.source.take();
        Self {
            vertex_count: geometry.vertex_count(),
            geometry: Some(geometry),
            source,
            material: None,
            dynamic: false,
            buffers: None,
            vertex_array: None,
        }
    }

    /// Mark positions as updatable in place (see [`Submesh::update_positions`])
    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Whether the submesh uses dynamic buffers
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Vertices drawn per call
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// CPU geometry; `None` once a static submesh is uploaded
    pub fn geometry(&self) -> Option<&SubmeshGeometry> {
        self.geometry.as_ref()
    }

    /// Source positions and triangles kept for export
    pub fn source_triangles(&self) -> Option<&SourceTriangles> {
        self.source.as_ref()
    }

    /// Vertex buffers exist on the device
    pub fn is_uploaded(&self) -> bool {
        self.buffers.is_some()
    }

    /// Material
    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    /// Material, mutably
    pub fn material_mut(&mut self) -> Option<&mut Material> {
        self.material.as_mut()
    }

    /// Replace the material
    pub fn set_material(&mut self, material: Material) {
        self.material = Some(material);
    }

    /// Drawn in the translucent pass
    pub fn is_translucent(&self) -> bool {
        self.material.as_ref().is_some_and(Material::is_translucent)
    }

    /// Set a texture parameter on the material, if there is one
    pub fn set_texture_param(&mut self, name: &str, texture: Option<TextureId>) {
        if let Some(material) = &mut self.material {
            material.set_param(name, MaterialParam::Texture(texture));
        }
    }

    /// Set spherical-harmonics coefficients on the material, if there is one
    pub fn set_sh_param(&mut self, name: &str, coefficients: ShCoefficients) {
        if let Some(material) = &mut self.material {
            material.set_sh(name, coefficients);
        }
    }

    /// Apply the material and draw.
    ///
    /// A submesh without a material is skipped.
    pub fn draw(&mut self, ctx: &mut ApplyContext<'_>) -> RenderResult<()> {
        let Some(material) = &mut self.material else {
            log::debug!("Skipping submesh without material");
            return Ok(());
        };
        material.apply(ctx)?;

        let resources = ctx.resources;
        let program = resources
            .program(material.program())
            .ok_or(RenderError::StaleHandle("program"))?;

        let buffers = match self.buffers {
            Some(buffers) => buffers,
            None => self.upload(ctx.backend)?,
        };

        if self.dynamic {
            let bindings = buffers.bindings(program);
            ctx.backend.bind_and_draw(None, &bindings, self.vertex_count);
            return Ok(());
        }

        let vertex_array = match self.vertex_array {
            Some(vertex_array) => vertex_array,
            None => {
                let vertex_array = ctx.backend.create_vertex_array(&buffers.bindings(program))?;
                self.vertex_array = Some(vertex_array);
                vertex_array
            }
        };
        ctx.backend.bind_and_draw(Some(vertex_array), &[], self.vertex_count);
        Ok(())
    }

    fn upload(&mut self, backend: &mut dyn GraphicsBackend) -> RenderResult<VertexBuffers> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| RenderError::ResourceCreationFailed("submesh has no geometry to upload".to_string()))?;

        let usage = if self.dynamic { BufferUsage::Dynamic } else { BufferUsage::Static };
        let streams: [Option<&[u8]>; 3] = [
            Some(bytemuck::cast_slice(&geometry.positions)),
            geometry.texcoords.as_deref().map(bytemuck::cast_slice),
            geometry.normals.as_deref().map(bytemuck::cast_slice),
        ];

        let mut created: Vec<BufferHandle> = Vec::with_capacity(streams.len());
        let mut handles = [None; 3];
        for (slot, bytes) in handles.iter_mut().zip(streams) {
            let Some(bytes) = bytes else { continue };
            match backend.create_vertex_buffer(bytes, usage) {
                Ok(buffer) => {
                    created.push(buffer);
                    *slot = Some(buffer);
                }
                Err(e) => {
                    // Roll back; the CPU copy stays for the next draw.
                    for buffer in created {
                        backend.destroy_vertex_buffer(buffer);
                    }
                    return Err(e);
                }
            }
        }

        let [Some(position), texcoord, normal] = handles else {
            return Err(RenderError::ResourceCreationFailed("position buffer missing".to_string()));
        };
        let buffers = VertexBuffers {
            position,
            texcoord,
            normal,
        };
        log::trace!("Uploaded submesh of {} vertices ({:?})", self.vertex_count, usage);

        self.geometry = None;
        self.buffers = Some(buffers);
        Ok(buffers)
    }

    /// Overwrite every position of a dynamic submesh.
    ///
    /// The vertex count cannot change. Before the first draw the CPU copy is
    /// updated instead.
    pub fn update_positions(&mut self, backend: &mut dyn GraphicsBackend, positions: &[[f32; 3]]) -> RenderResult<()> {
        if !self.dynamic {
            return Err(RenderError::InvalidUpdate("submesh is static".to_string()));
        }
        if positions.len() != self.vertex_count {
            return Err(RenderError::InvalidUpdate(format!(
                "expected {} positions, got {}",
                self.vertex_count,
                positions.len()
            )));
        }

        match (&self.buffers, &mut self.geometry) {
            (Some(buffers), _) => backend.update_vertex_buffer_range(buffers.position, 0, bytemuck::cast_slice(positions)),
            (None, Some(geometry)) => {
                geometry.positions.copy_from_slice(positions);
                Ok(())
            }
            (None, None) => Err(RenderError::InvalidUpdate("submesh has no geometry".to_string())),
        }
    }

    /// Destroy device buffers and the vertex array
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(vertex_array) = self.vertex_array.take() {
            backend.destroy_vertex_array(vertex_array);
        }
        if let Some(buffers) = self.buffers.take() {
            for buffer in buffers.handles() {
                backend.destroy_vertex_buffer(buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::core::RendererConfig;
    use crate::foundation::collections::ProgramId;
    use crate::foundation::math::Mat4;
    use crate::render::backend::{BackendCall, HeadlessBackend};
    use crate::render::camera::Camera;
    use crate::render::environment::EnvironmentMaps;
    use crate::render::resource_cache::{ProgramKey, ResourceCache};

    const VERT: &str = "\
attribute vec3 a_position;
attribute vec2 a_texcoord;
attribute vec3 a_normal;
uniform mat4 matWVP;
void main() {}
";

    fn triangle(with_texcoords: bool) -> SubmeshGeometry {
        SubmeshGeometry {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            texcoords: with_texcoords.then(|| vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
            normals: None,
            source: None,
        }
    }

    struct Fixture {
        backend: HeadlessBackend,
        cache: ResourceCache,
        environment: EnvironmentMaps,
        program: ProgramId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut backend = HeadlessBackend::new();
            let mut cache = ResourceCache::new();
            let source = MemorySource::new()
                .with_text("/s.vert", VERT)
                .with_text("/s.frag", "void main() {}\n");
            let program = cache
                .load_program(&mut backend, &source, &ProgramKey::new("/s.vert", "/s.frag", ""))
                .unwrap();
            Self {
                backend,
                cache,
                environment: EnvironmentMaps::new(&RendererConfig::default()),
                program,
            }
        }

        fn draw(&mut self, submesh: &mut Submesh) -> RenderResult<()> {
            let camera = Camera::new(100, 100).matrices();
            let world = Mat4::identity();
            let mut ctx = ApplyContext {
                backend: &mut self.backend,
                resources: &self.cache,
                camera: &camera,
                environment: &self.environment,
                world: &world,
            };
            submesh.draw(&mut ctx)
        }
    }

    #[test]
    fn test_static_submesh_uploads_once() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(true));
        submesh.set_material(Material::new(fixture.program));

        fixture.draw(&mut submesh).unwrap();
        fixture.draw(&mut submesh).unwrap();

        let backend = &fixture.backend;
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::CreateVertexArray { .. })), 1);
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::CreateVertexBuffer { .. })), 2);
        assert_eq!(backend.draw_count(), 2);
        assert!(submesh.geometry().is_none());
        assert_eq!(submesh.vertex_count(), 3);
    }

    #[test]
    fn test_vertex_array_uses_program_locations() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(true));
        submesh.set_material(Material::new(fixture.program));
        fixture.draw(&mut submesh).unwrap();

        let bindings = fixture
            .backend
            .calls()
            .iter()
            .find_map(|call| match call {
                BackendCall::CreateVertexArray { bindings, .. } => Some(bindings.clone()),
                _ => None,
            })
            .unwrap();
        let layout: Vec<_> = bindings.iter().map(|b| (b.location, b.components)).collect();
        assert_eq!(layout, vec![(0, 3), (1, 2)]);
    }

    #[test]
    fn test_dynamic_submesh_binds_every_draw() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(false)).with_dynamic(true);
        submesh.set_material(Material::new(fixture.program));

        fixture.draw(&mut submesh).unwrap();
        fixture.draw(&mut submesh).unwrap();

        let backend = &fixture.backend;
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::CreateVertexArray { .. })), 0);
        assert_eq!(
            backend.count_calls(|c| matches!(
                c,
                BackendCall::CreateVertexBuffer { usage: BufferUsage::Dynamic, .. }
            )),
            1
        );
        assert_eq!(
            backend.count_calls(|c| matches!(
                c,
                BackendCall::Draw { vertex_array: None, bindings, vertex_count: 3 } if bindings.len() == 1
            )),
            2
        );
    }

    #[test]
    fn test_dynamic_position_update() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(false)).with_dynamic(true);
        submesh.set_material(Material::new(fixture.program));
        fixture.draw(&mut submesh).unwrap();

        let moved = [[2.0_f32, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
        submesh.update_positions(&mut fixture.backend, &moved).unwrap();

        let buffer = fixture
            .backend
            .calls()
            .iter()
            .find_map(|call| match call {
                BackendCall::UpdateVertexBuffer { buffer, .. } => Some(*buffer),
                _ => None,
            })
            .unwrap();
        let expected: &[u8] = bytemuck::cast_slice(&moved);
        assert_eq!(fixture.backend.buffer_contents(buffer), Some(expected));

        let short = [[0.0_f32; 3]; 2];
        assert!(matches!(
            submesh.update_positions(&mut fixture.backend, &short),
            Err(RenderError::InvalidUpdate(_))
        ));
    }

    #[test]
    fn test_static_submesh_rejects_update() {
        let mut backend = HeadlessBackend::new();
        let mut submesh = Submesh::new(triangle(false));
        assert!(submesh.update_positions(&mut backend, &[[0.0; 3]; 3]).is_err());
    }

    #[test]
    fn test_update_before_upload_changes_geometry() {
        let mut backend = HeadlessBackend::new();
        let mut submesh = Submesh::new(triangle(false)).with_dynamic(true);
        submesh.update_positions(&mut backend, &[[5.0; 3]; 3]).unwrap();
        assert_eq!(submesh.geometry().unwrap().positions[0], [5.0; 3]);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_no_material_is_skipped() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(false));
        fixture.draw(&mut submesh).unwrap();
        assert_eq!(fixture.backend.draw_count(), 0);
        assert!(!submesh.is_uploaded());
    }

    #[test]
    fn test_release_destroys_device_state() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(true));
        submesh.set_material(Material::new(fixture.program));
        fixture.draw(&mut submesh).unwrap();
        assert_eq!(fixture.backend.live_buffer_count(), 2);

        submesh.release(&mut fixture.backend);
        assert_eq!(fixture.backend.live_buffer_count(), 0);
        assert_eq!(fixture.backend.live_vertex_array_count(), 0);
        assert!(!submesh.is_uploaded());
    }

    #[test]
    fn test_failed_upload_keeps_geometry_and_frees_buffers() {
        let mut fixture = Fixture::new();
        let mut submesh = Submesh::new(triangle(true));
        submesh.set_material(Material::new(fixture.program));

        fixture.backend.set_buffer_budget(Some(1));
        assert!(matches!(fixture.draw(&mut submesh), Err(RenderError::BackendError(_))));
        assert!(submesh.geometry().is_some());
        assert!(!submesh.is_uploaded());
        assert_eq!(fixture.backend.live_buffer_count(), 0);
        assert_eq!(fixture.backend.draw_count(), 0);

        fixture.backend.set_buffer_budget(None);
        fixture.draw(&mut submesh).unwrap();
        assert!(submesh.geometry().is_none());
        assert_eq!(fixture.backend.live_buffer_count(), 2);
        assert_eq!(fixture.backend.draw_count(), 1);

        submesh.release(&mut fixture.backend);
        assert_eq!(fixture.backend.live_buffer_count(), 0);
    }

    #[test]
    fn test_export_copy_moves_to_submesh() {
        let mut geometry = triangle(false);
        geometry.source = Some(SourceTriangles {
            positions: geometry.positions.clone(),
            triangles: Vec::new(),
        });
        let submesh = Submesh::new(geometry);
        assert!(submesh.source_triangles().is_some());
        assert!(submesh.geometry().unwrap().source.is_none());
    }
}
