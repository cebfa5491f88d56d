//! Graphics backend abstraction
//!
//! The renderer core never talks to a graphics API directly. Everything it
//! needs from the device goes through [`GraphicsBackend`]: program
//! compile/link with reflection, texture and vertex buffer lifetime, uniform
//! uploads, pass state and draws. Handles returned by the backend are opaque.

pub mod headless;

pub use headless::{BackendCall, HeadlessBackend};

use bitflags::bitflags;

use crate::assets::ImageData;
use crate::foundation::math::Mat4;
use crate::render::texture::TextureKind;
use crate::render::RenderResult;

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Handle to an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Handle to a vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Handle to a vertex array (recorded attribute bindings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

/// Base type of a reflected uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `float`
    Float,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
    /// `int` or `bool`
    Int,
    /// `sampler2D`
    Sampler2D,
    /// `samplerCube`
    SamplerCube,
    /// Anything else
    Other,
}

impl UniformKind {
    /// Map a GLSL type name
    pub fn from_glsl(type_name: &str) -> Self {
        match type_name {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "int" | "bool" => Self::Int,
            "sampler2D" => Self::Sampler2D,
            "samplerCube" => Self::SamplerCube,
            _ => Self::Other,
        }
    }
}

/// Reflected vertex attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Attribute name
    pub name: String,
    /// Bound location
    pub location: u32,
    /// Array size (1 for scalars)
    pub size: u32,
}

/// Reflected uniform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    /// Uniform name without any `[0]` suffix
    pub name: String,
    /// Location
    pub location: u32,
    /// Array size (1 for scalars)
    pub size: u32,
    /// Base type
    pub kind: UniformKind,
}

/// Result of a successful compile and link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    /// Program handle
    pub handle: ProgramHandle,
    /// Active attributes
    pub attributes: Vec<AttributeInfo>,
    /// Active uniforms
    pub uniforms: Vec<UniformInfo>,
}

/// Vertex buffer usage hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Uploaded once
    Static,
    /// Updated in place between draws
    Dynamic,
}

/// One float attribute stream sourced from a vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    /// Attribute location in the program
    pub location: u32,
    /// Source buffer
    pub buffer: BufferHandle,
    /// Floats per vertex
    pub components: u32,
}

bitflags! {
    /// Fixed-function state for a render pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassState: u32 {
        /// Depth testing enabled
        const DEPTH_TEST = 1 << 0;
        /// Depth writes enabled
        const DEPTH_WRITE = 1 << 1;
        /// Premultiplied blending (`ONE`, `ONE_MINUS_SRC_ALPHA`)
        const BLEND = 1 << 2;
    }
}

impl PassState {
    /// Opaque pass: depth test and write, no blending
    pub const OPAQUE: Self = Self::DEPTH_TEST.union(Self::DEPTH_WRITE);

    /// Translucent pass: depth test, no depth write, blending
    pub const TRANSLUCENT: Self = Self::DEPTH_TEST.union(Self::BLEND);
}

/// Graphics device interface consumed by the renderer core
pub trait GraphicsBackend {
    /// Compile both stages and link them, reporting active attributes and uniforms
    fn compile_link_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RenderResult<CompiledProgram>;

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Release a program
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Upload a 2D texture
    fn upload_texture_2d(&mut self, image: &ImageData, generate_mipmap: bool) -> RenderResult<TextureHandle>;

    /// Create a cube texture from six level-0 faces (`+X, -X, +Y, -Y, +Z, -Z`).
    ///
    /// With `mip_chain` the sampler expects further levels from
    /// [`GraphicsBackend::upload_cube_mip_level`].
    fn create_cube_texture(&mut self, faces: &[ImageData; 6], mip_chain: bool) -> RenderResult<TextureHandle>;

    /// Upload one mip level of all six faces
    fn upload_cube_mip_level(
        &mut self,
        texture: TextureHandle,
        faces: &[ImageData; 6],
        level: u32,
    ) -> RenderResult<()>;

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: TextureHandle);

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a vertex buffer holding `data`
    fn create_vertex_buffer(&mut self, data: &[u8], usage: BufferUsage) -> RenderResult<BufferHandle>;

    /// Overwrite part of a vertex buffer without reallocating
    fn update_vertex_buffer_range(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> RenderResult<()>;

    /// Release a vertex buffer
    fn destroy_vertex_buffer(&mut self, buffer: BufferHandle);

    /// Record attribute bindings into a vertex array
    fn create_vertex_array(&mut self, bindings: &[AttributeBinding]) -> RenderResult<VertexArrayHandle>;

    /// Release a vertex array
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Draw `vertex_count` vertices as triangles.
    ///
    /// With a vertex array its recorded bindings are used; otherwise
    /// `bindings` are bound for this draw only.
    fn bind_and_draw(
        &mut self,
        vertex_array: Option<VertexArrayHandle>,
        bindings: &[AttributeBinding],
        vertex_count: usize,
    );

    /// Upload a `float` uniform
    fn set_uniform_float(&mut self, program: ProgramHandle, location: u32, value: f32);

    /// Upload a column-major `mat4` uniform
    fn set_uniform_matrix4(&mut self, program: ProgramHandle, location: u32, value: &Mat4);

    /// Upload an `int` (or sampler unit) uniform
    fn set_uniform_int(&mut self, program: ProgramHandle, location: u32, value: i32);

    /// Upload a `vec3` array uniform
    fn set_uniform_vec3_array(&mut self, program: ProgramHandle, location: u32, values: &[[f32; 3]]);

    /// Set depth and blend state
    fn set_pass_state(&mut self, state: PassState);

    /// Start a frame, clearing color and depth
    fn begin_frame(&mut self, clear_color: [f32; 4]);

    /// Draw a full-screen quad sampling `texture` with depth disabled
    fn draw_background(&mut self, texture: TextureHandle);

    /// Finish a frame and restore default state
    fn end_frame(&mut self);
}
