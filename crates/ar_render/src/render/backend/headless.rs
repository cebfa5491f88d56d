//! Headless backend
//!
//! A [`GraphicsBackend`] with no device behind it. Every call is recorded in
//! order, handles are allocated from a counter, and program reflection is
//! done by scanning GLSL declarations (honoring `#define` / `#ifdef`), so the
//! whole renderer can run in tests and tools without a GPU.

use std::collections::{HashMap, HashSet};

use crate::assets::ImageData;
use crate::foundation::math::Mat4;
use crate::render::backend::{
    AttributeBinding, AttributeInfo, BufferHandle, BufferUsage, CompiledProgram, GraphicsBackend,
    PassState, ProgramHandle, TextureHandle, UniformInfo, UniformKind, VertexArrayHandle,
};
use crate::render::texture::TextureKind;
use crate::render::{RenderError, RenderResult};

/// A recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// Program compiled and linked
    CompileProgram(ProgramHandle),
    /// Program made current
    UseProgram(ProgramHandle),
    /// Program released
    DestroyProgram(ProgramHandle),
    /// 2D texture uploaded
    UploadTexture2d {
        /// New handle
        texture: TextureHandle,
        /// Width
        width: u32,
        /// Height
        height: u32,
        /// Mipmaps generated
        mipmap: bool,
    },
    /// Cube texture created from level 0
    CreateCubeTexture {
        /// New handle
        texture: TextureHandle,
        /// Face size
        face_size: u32,
    },
    /// Cube mip level uploaded
    UploadCubeMipLevel {
        /// Target
        texture: TextureHandle,
        /// Level
        level: u32,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Unit
        unit: u32,
        /// Target kind
        kind: TextureKind,
        /// Texture
        texture: TextureHandle,
    },
    /// Texture released
    DestroyTexture(TextureHandle),
    /// Vertex buffer created
    CreateVertexBuffer {
        /// New handle
        buffer: BufferHandle,
        /// Size in bytes
        size: usize,
        /// Usage hint
        usage: BufferUsage,
    },
    /// Vertex buffer range overwritten
    UpdateVertexBuffer {
        /// Target
        buffer: BufferHandle,
        /// Byte offset
        offset: usize,
        /// Byte count
        size: usize,
    },
    /// Vertex buffer released
    DestroyVertexBuffer(BufferHandle),
    /// Vertex array created
    CreateVertexArray {
        /// New handle
        vertex_array: VertexArrayHandle,
        /// Recorded bindings
        bindings: Vec<AttributeBinding>,
    },
    /// Vertex array released
    DestroyVertexArray(VertexArrayHandle),
    /// Draw issued
    Draw {
        /// Vertex array used, if any
        vertex_array: Option<VertexArrayHandle>,
        /// Per-draw bindings
        bindings: Vec<AttributeBinding>,
        /// Vertices drawn
        vertex_count: usize,
    },
    /// `float` uniform
    UniformFloat {
        /// Program
        program: ProgramHandle,
        /// Location
        location: u32,
        /// Value
        value: f32,
    },
    /// `mat4` uniform
    UniformMatrix4 {
        /// Program
        program: ProgramHandle,
        /// Location
        location: u32,
        /// Value
        value: Mat4,
    },
    /// `int` uniform
    UniformInt {
        /// Program
        program: ProgramHandle,
        /// Location
        location: u32,
        /// Value
        value: i32,
    },
    /// `vec3[]` uniform
    UniformVec3Array {
        /// Program
        program: ProgramHandle,
        /// Location
        location: u32,
        /// Values
        values: Vec<[f32; 3]>,
    },
    /// Pass state changed
    SetPassState(PassState),
    /// Frame started
    BeginFrame([f32; 4]),
    /// Background quad drawn
    DrawBackground(TextureHandle),
    /// Frame finished
    EndFrame,
}

#[derive(Debug, Clone)]
struct TextureRecord {
    kind: TextureKind,
    levels: u32,
}

/// Recording backend without a device
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u32,
    calls: Vec<BackendCall>,
    programs: HashSet<ProgramHandle>,
    textures: HashMap<TextureHandle, TextureRecord>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayHandle, Vec<AttributeBinding>>,
    current_program: Option<ProgramHandle>,
    pass_state: Option<PassState>,
    buffer_budget: Option<usize>,
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Let only `budget` more vertex buffers be created; later creations fail
    /// as if the device ran out of memory. `None` lifts the limit.
    pub fn set_buffer_budget(&mut self, budget: Option<usize>) {
        self.buffer_budget = budget;
    }

    /// Every call so far, in order
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drain the call log
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of recorded calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of draws issued
    pub fn draw_count(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::Draw { .. }))
    }

    /// Programs not yet destroyed
    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    /// Textures not yet destroyed
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Vertex buffers not yet destroyed
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Vertex arrays not yet destroyed
    pub fn live_vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Current contents of a vertex buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Mip levels uploaded for a texture
    pub fn texture_levels(&self, texture: TextureHandle) -> Option<u32> {
        self.textures.get(&texture).map(|record| record.levels)
    }

    /// The program made current last
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    /// The pass state set last
    pub fn pass_state(&self) -> Option<PassState> {
        self.pass_state
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn compile_link_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RenderResult<CompiledProgram> {
        for (stage, source) in [("vertex", vertex_source), ("fragment", fragment_source)] {
            if !source.contains("main") {
                return Err(RenderError::ShaderCompilation(format!(
                    "{stage} shader has no entry point"
                )));
            }
        }

        let vertex_decls = reflect(vertex_source);
        let fragment_decls = reflect(fragment_source);

        let attributes = vertex_decls
            .iter()
            .filter(|decl| decl.qualifier != Qualifier::Uniform)
            .enumerate()
            .map(|(location, decl)| AttributeInfo {
                name: decl.name.clone(),
                location: location as u32,
                size: decl.size,
            })
            .collect();

        let mut uniforms: Vec<UniformInfo> = Vec::new();
        for decl in vertex_decls
            .iter()
            .chain(fragment_decls.iter())
            .filter(|decl| decl.qualifier == Qualifier::Uniform)
        {
            if uniforms.iter().any(|uniform| uniform.name == decl.name) {
                continue;
            }
            uniforms.push(UniformInfo {
                name: decl.name.clone(),
                location: uniforms.len() as u32,
                size: decl.size,
                kind: UniformKind::from_glsl(&decl.type_name),
            });
        }

        let handle = ProgramHandle(self.allocate());
        self.programs.insert(handle);
        self.calls.push(BackendCall::CompileProgram(handle));
        log::trace!("Headless program {:?} linked", handle);

        Ok(CompiledProgram {
            handle,
            attributes,
            uniforms,
        })
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.calls.push(BackendCall::DestroyProgram(program));
    }

    fn upload_texture_2d(&mut self, image: &ImageData, generate_mipmap: bool) -> RenderResult<TextureHandle> {
        if image.width == 0 || image.height == 0 {
            return Err(RenderError::ResourceCreationFailed(
                "texture has zero size".to_string(),
            ));
        }

        let texture = TextureHandle(self.allocate());
        self.textures.insert(
            texture,
            TextureRecord {
                kind: TextureKind::Texture2D,
                levels: 1,
            },
        );
        self.calls.push(BackendCall::UploadTexture2d {
            texture,
            width: image.width,
            height: image.height,
            mipmap: generate_mipmap,
        });
        Ok(texture)
    }

    fn create_cube_texture(&mut self, faces: &[ImageData; 6], _mip_chain: bool) -> RenderResult<TextureHandle> {
        let face_size = faces[0].width;
        if faces.iter().any(|face| face.width != face_size || face.height != face_size) {
            return Err(RenderError::ResourceCreationFailed(
                "cube faces must be square and equally sized".to_string(),
            ));
        }

        let texture = TextureHandle(self.allocate());
        self.textures.insert(
            texture,
            TextureRecord {
                kind: TextureKind::Cube,
                levels: 1,
            },
        );
        self.calls.push(BackendCall::CreateCubeTexture { texture, face_size });
        Ok(texture)
    }

    fn upload_cube_mip_level(
        &mut self,
        texture: TextureHandle,
        _faces: &[ImageData; 6],
        level: u32,
    ) -> RenderResult<()> {
        let record = self
            .textures
            .get_mut(&texture)
            .filter(|record| record.kind == TextureKind::Cube)
            .ok_or_else(|| RenderError::BackendError(format!("{texture:?} is not a cube texture")))?;
        record.levels = record.levels.max(level + 1);
        self.calls.push(BackendCall::UploadCubeMipLevel { texture, level });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: TextureHandle) {
        self.calls.push(BackendCall::BindTexture { unit, kind, texture });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.calls.push(BackendCall::DestroyTexture(texture));
    }

    fn create_vertex_buffer(&mut self, data: &[u8], usage: BufferUsage) -> RenderResult<BufferHandle> {
        if let Some(budget) = &mut self.buffer_budget {
            if *budget == 0 {
                return Err(RenderError::BackendError("out of memory".to_string()));
            }
            *budget -= 1;
        }
        let buffer = BufferHandle(self.allocate());
        self.buffers.insert(buffer, data.to_vec());
        self.calls.push(BackendCall::CreateVertexBuffer {
            buffer,
            size: data.len(),
            usage,
        });
        Ok(buffer)
    }

    fn update_vertex_buffer_range(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> RenderResult<()> {
        let contents = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| RenderError::BackendError(format!("unknown vertex buffer {buffer:?}")))?;

        let end = offset + data.len();
        if end > contents.len() {
            return Err(RenderError::BackendError(format!(
                "update of {} bytes at {} overruns {} byte buffer",
                data.len(),
                offset,
                contents.len()
            )));
        }

        contents[offset..end].copy_from_slice(data);
        self.calls.push(BackendCall::UpdateVertexBuffer {
            buffer,
            offset,
            size: data.len(),
        });
        Ok(())
    }

    fn destroy_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.calls.push(BackendCall::DestroyVertexBuffer(buffer));
    }

    fn create_vertex_array(&mut self, bindings: &[AttributeBinding]) -> RenderResult<VertexArrayHandle> {
        let vertex_array = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(vertex_array, bindings.to_vec());
        self.calls.push(BackendCall::CreateVertexArray {
            vertex_array,
            bindings: bindings.to_vec(),
        });
        Ok(vertex_array)
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
        self.calls.push(BackendCall::DestroyVertexArray(vertex_array));
    }

    fn bind_and_draw(
        &mut self,
        vertex_array: Option<VertexArrayHandle>,
        bindings: &[AttributeBinding],
        vertex_count: usize,
    ) {
        if let Some(vao) = vertex_array {
            if !self.vertex_arrays.contains_key(&vao) {
                log::warn!("Draw with unknown vertex array {:?}", vao);
            }
        }
        self.calls.push(BackendCall::Draw {
            vertex_array,
            bindings: bindings.to_vec(),
            vertex_count,
        });
    }

    fn set_uniform_float(&mut self, program: ProgramHandle, location: u32, value: f32) {
        self.calls.push(BackendCall::UniformFloat { program, location, value });
    }

    fn set_uniform_matrix4(&mut self, program: ProgramHandle, location: u32, value: &Mat4) {
        self.calls.push(BackendCall::UniformMatrix4 {
            program,
            location,
            value: *value,
        });
    }

    fn set_uniform_int(&mut self, program: ProgramHandle, location: u32, value: i32) {
        self.calls.push(BackendCall::UniformInt { program, location, value });
    }

    fn set_uniform_vec3_array(&mut self, program: ProgramHandle, location: u32, values: &[[f32; 3]]) {
        self.calls.push(BackendCall::UniformVec3Array {
            program,
            location,
            values: values.to_vec(),
        });
    }

    fn set_pass_state(&mut self, state: PassState) {
        self.pass_state = Some(state);
        self.calls.push(BackendCall::SetPassState(state));
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        self.calls.push(BackendCall::BeginFrame(clear_color));
    }

    fn draw_background(&mut self, texture: TextureHandle) {
        self.calls.push(BackendCall::DrawBackground(texture));
    }

    fn end_frame(&mut self) {
        self.pass_state = None;
        self.calls.push(BackendCall::EndFrame);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qualifier {
    Attribute,
    Uniform,
}

#[derive(Debug, Clone)]
struct Declaration {
    qualifier: Qualifier,
    type_name: String,
    name: String,
    size: u32,
}

const TYPE_PREFIXES: &[&str] = &["highp", "mediump", "lowp", "flat", "smooth", "noperspective"];

/// Scan active `attribute` / `in` / `uniform` declarations.
///
/// `in` only counts as an attribute in a vertex stage, which is the only
/// stage whose attributes are collected.
fn reflect(source: &str) -> Vec<Declaration> {
    let mut defines: HashSet<String> = HashSet::new();
    let mut branches: Vec<bool> = Vec::new();
    let mut declarations = Vec::new();

    for raw in source.lines() {
        let line = raw.split("//").next().unwrap_or_default().trim();
        let active = branches.iter().all(|taken| *taken);

        if let Some(directive) = line.strip_prefix('#') {
            let mut tokens = directive.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some("define"), Some(name)) if active => {
                    defines.insert(name.to_string());
                }
                (Some("ifdef"), Some(name)) => branches.push(defines.contains(name)),
                (Some("ifndef"), Some(name)) => branches.push(!defines.contains(name)),
                (Some("else"), _) => {
                    if let Some(taken) = branches.last_mut() {
                        *taken = !*taken;
                    }
                }
                (Some("endif"), _) => {
                    branches.pop();
                }
                _ => {}
            }
            continue;
        }

        if !active {
            continue;
        }

        let line = match line.strip_prefix("layout") {
            Some(rest) => rest.split_once(')').map_or(rest, |(_, after)| after).trim(),
            None => line,
        };

        let mut tokens = line
            .split_whitespace()
            .filter(|token| !TYPE_PREFIXES.contains(token));
        let qualifier = match tokens.next() {
            Some("attribute" | "in") => Qualifier::Attribute,
            Some("uniform") => Qualifier::Uniform,
            _ => continue,
        };
        let (Some(type_name), Some(name_token)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if name_token.starts_with('{') {
            continue;
        }

        let name_token = name_token.trim_end_matches(';');
        let (name, size) = match name_token.split_once('[') {
            Some((name, rest)) => (name, rest.trim_end_matches(']').parse().unwrap_or(1)),
            None => (name_token, 1),
        };

        declarations.push(Declaration {
            qualifier,
            type_name: type_name.to_string(),
            name: name.to_string(),
            size,
        });
    }

    declarations
}
