//! Material system
//!
//! A [`Material`] pairs one cached program with a set of named parameters.
//! Setting a parameter by an existing name overwrites it in place.
//!
//! [`Material::apply`] runs in four steps:
//!
//! 1. reset the texture unit counter to 0
//! 2. bind the program
//! 3. refresh every builtin uniform the program uses, storing the value as a
//!    regular parameter
//! 4. upload every parameter in name order
//!
//! Texture parameters claim units 0, 1, 2... in that order within one apply.
//! Parameters whose uniform the program does not have are skipped.

pub mod param;

pub use param::{MaterialParam, ShCoefficients, SH_COEFFICIENT_COUNT};

use std::collections::BTreeMap;

use crate::foundation::collections::{ProgramId, TextureId};
use crate::foundation::math::Mat4;
use crate::render::backend::GraphicsBackend;
use crate::render::builtins::BuiltinUniform;
use crate::render::camera::CameraMatrices;
use crate::render::environment::EnvironmentMaps;
use crate::render::resource_cache::ResourceCache;
use crate::render::{RenderError, RenderResult};

/// Everything a material reads while applying
pub struct ApplyContext<'a> {
    /// Device
    pub backend: &'a mut dyn GraphicsBackend,
    /// Program and texture lookups
    pub resources: &'a ResourceCache,
    /// Current camera matrices
    pub camera: &'a CameraMatrices,
    /// Environment textures for the texture builtins
    pub environment: &'a EnvironmentMaps,
    /// World transform of the mesh being drawn
    pub world: &'a Mat4,
}

/// Named parameters bound to one program
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    program: ProgramId,
    params: BTreeMap<String, MaterialParam>,
    translucent: bool,
    name: Option<String>,
    texture_unit: u32,
}

impl Material {
    /// Material for a cached program
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            params: BTreeMap::new(),
            translucent: false,
            name: None,
            texture_unit: 0,
        }
    }

    /// Attach a debug name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Program this material binds
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Debug name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Drawn in the translucent pass
    pub fn is_translucent(&self) -> bool {
        self.translucent
    }

    /// Move to the translucent or opaque pass
    pub fn set_translucent(&mut self, translucent: bool) {
        self.translucent = translucent;
    }

    /// Set or overwrite a parameter
    pub fn set_param(&mut self, name: &str, value: impl Into<MaterialParam>) {
        let value = value.into();
        match self.params.get_mut(name) {
            Some(existing) => *existing = value,
            None => {
                self.params.insert(name.to_string(), value);
            }
        }
    }

    /// Set a `float` parameter
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_param(name, MaterialParam::Float(value));
    }

    /// Set a `mat4` parameter
    pub fn set_matrix4(&mut self, name: &str, value: Mat4) {
        self.set_param(name, MaterialParam::Matrix4(value));
    }

    /// Set a sampler parameter; `None` leaves the sampler unbound
    pub fn set_texture(&mut self, name: &str, texture: Option<TextureId>) {
        self.set_param(name, MaterialParam::Texture(texture));
    }

    /// Set spherical-harmonics coefficients
    pub fn set_sh(&mut self, name: &str, coefficients: ShCoefficients) {
        self.set_param(name, MaterialParam::SphericalHarmonics(coefficients));
    }

    /// Look up a parameter
    pub fn param(&self, name: &str) -> Option<&MaterialParam> {
        self.params.get(name)
    }

    /// All parameters in name order
    pub fn params(&self) -> impl Iterator<Item = (&str, &MaterialParam)> {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Texture units claimed by the last apply
    pub fn texture_units_used(&self) -> u32 {
        self.texture_unit
    }

    /// Bind the program and upload every parameter
    pub fn apply(&mut self, ctx: &mut ApplyContext<'_>) -> RenderResult<()> {
        self.texture_unit = 0;

        let resources = ctx.resources;
        let program = resources
            .program(self.program)
            .ok_or(RenderError::StaleHandle("program"))?;
        let handle = program.handle();
        ctx.backend.use_program(handle);

        for (name, builtin) in program.builtins() {
            let value = resolve_builtin(*builtin, ctx);
            self.set_param(name, value);
        }

        let mut unit = 0;
        for (name, param) in &self.params {
            let Some(location) = program.uniform_location(name) else {
                continue;
            };

            match param {
                MaterialParam::Float(value) => ctx.backend.set_uniform_float(handle, location, *value),
                MaterialParam::Matrix4(value) => ctx.backend.set_uniform_matrix4(handle, location, value),
                MaterialParam::Texture(texture) => {
                    let Some(texture) = texture.and_then(|id| resources.texture(id)) else {
                        log::trace!("Texture parameter {} has no texture", name);
                        continue;
                    };
                    ctx.backend.bind_texture(unit, texture.kind, texture.handle);
                    ctx.backend.set_uniform_int(handle, location, unit as i32);
                    unit += 1;
                }
                MaterialParam::SphericalHarmonics(coefficients) => {
                    ctx.backend.set_uniform_vec3_array(handle, location, coefficients);
                }
            }
        }
        self.texture_unit = unit;

        Ok(())
    }
}

fn resolve_builtin(builtin: BuiltinUniform, ctx: &ApplyContext<'_>) -> MaterialParam {
    let camera = ctx.camera;
    match builtin {
        BuiltinUniform::World => MaterialParam::Matrix4(*ctx.world),
        BuiltinUniform::View => MaterialParam::Matrix4(camera.view),
        BuiltinUniform::Projection => MaterialParam::Matrix4(camera.projection),
        BuiltinUniform::WorldView => MaterialParam::Matrix4(camera.view * ctx.world),
        BuiltinUniform::ViewProjection => MaterialParam::Matrix4(camera.view_projection),
        BuiltinUniform::WorldViewProjection => MaterialParam::Matrix4(camera.view_projection * ctx.world),
        BuiltinUniform::DiffuseEnvMap
        | BuiltinUniform::SpecularEnvMap
        | BuiltinUniform::IblBrdfLutMap
        | BuiltinUniform::IblDiffuseEnvMap
        | BuiltinUniform::IblSpecularEnvMap => MaterialParam::Texture(ctx.environment.texture(builtin)),
    }
}
