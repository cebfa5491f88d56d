//! Linked shader programs
//!
//! A [`Program`] keeps the reflection the backend reported at link time so
//! materials can look up locations by name without touching the device.

use std::collections::HashMap;

use crate::render::backend::{CompiledProgram, ProgramHandle, UniformKind};
use crate::render::builtins::BuiltinUniform;

/// Reflected uniform slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    /// Location
    pub location: u32,
    /// Array size
    pub size: u32,
    /// Base type
    pub kind: UniformKind,
}

/// A linked program and its reflection
#[derive(Debug, Clone)]
pub struct Program {
    handle: ProgramHandle,
    attributes: HashMap<String, u32>,
    uniforms: HashMap<String, UniformSlot>,
    builtins: Vec<(String, BuiltinUniform)>,
}

impl Program {
    /// Build from link output, resolving builtin uniform names
    pub fn from_compiled(compiled: CompiledProgram) -> Self {
        let attributes = compiled
            .attributes
            .into_iter()
            .map(|attribute| (attribute.name, attribute.location))
            .collect();

        let mut uniforms = HashMap::new();
        let mut builtins = Vec::new();
        for uniform in compiled.uniforms {
            // Drivers report arrays as `name[0]`
            let name = uniform
                .name
                .strip_suffix("[0]")
                .map_or_else(|| uniform.name.clone(), str::to_string);

            if let Some(builtin) = BuiltinUniform::from_name(&name) {
                builtins.push((name.clone(), builtin));
            }
            uniforms.insert(
                name,
                UniformSlot {
                    location: uniform.location,
                    size: uniform.size,
                    kind: uniform.kind,
                },
            );
        }
        builtins.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            handle: compiled.handle,
            attributes,
            uniforms,
            builtins,
        }
    }

    /// Backend handle
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Location of an active attribute
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// Location of an active uniform
    pub fn uniform_location(&self, name: &str) -> Option<u32> {
        self.uniforms.get(name).map(|slot| slot.location)
    }

    /// Full reflection of an active uniform
    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.get(name)
    }

    /// Active uniforms that are builtins, sorted by name
    pub fn builtins(&self) -> &[(String, BuiltinUniform)] {
        &self.builtins
    }
}
