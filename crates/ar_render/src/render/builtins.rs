//! Builtin uniforms
//!
//! Uniforms whose values the renderer fills in from scene state on every
//! material apply. Names are resolved to [`BuiltinUniform`] once, when a
//! program is reflected.

/// A uniform computed from scene state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinUniform {
    /// Mesh world transform
    World,
    /// Camera view matrix
    View,
    /// Camera projection matrix
    Projection,
    /// `view × world`
    WorldView,
    /// `projection × view`
    ViewProjection,
    /// `view_projection × world`
    WorldViewProjection,
    /// 2D diffuse environment map
    DiffuseEnvMap,
    /// 2D specular environment map
    SpecularEnvMap,
    /// BRDF integration lookup table
    IblBrdfLutMap,
    /// Diffuse irradiance cube map
    IblDiffuseEnvMap,
    /// Prefiltered specular cube map
    IblSpecularEnvMap,
}

/// Registry of recognized uniform names
pub const BUILTIN_UNIFORMS: [(&str, BuiltinUniform); 11] = [
    ("matWorld", BuiltinUniform::World),
    ("matView", BuiltinUniform::View),
    ("matProjection", BuiltinUniform::Projection),
    ("matWorldView", BuiltinUniform::WorldView),
    ("matViewProjection", BuiltinUniform::ViewProjection),
    ("matWVP", BuiltinUniform::WorldViewProjection),
    ("diffuseEnvMap", BuiltinUniform::DiffuseEnvMap),
    ("specularEnvMap", BuiltinUniform::SpecularEnvMap),
    ("iblBrdfLutMap", BuiltinUniform::IblBrdfLutMap),
    ("iblDiffuseEnvMap", BuiltinUniform::IblDiffuseEnvMap),
    ("iblSpecularEnvMap", BuiltinUniform::IblSpecularEnvMap),
];

impl BuiltinUniform {
    /// Resolve a uniform name
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTIN_UNIFORMS
            .iter()
            .find(|(builtin_name, _)| *builtin_name == name)
            .map(|(_, builtin)| *builtin)
    }

    /// Uniform name in shader source
    pub fn name(self) -> &'static str {
        BUILTIN_UNIFORMS
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map_or("", |(name, _)| name)
    }

    /// True for the environment texture builtins
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Self::DiffuseEnvMap
                | Self::SpecularEnvMap
                | Self::IblBrdfLutMap
                | Self::IblDiffuseEnvMap
                | Self::IblSpecularEnvMap
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for (name, builtin) in BUILTIN_UNIFORMS {
            assert_eq!(BuiltinUniform::from_name(name), Some(builtin));
            assert_eq!(builtin.name(), name);
        }
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(BuiltinUniform::from_name("baseMap"), None);
        assert_eq!(BuiltinUniform::from_name("matwvp"), None);
    }

    #[test]
    fn test_texture_builtins() {
        assert!(BuiltinUniform::IblBrdfLutMap.is_texture());
        assert!(!BuiltinUniform::WorldViewProjection.is_texture());
    }
}
