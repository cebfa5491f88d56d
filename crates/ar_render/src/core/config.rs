//! # Renderer Configuration
//!
//! Screen size, camera defaults, shader library and environment textures.
//! Every section has defaults matching the bundled resource layout, so a
//! config file only needs to name what differs.

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// A vertex/fragment shader source pair, relative to the resource directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderPair {
    /// Vertex shader source path
    pub vertex: String,
    /// Fragment shader source path
    pub fragment: String,
}

impl ShaderPair {
    /// Create a new shader pair
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Conventional `/shaders/<name>.vert` + `/shaders/<name>.frag` pair
    pub fn named(name: &str) -> Self {
        Self::new(format!("/shaders/{name}.vert"), format!("/shaders/{name}.frag"))
    }
}

/// Shaders used by each mesh preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderLibrary {
    /// Physically based shading
    pub pbr: ShaderPair,
    /// Unlit textured
    pub unlit: ShaderPair,
    /// Scanned (photogrammetry) models
    pub scan: ShaderPair,
    /// Depth-only mask
    pub depth_mask: ShaderPair,
    /// Invisible occluder
    pub occluder: ShaderPair,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self {
            pbr: ShaderPair::named("pbr_kh"),
            unlit: ShaderPair::named("unlit"),
            scan: ShaderPair::named("scan"),
            depth_mask: ShaderPair::named("depth_mask"),
            occluder: ShaderPair::named("occluder"),
        }
    }
}

/// Environment and image-based-lighting textures bound to builtin uniforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// 2D diffuse environment map (`diffuseEnvMap`)
    pub diffuse_env: String,
    /// 2D specular environment map (`specularEnvMap`), mip-mapped
    pub specular_env: String,
    /// BRDF integration lookup table (`iblBrdfLutMap`)
    pub ibl_brdf_lut: String,
    /// Cube map base path for `iblDiffuseEnvMap`
    pub ibl_diffuse_cube: String,
    /// Cube map base path for `iblSpecularEnvMap`, loaded with its mip chain
    pub ibl_specular_cube: String,
    /// Texture applied by the depth-mask preset
    pub depth_mask_texture: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            diffuse_env: "/textures/diffuse.png".to_string(),
            specular_env: "/textures/environment.png".to_string(),
            ibl_brdf_lut: "/textures/brdfLUT.png".to_string(),
            ibl_diffuse_cube: "/textures/papermill/diffuse/diffuse".to_string(),
            ibl_specular_cube: "/textures/papermill/specular/specular".to_string(),
            depth_mask_texture: "/textures/uv_0.jpg".to_string(),
        }
    }
}

/// Initial camera placement and projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// Initial world position
    pub position: [f32; 3],
    /// Mirror projections vertically (camera-feed textures arrive upside down)
    pub flip_y: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.1,
            far: 5000.0,
            position: [0.0, 0.0, 1000.0],
            flip_y: false,
        }
    }
}

/// Top-level renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Viewport width in pixels
    pub screen_width: u32,
    /// Viewport height in pixels
    pub screen_height: u32,
    /// Prefix prepended to builtin shader and environment paths
    pub resource_dir: String,
    /// Default log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    /// Camera defaults
    pub camera: CameraConfig,
    /// Shader library
    pub shaders: ShaderLibrary,
    /// Environment textures
    pub environment: EnvironmentConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            screen_width: 720,
            screen_height: 1280,
            resource_dir: String::new(),
            log_level: "info".to_string(),
            camera: CameraConfig::default(),
            shaders: ShaderLibrary::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Create a configuration for a viewport size
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen_width,
            screen_height,
            ..Default::default()
        }
    }

    /// Set the resource directory prefix
    pub fn with_resource_dir(mut self, dir: impl Into<String>) -> Self {
        self.resource_dir = dir.into();
        self
    }

    /// Set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Resolve a builtin resource path against the resource directory
    pub fn resource_path(&self, relative: &str) -> String {
        format!("{}{}", self.resource_dir, relative)
    }

    /// Viewport aspect ratio (width / height)
    pub fn aspect_ratio(&self) -> f32 {
        self.screen_width as f32 / self.screen_height as f32
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen size must be non-zero, got {}x{}",
                self.screen_width, self.screen_height
            )));
        }

        let camera = &self.camera;
        if camera.near <= 0.0 || camera.far <= camera.near {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got near={} far={}",
                camera.near, camera.far
            )));
        }

        if !(0.0..180.0).contains(&camera.fov_degrees) || camera.fov_degrees == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "camera field of view must be in (0, 180) degrees, got {}",
                camera.fov_degrees
            )));
        }

        Ok(())
    }
}

impl Config for RendererConfig {}
