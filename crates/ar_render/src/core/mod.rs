//! # Core Module
//!
//! Renderer-wide configuration shared by the resource cache, camera and
//! renderer.

pub mod config;

pub use config::{
    CameraConfig,
    Config,
    ConfigError,
    EnvironmentConfig,
    RendererConfig,
    ShaderLibrary,
    ShaderPair,
};
