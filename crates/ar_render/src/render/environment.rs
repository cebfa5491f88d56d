//! Environment textures for image-based lighting
//!
//! Each texture builtin has one slot. Slots load lazily the first time a
//! program asks for them, and a failed load is remembered so a missing file
//! is reported once instead of every frame.

use crate::assets::AssetSource;
use crate::core::RendererConfig;
use crate::foundation::collections::TextureId;
use crate::render::backend::GraphicsBackend;
use crate::render::builtins::BuiltinUniform;
use crate::render::resource_cache::ResourceCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Ready(TextureId),
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotSource {
    Flat { mipmap: bool },
    Cube { mip_chain: bool },
}

#[derive(Debug, Clone)]
struct Slot {
    builtin: BuiltinUniform,
    path: String,
    source: SlotSource,
    state: SlotState,
}

/// Lazily loaded environment textures
#[derive(Debug, Clone)]
pub struct EnvironmentMaps {
    slots: Vec<Slot>,
}

impl EnvironmentMaps {
    /// Slots for the configured environment paths
    pub fn new(config: &RendererConfig) -> Self {
        let env = &config.environment;
        let slot = |builtin, path: &str, source| Slot {
            builtin,
            path: config.resource_path(path),
            source,
            state: SlotState::Pending,
        };

        Self {
            slots: vec![
                slot(BuiltinUniform::DiffuseEnvMap, &env.diffuse_env, SlotSource::Flat { mipmap: false }),
                slot(BuiltinUniform::SpecularEnvMap, &env.specular_env, SlotSource::Flat { mipmap: true }),
                slot(BuiltinUniform::IblBrdfLutMap, &env.ibl_brdf_lut, SlotSource::Flat { mipmap: false }),
                slot(BuiltinUniform::IblDiffuseEnvMap, &env.ibl_diffuse_cube, SlotSource::Cube { mip_chain: false }),
                slot(BuiltinUniform::IblSpecularEnvMap, &env.ibl_specular_cube, SlotSource::Cube { mip_chain: true }),
            ],
        }
    }

    fn slot_mut(&mut self, builtin: BuiltinUniform) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.builtin == builtin)
    }

    /// Texture for a builtin if it has been loaded
    pub fn texture(&self, builtin: BuiltinUniform) -> Option<TextureId> {
        self.slots
            .iter()
            .find(|slot| slot.builtin == builtin)
            .and_then(|slot| match slot.state {
                SlotState::Ready(id) => Some(id),
                SlotState::Pending | SlotState::Unavailable => None,
            })
    }

    /// Load the texture for a builtin on first use
    pub fn ensure(
        &mut self,
        builtin: BuiltinUniform,
        cache: &mut ResourceCache,
        backend: &mut dyn GraphicsBackend,
        source: &dyn AssetSource,
    ) -> Option<TextureId> {
        let slot = self.slot_mut(builtin)?;
        if slot.state != SlotState::Pending {
            return match slot.state {
                SlotState::Ready(id) => Some(id),
                SlotState::Pending | SlotState::Unavailable => None,
            };
        }

        let loaded = match slot.source {
            SlotSource::Flat { mipmap } => cache
                .load_texture(backend, source, &slot.path, mipmap)
                .map(|loaded| loaded.id),
            SlotSource::Cube { mip_chain } => cache.load_cube_texture(backend, source, &slot.path, mip_chain),
        };

        match loaded {
            Ok(id) => {
                cache.pin_texture(&slot.path);
                slot.state = SlotState::Ready(id);
                Some(id)
            }
            Err(e) => {
                log::warn!("Environment texture {} unavailable: {}", slot.path, e);
                slot.state = SlotState::Unavailable;
                None
            }
        }
    }

    /// Use an already loaded texture for a builtin
    pub fn set_texture(&mut self, builtin: BuiltinUniform, texture: TextureId) {
        if let Some(slot) = self.slot_mut(builtin) {
            slot.state = SlotState::Ready(texture);
        }
    }

    /// Forget every loaded texture (the cache owns them)
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.state = SlotState::Pending;
        }
    }
}
