//! Arena handle types
//!
//! Shared GPU resources are stored in slot maps owned by the resource cache.
//! Everyone else holds one of these keys, which resolve to `None` once the
//! entry is released instead of aliasing a newer resource.

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Key of a compiled program in the resource cache
    pub struct ProgramId;

    /// Key of a texture in the resource cache
    pub struct TextureId;

    /// Key of a mesh owned by the renderer
    pub struct MeshId;
}

/// Handle-based map using slot map for stable references
pub type HandleMap<K, T> = SlotMap<K, T>;
