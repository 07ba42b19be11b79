//! Shader-global binding table shared between the orchestrator and the pass
//! effect.
//!
//! String keys are resolved to opaque numeric [`SlotId`] handles once at
//! startup; per-frame code deals only in handles. Texture slots live here at
//! global scope and persist across frames. Matrix and integer globals have
//! command-list scope instead; they are recorded into a
//! [`CommandList`](crate::command::CommandList) and apply only within that
//! list's pass sequence.

use std::collections::HashMap;

use crate::pool::SurfaceKind;

/// Key of the global noise-texture slot.
pub const NOISE_TEXTURE: &str = "cloud_noise";
/// Key of the frustum-corner-ray matrix slot (command-list scope).
pub const FRUSTUM_RAYS: &str = "cloud_frustum_rays";
/// Key of the frame-index slot (command-list scope).
pub const FRAME_INDEX: &str = "cloud_frame_index";
/// Key of the last-frame history texture slot.
pub const HISTORY_TEXTURE: &str = "cloud_history";
/// Key of the current cloud texture slot.
pub const CURRENT_TEXTURE: &str = "cloud_current";

/// Opaque handle for a named shader-global slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(u16);

/// Process-wide key→value binding table the orchestrator writes into and the
/// pass effect reads from.
#[derive(Default)]
pub struct GlobalStore {
    names: Vec<&'static str>,
    ids: HashMap<&'static str, SlotId>,
    textures: HashMap<SlotId, SurfaceKind>,
}

impl GlobalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a string key to its slot handle, interning it on first use.
    /// Repeated calls with the same key return the same handle.
    pub fn resolve(&mut self, key: &'static str) -> SlotId {
        if let Some(&id) = self.ids.get(key) {
            return id;
        }
        let id = SlotId(self.names.len() as u16);
        self.names.push(key);
        self.ids.insert(key, id);
        id
    }

    /// The key a slot handle was resolved from.
    pub fn name(&self, slot: SlotId) -> Option<&'static str> {
        self.names.get(slot.0 as usize).copied()
    }

    /// Bind a pool surface to a texture slot at global scope.
    pub fn set_texture(&mut self, slot: SlotId, surface: SurfaceKind) {
        self.textures.insert(slot, surface);
    }

    /// The surface currently bound to a texture slot, if any.
    pub fn texture(&self, slot: SlotId) -> Option<SurfaceKind> {
        self.textures.get(&slot).copied()
    }

    /// Drop all texture bindings. Slot handles stay valid.
    pub fn clear_textures(&mut self) {
        self.textures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_interns_once() {
        let mut store = GlobalStore::new();
        let a = store.resolve(NOISE_TEXTURE);
        let b = store.resolve(NOISE_TEXTURE);
        assert_eq!(a, b);
        assert_eq!(store.name(a), Some(NOISE_TEXTURE));
    }

    #[test]
    fn test_distinct_keys_get_distinct_slots() {
        let mut store = GlobalStore::new();
        let keys = [
            NOISE_TEXTURE,
            FRUSTUM_RAYS,
            FRAME_INDEX,
            HISTORY_TEXTURE,
            CURRENT_TEXTURE,
        ];
        let slots: Vec<SlotId> = keys.iter().map(|k| store.resolve(k)).collect();
        for i in 0..slots.len() {
            for j in (i + 1)..slots.len() {
                assert_ne!(slots[i], slots[j], "{} and {}", keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_texture_binding_overwrites() {
        let mut store = GlobalStore::new();
        let slot = store.resolve(HISTORY_TEXTURE);
        assert_eq!(store.texture(slot), None);
        store.set_texture(slot, SurfaceKind::HistoryLast);
        store.set_texture(slot, SurfaceKind::HistoryCurrent);
        assert_eq!(store.texture(slot), Some(SurfaceKind::HistoryCurrent));
    }

    #[test]
    fn test_clear_textures_keeps_handles() {
        let mut store = GlobalStore::new();
        let slot = store.resolve(NOISE_TEXTURE);
        store.set_texture(slot, SurfaceKind::Noise);
        store.clear_textures();
        assert_eq!(store.texture(slot), None);
        assert_eq!(store.resolve(NOISE_TEXTURE), slot);
    }
}
