//! Re-recordable pass command lists and host injection points.
//!
//! A [`CommandList`] is an ordered list of GPU operations submitted together
//! at one injection point. It is cleared and re-recorded every frame; no
//! commands persist across frames. The [`InjectionRegistry`] models the named
//! stages in the host's per-frame render sequence where custom lists may be
//! inserted.

use std::collections::HashMap;

use glam::Mat4;

use crate::globals::SlotId;
use crate::pool::SurfaceKind;

/// Integer technique indices of the multi-pass cloud effect.
pub mod pass_index {
    /// Raymarch the cloud volume: scene color in, cloud buffer out.
    pub const RAYMARCH: u32 = 0;
    /// Bake the procedural noise texture: temp scratch in, noise out.
    pub const NOISE_BAKE: u32 = 1;
    /// Blend the cloud buffer over the scene color target.
    pub const COMPOSITE: u32 = 2;
}

/// Source or destination of a blit command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlitTarget {
    /// The viewpoint's color target, owned by the host.
    SceneColor,
    /// A pool-owned intermediate surface.
    Surface(SurfaceKind),
}

/// One recorded GPU operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Bind a matrix global for the remainder of this list.
    SetMat4 { slot: SlotId, value: Mat4 },
    /// Bind an unsigned integer global for the remainder of this list.
    SetUint { slot: SlotId, value: u32 },
    /// Full-screen blit through the effect technique `pass`, or a plain
    /// texture copy when `pass` is `None`.
    Blit {
        src: BlitTarget,
        dst: BlitTarget,
        pass: Option<u32>,
    },
}

/// An ordered, re-recordable list of GPU operations.
pub struct CommandList {
    name: &'static str,
    commands: Vec<Command>,
}

impl CommandList {
    /// Create an empty list with a stable name used for attachment.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            commands: Vec::new(),
        }
    }

    /// The list's attachment name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The recorded commands in submission order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop all recorded commands. Called at the top of every frame.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Record a matrix global with command-list scope.
    pub fn set_mat4(&mut self, slot: SlotId, value: Mat4) {
        self.commands.push(Command::SetMat4 { slot, value });
    }

    /// Record an integer global with command-list scope.
    pub fn set_uint(&mut self, slot: SlotId, value: u32) {
        self.commands.push(Command::SetUint { slot, value });
    }

    /// Record a full-screen blit through an effect technique.
    pub fn blit(&mut self, src: BlitTarget, dst: BlitTarget, pass: u32) {
        self.commands.push(Command::Blit {
            src,
            dst,
            pass: Some(pass),
        });
    }

    /// Record a plain texture copy (no shader).
    pub fn copy(&mut self, src: BlitTarget, dst: BlitTarget) {
        self.commands.push(Command::Blit {
            src,
            dst,
            pass: None,
        });
    }
}

/// Identifier of a host viewpoint (camera) for attachment bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewpointId(pub u32);

/// Named stages in the host's per-frame render sequence where custom command
/// lists may be inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InjectionStage {
    /// After scene rendering, before the host's own image effects run.
    BeforeImageEffects,
}

/// Host-side registry of command lists attached at injection points.
///
/// Lists are referenced by name; the orchestrator keeps ownership of the list
/// itself and re-records it in place each frame.
#[derive(Default)]
pub struct InjectionRegistry {
    attached: HashMap<(ViewpointId, InjectionStage), Vec<&'static str>>,
}

impl InjectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the lists attached at a viewpoint's injection point.
    pub fn attached_lists(&self, viewpoint: ViewpointId, stage: InjectionStage) -> &[&'static str] {
        self.attached
            .get(&(viewpoint, stage))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Attach a list at a viewpoint's injection point.
    pub fn attach(&mut self, viewpoint: ViewpointId, stage: InjectionStage, list: &'static str) {
        self.attached.entry((viewpoint, stage)).or_default().push(list);
    }

    /// Remove every list attached at a viewpoint's injection point.
    pub fn detach_all(&mut self, viewpoint: ViewpointId, stage: InjectionStage) {
        self.attached.remove(&(viewpoint, stage));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::GlobalStore;

    #[test]
    fn test_clear_drops_all_commands() {
        let mut store = GlobalStore::new();
        let slot = store.resolve(crate::globals::FRAME_INDEX);
        let mut list = CommandList::new("test");
        list.set_uint(slot, 7);
        list.blit(
            BlitTarget::SceneColor,
            BlitTarget::Surface(SurfaceKind::HistoryCurrent),
            pass_index::RAYMARCH,
        );
        assert_eq!(list.len(), 2);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_copy_records_passless_blit() {
        let mut list = CommandList::new("test");
        list.copy(
            BlitTarget::Surface(SurfaceKind::HistoryCurrent),
            BlitTarget::Surface(SurfaceKind::HistoryLast),
        );
        assert_eq!(
            list.commands(),
            &[Command::Blit {
                src: BlitTarget::Surface(SurfaceKind::HistoryCurrent),
                dst: BlitTarget::Surface(SurfaceKind::HistoryLast),
                pass: None,
            }]
        );
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = InjectionRegistry::new();
        assert!(
            registry
                .attached_lists(ViewpointId(0), InjectionStage::BeforeImageEffects)
                .is_empty()
        );
    }

    #[test]
    fn test_attach_and_detach() {
        let mut registry = InjectionRegistry::new();
        let vp = ViewpointId(3);
        registry.attach(vp, InjectionStage::BeforeImageEffects, "clouds");
        assert_eq!(
            registry.attached_lists(vp, InjectionStage::BeforeImageEffects),
            &["clouds"]
        );
        // A different viewpoint is unaffected.
        assert!(
            registry
                .attached_lists(ViewpointId(4), InjectionStage::BeforeImageEffects)
                .is_empty()
        );
        registry.detach_all(vp, InjectionStage::BeforeImageEffects);
        assert!(
            registry
                .attached_lists(vp, InjectionStage::BeforeImageEffects)
                .is_empty()
        );
    }
}
