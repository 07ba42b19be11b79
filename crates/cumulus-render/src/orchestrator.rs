//! Per-frame driver: noise bake scheduling, frame counter, shader-global
//! publication, and ordered pass recording.
//!
//! The host calls [`CloudOrchestrator::prepare_frame`] once per rendered
//! frame, strictly before it consumes any attached command lists, passing the
//! resolved viewpoint snapshot (when the host renders through an override
//! camera, e.g. an editor preview, it resolves that override before calling;
//! the core never queries global camera state).

use cumulus_math::{CameraIntrinsics, CameraPose, FrustumRays};

use crate::command::{
    BlitTarget, CommandList, InjectionRegistry, InjectionStage, ViewpointId, pass_index,
};
use crate::globals::{self, GlobalStore, SlotId};
use crate::pool::{NOISE_DIM, SurfaceKind, SurfacePool, history_format};

/// Attachment name of the orchestrator's command list.
pub const CLOUD_LIST: &str = "cumulus-clouds";

/// Per-frame snapshot of the active viewpoint, resolved by the host.
#[derive(Clone, Copy, Debug)]
pub struct Viewpoint {
    /// Host identifier of the camera this frame renders through.
    pub id: ViewpointId,
    /// Projection parameters.
    pub intrinsics: CameraIntrinsics,
    /// World-space orientation basis.
    pub pose: CameraPose,
    /// Color target width in pixels.
    pub width: u32,
    /// Color target height in pixels.
    pub height: u32,
    /// Whether the viewpoint's target allows HDR intermediates.
    pub hdr: bool,
}

/// Persistent frame bookkeeping. Lives for the orchestrator's attached
/// lifetime; reset only when the orchestrator is recreated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameState {
    /// Monotonic frame counter. Wraps at `u32::MAX`; it is only consumed as a
    /// temporal seed, never as an index.
    pub frame_index: u32,
    /// Viewpoint width observed on the last recorded frame.
    pub last_width: u32,
    /// Viewpoint height observed on the last recorded frame.
    pub last_height: u32,
}

/// What one frame's call decided to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDecision {
    /// Passes were recorded; the attached list is live this frame.
    Recorded,
    /// The viewpoint had zero area; nothing was recorded and no surface was
    /// allocated. Recoverable; retried next frame.
    Skipped,
}

/// Pure plan for one frame, derived from the frame state and viewpoint
/// dimensions before any GPU work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FramePlan {
    bake_noise: bool,
    record: bool,
}

impl FrameState {
    /// Advance the counter and decide this frame's work. Cached dimensions
    /// are updated only when recording proceeds, so a frame skipped while the
    /// window is minimized still triggers the resize path once dimensions
    /// recover.
    fn plan(&mut self, width: u32, height: u32) -> FramePlan {
        self.frame_index = self.frame_index.wrapping_add(1);

        if width == 0 || height == 0 {
            return FramePlan {
                bake_noise: false,
                record: false,
            };
        }

        let resized = width != self.last_width || height != self.last_height;
        if resized {
            self.last_width = width;
            self.last_height = height;
        }
        FramePlan {
            bake_noise: resized,
            record: true,
        }
    }
}

/// The five fixed global slots, resolved to handles once at startup.
#[derive(Clone, Copy, Debug)]
pub struct CloudSlots {
    /// Noise texture (global scope).
    pub noise: SlotId,
    /// Frustum-corner-ray matrix (command-list scope).
    pub frustum_rays: SlotId,
    /// Frame index (command-list scope).
    pub frame_index: SlotId,
    /// Last-frame history texture (global scope).
    pub history: SlotId,
    /// Current cloud texture (global scope).
    pub current: SlotId,
}

impl CloudSlots {
    /// Resolve all slot keys against a store.
    pub fn resolve(store: &mut GlobalStore) -> Self {
        Self {
            noise: store.resolve(globals::NOISE_TEXTURE),
            frustum_rays: store.resolve(globals::FRUSTUM_RAYS),
            frame_index: store.resolve(globals::FRAME_INDEX),
            history: store.resolve(globals::HISTORY_TEXTURE),
            current: store.resolve(globals::CURRENT_TEXTURE),
        }
    }
}

/// The per-frame driver owning the frame state, the surface pool, the global
/// store, and the re-recorded command list.
pub struct CloudOrchestrator {
    state: FrameState,
    pool: SurfacePool,
    list: CommandList,
    store: GlobalStore,
    slots: CloudSlots,
}

impl Default for CloudOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudOrchestrator {
    /// Create an orchestrator with slot keys resolved and nothing allocated.
    pub fn new() -> Self {
        let mut store = GlobalStore::new();
        let slots = CloudSlots::resolve(&mut store);
        Self {
            state: FrameState::default(),
            pool: SurfacePool::new(),
            list: CommandList::new(CLOUD_LIST),
            store,
            slots,
        }
    }

    /// Current frame bookkeeping.
    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// The surface pool.
    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    /// Mutable access to the surface pool (prebake upload, teardown).
    pub fn pool_mut(&mut self) -> &mut SurfacePool {
        &mut self.pool
    }

    /// The global binding store.
    pub fn store(&self) -> &GlobalStore {
        &self.store
    }

    /// The resolved slot handles.
    pub fn slots(&self) -> CloudSlots {
        self.slots
    }

    /// This orchestrator's command list as recorded for the current frame.
    pub fn command_list(&self) -> &CommandList {
        &self.list
    }

    /// Run the per-frame procedure: advance the counter, detect resize, bake
    /// noise when needed, attach the command list once, and re-record the
    /// frame's pass sequence.
    pub fn prepare_frame(
        &mut self,
        device: &wgpu::Device,
        viewpoint: &Viewpoint,
        registry: &mut InjectionRegistry,
    ) -> FrameDecision {
        let plan = self.state.plan(viewpoint.width, viewpoint.height);

        if !plan.record {
            log::debug!(
                "cloud frame {} skipped: viewpoint {}x{} has zero area",
                self.state.frame_index,
                viewpoint.width,
                viewpoint.height
            );
            self.list.clear();
            return FrameDecision::Skipped;
        }

        // Reallocation is sequenced strictly before pass recording so no pass
        // can bind a stale-sized surface.
        if plan.bake_noise {
            self.pool.invalidate_history();
        }
        let format = history_format(viewpoint.hdr);
        self.pool.noise(device);
        self.pool.temp(device);
        self.pool
            .history_last(device, viewpoint.width, viewpoint.height, format);
        self.pool
            .history_current(device, viewpoint.width, viewpoint.height, format);

        self.record_commands(registry, viewpoint, plan.bake_noise);
        FrameDecision::Recorded
    }

    /// Release the pooled GPU surfaces (noise and history; temp is retained).
    pub fn release_surfaces(&mut self) {
        self.pool.release_all();
    }

    /// Attach-once bookkeeping plus the frame's command recording. Pure with
    /// respect to GPU state; surfaces must already be allocated.
    fn record_commands(
        &mut self,
        registry: &mut InjectionRegistry,
        viewpoint: &Viewpoint,
        bake_noise: bool,
    ) {
        // Attach once per viewpoint: if any list is already registered at the
        // injection point, this one or another, leave the registry alone.
        if registry
            .attached_lists(viewpoint.id, InjectionStage::BeforeImageEffects)
            .is_empty()
        {
            registry.attach(
                viewpoint.id,
                InjectionStage::BeforeImageEffects,
                self.list.name(),
            );
            log::info!(
                "attached '{}' to viewpoint {:?} before image effects",
                self.list.name(),
                viewpoint.id
            );
        }

        self.list.clear();

        if bake_noise {
            log::info!("baking cloud noise texture ({NOISE_DIM}x{NOISE_DIM})");
            self.list.blit(
                BlitTarget::Surface(SurfaceKind::Temp),
                BlitTarget::Surface(SurfaceKind::Noise),
                pass_index::NOISE_BAKE,
            );
            self.store.set_texture(self.slots.noise, SurfaceKind::Noise);
        }

        let rays = FrustumRays::compute(&viewpoint.intrinsics, &viewpoint.pose);
        self.list.set_mat4(self.slots.frustum_rays, rays.to_matrix());
        self.list.set_uint(self.slots.frame_index, self.state.frame_index);

        // A is always "last" and B is always "current"; the copy-back below
        // is what rotates history, not a handle swap.
        self.store
            .set_texture(self.slots.history, SurfaceKind::HistoryLast);
        self.store
            .set_texture(self.slots.current, SurfaceKind::HistoryCurrent);

        self.list.blit(
            BlitTarget::SceneColor,
            BlitTarget::Surface(SurfaceKind::HistoryCurrent),
            pass_index::RAYMARCH,
        );
        self.list.blit(
            BlitTarget::Surface(SurfaceKind::HistoryCurrent),
            BlitTarget::SceneColor,
            pass_index::COMPOSITE,
        );
        self.list.copy(
            BlitTarget::Surface(SurfaceKind::HistoryCurrent),
            BlitTarget::Surface(SurfaceKind::HistoryLast),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use glam::Vec3;
    use std::collections::HashMap;

    fn test_viewpoint(width: u32, height: u32) -> Viewpoint {
        Viewpoint {
            id: ViewpointId(1),
            intrinsics: CameraIntrinsics {
                fov_y_deg: 60.0,
                near: 0.1,
                aspect: width.max(1) as f32 / height.max(1) as f32,
            },
            pose: CameraPose {
                forward: Vec3::Z,
                right: Vec3::X,
                up: Vec3::Y,
            },
            width,
            height,
            hdr: false,
        }
    }

    /// Drive the frame-state plan and command recording without a GPU device.
    fn run_frame(
        orchestrator: &mut CloudOrchestrator,
        registry: &mut InjectionRegistry,
        viewpoint: &Viewpoint,
    ) -> bool {
        let plan = orchestrator.state.plan(viewpoint.width, viewpoint.height);
        if !plan.record {
            orchestrator.list.clear();
            return false;
        }
        orchestrator.record_commands(registry, viewpoint, plan.bake_noise);
        true
    }

    #[test]
    fn test_frame_counter_advances_and_wraps() {
        let mut state = FrameState {
            frame_index: u32::MAX,
            ..FrameState::default()
        };
        state.plan(640, 480);
        assert_eq!(state.frame_index, 0);
        state.plan(640, 480);
        assert_eq!(state.frame_index, 1);
    }

    #[test]
    fn test_resize_check_is_idempotent() {
        let mut state = FrameState::default();
        let first = state.plan(1920, 1080);
        assert!(first.bake_noise, "first frame must bake");
        let second = state.plan(1920, 1080);
        assert!(!second.bake_noise, "identical dimensions must not re-bake");
        let resized = state.plan(1280, 720);
        assert!(resized.bake_noise, "changed dimensions must re-bake");
    }

    #[test]
    fn test_degenerate_viewport_records_nothing() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        let recorded = run_frame(&mut orchestrator, &mut registry, &test_viewpoint(0, 480));
        assert!(!recorded);
        assert!(orchestrator.command_list().is_empty());
        assert!(
            registry
                .attached_lists(ViewpointId(1), InjectionStage::BeforeImageEffects)
                .is_empty()
        );

        // Dimensions recover next frame: the skipped frame must not have
        // consumed the resize trigger.
        let recorded = run_frame(&mut orchestrator, &mut registry, &test_viewpoint(640, 480));
        assert!(recorded);
        assert!(matches!(
            orchestrator.command_list().commands()[0],
            Command::Blit {
                pass: Some(pass_index::NOISE_BAKE),
                ..
            }
        ));
    }

    #[test]
    fn test_first_frame_command_order() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        run_frame(&mut orchestrator, &mut registry, &test_viewpoint(800, 600));

        let commands = orchestrator.command_list().commands();
        assert_eq!(commands.len(), 6);
        assert!(matches!(
            commands[0],
            Command::Blit {
                src: BlitTarget::Surface(SurfaceKind::Temp),
                dst: BlitTarget::Surface(SurfaceKind::Noise),
                pass: Some(pass_index::NOISE_BAKE),
            }
        ));
        assert!(matches!(commands[1], Command::SetMat4 { .. }));
        assert!(matches!(commands[2], Command::SetUint { value: 1, .. }));
        assert!(matches!(
            commands[3],
            Command::Blit {
                src: BlitTarget::SceneColor,
                dst: BlitTarget::Surface(SurfaceKind::HistoryCurrent),
                pass: Some(pass_index::RAYMARCH),
            }
        ));
        assert!(matches!(
            commands[4],
            Command::Blit {
                src: BlitTarget::Surface(SurfaceKind::HistoryCurrent),
                dst: BlitTarget::SceneColor,
                pass: Some(pass_index::COMPOSITE),
            }
        ));
        assert!(matches!(
            commands[5],
            Command::Blit {
                src: BlitTarget::Surface(SurfaceKind::HistoryCurrent),
                dst: BlitTarget::Surface(SurfaceKind::HistoryLast),
                pass: None,
            }
        ));
    }

    #[test]
    fn test_steady_state_frame_has_no_bake() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        let viewpoint = test_viewpoint(800, 600);
        run_frame(&mut orchestrator, &mut registry, &viewpoint);
        run_frame(&mut orchestrator, &mut registry, &viewpoint);

        let commands = orchestrator.command_list().commands();
        assert_eq!(commands.len(), 5, "steady state: globals + three passes");
        assert!(
            !commands.iter().any(|c| matches!(
                c,
                Command::Blit {
                    pass: Some(pass_index::NOISE_BAKE),
                    ..
                }
            )),
            "steady-state frame re-baked noise"
        );
    }

    #[test]
    fn test_attach_happens_once() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        let viewpoint = test_viewpoint(800, 600);
        for _ in 0..3 {
            run_frame(&mut orchestrator, &mut registry, &viewpoint);
        }
        assert_eq!(
            registry.attached_lists(viewpoint.id, InjectionStage::BeforeImageEffects),
            &[CLOUD_LIST]
        );
    }

    #[test]
    fn test_attach_defers_to_existing_list() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        let viewpoint = test_viewpoint(800, 600);
        registry.attach(viewpoint.id, InjectionStage::BeforeImageEffects, "other");
        run_frame(&mut orchestrator, &mut registry, &viewpoint);
        // An occupied injection point is left untouched.
        assert_eq!(
            registry.attached_lists(viewpoint.id, InjectionStage::BeforeImageEffects),
            &["other"]
        );
    }

    #[test]
    fn test_globals_published_each_frame() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        run_frame(&mut orchestrator, &mut registry, &test_viewpoint(800, 600));

        let slots = orchestrator.slots();
        let store = orchestrator.store();
        assert_eq!(store.texture(slots.noise), Some(SurfaceKind::Noise));
        assert_eq!(store.texture(slots.history), Some(SurfaceKind::HistoryLast));
        assert_eq!(
            store.texture(slots.current),
            Some(SurfaceKind::HistoryCurrent)
        );
        // Matrix and frame index are list-scoped, not store-global.
        assert_eq!(store.texture(slots.frustum_rays), None);
        assert_eq!(store.texture(slots.frame_index), None);
    }

    /// Apply a recorded command list to a CPU model of the surfaces, with the
    /// raymarch "pass" writing a per-frame marker value.
    fn simulate(
        commands: &[Command],
        surfaces: &mut HashMap<SurfaceKind, u64>,
        scene: &mut u64,
        marker: u64,
    ) {
        for command in commands {
            if let Command::Blit { src, dst, pass } = command {
                let value = match pass {
                    Some(pass_index::RAYMARCH) => marker,
                    Some(pass_index::NOISE_BAKE) => marker,
                    _ => match src {
                        BlitTarget::SceneColor => *scene,
                        BlitTarget::Surface(kind) => surfaces.get(kind).copied().unwrap_or(0),
                    },
                };
                match dst {
                    BlitTarget::SceneColor => *scene = value,
                    BlitTarget::Surface(kind) => {
                        surfaces.insert(*kind, value);
                    }
                }
            }
        }
    }

    #[test]
    fn test_history_hand_off_across_frames() {
        let mut orchestrator = CloudOrchestrator::new();
        let mut registry = InjectionRegistry::new();
        let viewpoint = test_viewpoint(800, 600);
        let mut surfaces = HashMap::new();
        let mut scene = 0u64;

        for frame in 1..=5u64 {
            run_frame(&mut orchestrator, &mut registry, &viewpoint);

            // Before this frame's passes run, "last" still holds the previous
            // frame's result.
            if frame > 1 {
                assert_eq!(
                    surfaces.get(&SurfaceKind::HistoryLast),
                    Some(&(frame - 1)),
                    "frame {frame}: stale history"
                );
            }

            simulate(
                orchestrator.command_list().commands(),
                &mut surfaces,
                &mut scene,
                frame,
            );

            // The copy-back leaves this frame's result in both targets.
            assert_eq!(surfaces.get(&SurfaceKind::HistoryCurrent), Some(&frame));
            assert_eq!(surfaces.get(&SurfaceKind::HistoryLast), Some(&frame));
            assert_eq!(scene, frame, "composite must land on the scene target");
        }
    }
}
