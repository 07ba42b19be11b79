//! Volumetric cloud post-process orchestration on wgpu: frustum-ray driven
//! raymarching, temporal history accumulation, and lazily managed
//! intermediate surfaces.
//!
//! The host engine calls [`CloudOrchestrator::prepare_frame`] once per
//! rendered frame, before it consumes any attached command lists, and then
//! plays the recorded list through [`CloudEffect::execute`] with the
//! viewpoint's scene color view.

pub mod command;
pub mod config;
pub mod effect;
pub mod export;
pub mod globals;
pub mod orchestrator;
pub mod pool;

pub use command::{
    BlitTarget, Command, CommandList, InjectionRegistry, InjectionStage, ViewpointId, pass_index,
};
pub use config::CloudConfig;
pub use effect::{CloudEffect, EffectError};
pub use export::{ExportError, encode_surface_png, save_surface_png};
pub use globals::{GlobalStore, SlotId};
pub use orchestrator::{
    CLOUD_LIST, CloudOrchestrator, CloudSlots, FrameDecision, FrameState, Viewpoint,
};
pub use pool::{
    ManagedSurface, NOISE_DIM, SurfaceKind, SurfacePool, TEMP_DIM, history_format,
};
