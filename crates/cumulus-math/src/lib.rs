//! Camera geometry math for the cumulus volumetric cloud post-process.

pub mod rays;

pub use rays::{CameraIntrinsics, CameraPose, FrustumRays};
