//! Frustum corner ray reconstruction for per-pixel raymarching.
//!
//! Instead of inverting the view-projection matrix once per pixel, the
//! raymarch shader receives the four near-plane corner rays packed as matrix
//! rows and bilinearly interpolates them across the screen. Each ray is scaled
//! so that multiplying it by a view-depth value yields a world-space position
//! along that ray.

use glam::{Mat4, Quat, Vec3};

/// Read-only per-frame snapshot of a camera's projection parameters.
///
/// Taken once per frame from the active viewpoint; never mutated by the
/// cloud core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    /// Near clip plane distance (positive).
    pub near: f32,
    /// Width / height.
    pub aspect: f32,
}

/// Read-only per-frame snapshot of a camera's world-space orientation basis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    /// View direction.
    pub forward: Vec3,
    /// Screen-right direction.
    pub right: Vec3,
    /// Screen-up direction.
    pub up: Vec3,
}

impl CameraPose {
    /// Derive the basis vectors from a rotation quaternion (camera looks down
    /// -Z with +Y up and +X right, matching the engine camera convention).
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            forward: rotation * Vec3::NEG_Z,
            right: rotation * Vec3::X,
            up: rotation * Vec3::Y,
        }
    }
}

/// The four world-space corner rays of the camera's near plane.
///
/// All four rays share the same magnitude `|topLeft corner| / near`, the
/// depth-to-distance factor of a symmetric frustum, so the shader converts a
/// depth value into a distance along the interpolated ray with one multiply.
///
/// `compute` is pure and performs no validation: degenerate camera state
/// (`fov_y_deg >= 180`, `aspect <= 0`, `near <= 0`) produces NaN rays and must
/// be guarded by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrustumRays {
    pub bottom_left: Vec3,
    pub bottom_right: Vec3,
    pub top_right: Vec3,
    pub top_left: Vec3,
}

impl FrustumRays {
    /// Compute the corner rays for one frame.
    pub fn compute(intrinsics: &CameraIntrinsics, pose: &CameraPose) -> Self {
        let half_height = intrinsics.near * (intrinsics.fov_y_deg * 0.5).to_radians().tan();
        let to_right = pose.right * half_height * intrinsics.aspect;
        let to_top = pose.up * half_height;
        let center = pose.forward * intrinsics.near;

        // scale = |topLeft| / near, computed once; the frustum is symmetric so
        // all four corners share it.
        let top_left = center + to_top - to_right;
        let scale = top_left.length() / intrinsics.near;

        Self {
            bottom_left: (center - to_top - to_right).normalize() * scale,
            bottom_right: (center - to_top + to_right).normalize() * scale,
            top_right: (center + to_top + to_right).normalize() * scale,
            top_left: top_left.normalize() * scale,
        }
    }

    /// Pack the rays as matrix rows in the fixed order {bottom-left,
    /// bottom-right, top-right, top-left}.
    ///
    /// The consuming shader indexes rows by screen-corner UV in exactly this
    /// arrangement; any reordering silently flips the sky.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_cols(
            self.bottom_left.extend(0.0),
            self.bottom_right.extend(0.0),
            self.top_right.extend(0.0),
            self.top_left.extend(0.0),
        )
        .transpose()
    }
}
