//! Tunable parameters for the cloud raymarch effect.

use glam::Vec3;

/// Configuration for the volumetric cloud effect.
#[derive(Clone, Debug)]
pub struct CloudConfig {
    /// Cloud coverage fraction. Range \[0, 1\]. Higher values fill more of the
    /// sky. Default: 0.5.
    pub coverage: f32,
    /// Extinction multiplier applied per march step. Default: 0.3.
    pub density: f32,
    /// Bottom of the cloud slab in world units above the camera. Default: 1500.
    pub altitude_min: f32,
    /// Top of the cloud slab in world units above the camera. Default: 4000.
    pub altitude_max: f32,
    /// Wind velocity scrolling the noise field, world units per frame-tick.
    /// Default: (10, 0, 5).
    pub wind: Vec3,
    /// Raymarch sample count through the slab. More steps sharpen detail at
    /// linear cost. Default: 64.
    pub march_steps: u32,
    /// Sample count of the secondary march toward the sun per density hit.
    /// Default: 6.
    pub light_steps: u32,
    /// Fraction of a freshly marched sample blended over the history value on
    /// frames where a pixel is not fully refreshed. Range \[0, 1\].
    /// Default: 0.05.
    pub temporal_blend: f32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            coverage: 0.5,
            density: 0.3,
            altitude_min: 1500.0,
            altitude_max: 4000.0,
            wind: Vec3::new(10.0, 0.0, 5.0),
            march_steps: 64,
            light_steps: 6,
            temporal_blend: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CloudConfig::default();
        assert_eq!(config.coverage, 0.5);
        assert_eq!(config.density, 0.3);
        assert_eq!(config.march_steps, 64);
        assert_eq!(config.light_steps, 6);
        assert!(config.altitude_min < config.altitude_max);
        assert!((0.0..=1.0).contains(&config.temporal_blend));
    }
}
