//! CPU Perlin-Worley noise reference for the cloud raymarcher.
//!
//! The runtime path bakes the cloud noise texture on the GPU. This crate
//! provides a deterministic CPU implementation of the same field for the
//! prebaked-texture workflow, export comparison, and tests: low-frequency
//! Perlin fBm remapped by inverted Worley noise, the standard billowing
//! cloud-shape formula.

use noise::core::worley::ReturnType;
use noise::{NoiseFn, Perlin, Worley};

/// Configuration for Perlin-Worley noise generation.
#[derive(Clone, Debug)]
pub struct NoiseParams {
    /// Seed for deterministic generation.
    pub seed: u32,
    /// Number of Perlin octaves composited into the base shape. Default: 4.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency of the first Perlin octave across one tile. Default: 4.0.
    pub perlin_frequency: f64,
    /// Cell frequency of the Worley erosion field. Default: 8.0.
    pub worley_frequency: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            perlin_frequency: 4.0,
            worley_frequency: 8.0,
        }
    }
}

/// Samples the Perlin-Worley cloud-shape field in normalized tile coordinates.
pub struct PerlinWorleySampler {
    perlin: Perlin,
    worley: Worley,
    params: NoiseParams,
}

impl PerlinWorleySampler {
    /// Create a new sampler with the given parameters.
    pub fn new(params: NoiseParams) -> Self {
        let perlin = Perlin::new(params.seed);
        let worley = Worley::new(params.seed.wrapping_add(1))
            .set_return_type(ReturnType::Distance)
            .set_frequency(params.worley_frequency);
        Self {
            perlin,
            worley,
            params,
        }
    }

    /// Multi-octave Perlin fBm at `(u, v)`, remapped into [0, 1].
    fn perlin_fbm(&self, u: f64, v: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut max_amplitude = 0.0;
        let mut frequency = self.params.perlin_frequency;

        for _ in 0..self.params.octaves {
            total += self.perlin.get([u * frequency, v * frequency]) * amplitude;
            max_amplitude += amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        ((total / max_amplitude) * 0.5 + 0.5).clamp(0.0, 1.0)
    }

    /// Inverted Worley (cellular) noise at `(u, v)` with a frequency
    /// multiplier, in [0, 1]. High values sit inside cells, producing the
    /// billowing erosion pattern.
    pub fn inverted_worley(&self, u: f64, v: f64, frequency_multiplier: f64) -> f64 {
        let d = self
            .worley
            .get([u * frequency_multiplier, v * frequency_multiplier]);
        (1.0 - (d * 0.5 + 0.5)).clamp(0.0, 1.0)
    }

    /// The Perlin-Worley cloud-shape value at `(u, v)`, in [0, 1]:
    /// Perlin fBm remapped so that the inverted Worley field carves its floor.
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        let base = self.perlin_fbm(u, v);
        let erosion = self.inverted_worley(u, v, 1.0);
        remap(base, erosion, 1.0, 0.0, 1.0).clamp(0.0, 1.0)
    }
}

/// Remap `value` from `[old_min, old_max]` into `[new_min, new_max]`.
fn remap(value: f64, old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> f64 {
    let span = old_max - old_min;
    if span.abs() < 1e-9 {
        return new_min;
    }
    new_min + (value - old_min) / span * (new_max - new_min)
}

/// A generated RGBA8 noise tile ready for texture upload or PNG export.
///
/// Channel packing: R = Perlin-Worley shape, G = inverted Worley at 2x cell
/// frequency, B = inverted Worley at 4x, A = opaque.
pub struct NoiseTile {
    /// Edge length in texels.
    pub size: u32,
    /// Tightly packed RGBA8 pixels, row-major, `size * size * 4` bytes.
    pub pixels: Vec<u8>,
}

impl NoiseTile {
    /// Generate a `size`×`size` tile. Deterministic for a given seed.
    pub fn generate(size: u32, params: &NoiseParams) -> Self {
        let sampler = PerlinWorleySampler::new(params.clone());
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        let step = 1.0 / f64::from(size);

        for y in 0..size {
            let v = (f64::from(y) + 0.5) * step;
            for x in 0..size {
                let u = (f64::from(x) + 0.5) * step;
                pixels.push(to_byte(sampler.sample(u, v)));
                pixels.push(to_byte(sampler.inverted_worley(u, v, 2.0)));
                pixels.push(to_byte(sampler.inverted_worley(u, v, 4.0)));
                pixels.push(255);
            }
        }

        Self { size, pixels }
    }
}

fn to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_in_unit_range() {
        let sampler = PerlinWorleySampler::new(NoiseParams::default());
        for i in 0..64 {
            let u = f64::from(i) / 64.0;
            for j in 0..64 {
                let v = f64::from(j) / 64.0;
                let s = sampler.sample(u, v);
                assert!((0.0..=1.0).contains(&s), "sample({u}, {v}) = {s}");
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let params = NoiseParams {
            seed: 42,
            ..NoiseParams::default()
        };
        let a = NoiseTile::generate(32, &params);
        let b = NoiseTile::generate(32, &params);
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseTile::generate(
            32,
            &NoiseParams {
                seed: 1,
                ..NoiseParams::default()
            },
        );
        let b = NoiseTile::generate(
            32,
            &NoiseParams {
                seed: 2,
                ..NoiseParams::default()
            },
        );
        assert_ne!(a.pixels, b.pixels);
    }

    #[test]
    fn test_tile_has_rgba_layout() {
        let tile = NoiseTile::generate(16, &NoiseParams::default());
        assert_eq!(tile.size, 16);
        assert_eq!(tile.pixels.len(), 16 * 16 * 4);
        // Alpha channel is opaque everywhere.
        assert!(tile.pixels.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_tile_is_not_constant() {
        let tile = NoiseTile::generate(64, &NoiseParams::default());
        let first = tile.pixels[0];
        assert!(
            tile.pixels.chunks_exact(4).any(|px| px[0] != first),
            "red channel is constant; noise field degenerate"
        );
    }

    #[test]
    fn test_remap_endpoints() {
        assert!((remap(0.25, 0.25, 1.0, 0.0, 1.0) - 0.0).abs() < 1e-12);
        assert!((remap(1.0, 0.25, 1.0, 0.0, 1.0) - 1.0).abs() < 1e-12);
        // Degenerate span collapses to the new minimum instead of dividing
        // by zero.
        assert_eq!(remap(0.5, 0.5, 0.5, 0.0, 1.0), 0.0);
    }
}
