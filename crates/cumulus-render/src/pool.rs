//! Lazily-created, screen-size-bound GPU surfaces for the cloud passes.
//!
//! The pool owns four surfaces: the fixed-size noise texture, a tiny temp
//! scratch texture, and the two screen-sized history targets. Each is created
//! on first access with fixed label/format/filtering. The pool performs no
//! implicit resize detection; the orchestrator decides when history surfaces
//! are stale and calls [`SurfacePool::invalidate_history`].
//!
//! wgpu surface allocation has no recoverable failure mode: a failed
//! allocation is device loss, which is fatal to the effect and surfaces to the
//! host through the device's error callback.

use cumulus_noise::NoiseTile;

/// Edge length of the square noise texture in texels.
pub const NOISE_DIM: u32 = 1024;
/// Edge length of the temp scratch texture in texels.
pub const TEMP_DIM: u32 = 4;
/// Pixel format of the noise and temp textures.
pub const NOISE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Pool slot identifiers used by recorded commands and global bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Fixed 1024×1024 noise texture, point-filtered, persists across resizes.
    Noise,
    /// Fixed 4×4 scratch texture, never released.
    Temp,
    /// Screen-sized history target A, always the "last frame" source.
    HistoryLast,
    /// Screen-sized history target B, always written by the raymarch pass.
    HistoryCurrent,
}

/// The history buffer format for a viewpoint: half-float when the viewpoint
/// allows HDR intermediates, standard 8-bit otherwise.
pub fn history_format(hdr: bool) -> wgpu::TextureFormat {
    if hdr {
        wgpu::TextureFormat::Rgba16Float
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

/// A GPU-resident 2D surface with its default view and metadata.
pub struct ManagedSurface {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// Default view into the texture.
    pub view: wgpu::TextureView,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Pixel format.
    pub format: wgpu::TextureFormat,
    /// Debug label.
    pub label: &'static str,
}

impl ManagedSurface {
    fn create(
        device: &wgpu::Device,
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("allocated surface '{label}' {width}x{height} {format:?}");
        Self {
            texture,
            view,
            width,
            height,
            format,
            label,
        }
    }
}

/// Owns the cloud effect's intermediate surfaces and their lifecycle.
#[derive(Default)]
pub struct SurfacePool {
    noise: Option<ManagedSurface>,
    temp: Option<ManagedSurface>,
    history_last: Option<ManagedSurface>,
    history_current: Option<ManagedSurface>,
}

impl SurfacePool {
    /// Create a pool with nothing allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// The noise texture, allocated on first access.
    pub fn noise(&mut self, device: &wgpu::Device) -> &ManagedSurface {
        self.noise.get_or_insert_with(|| {
            ManagedSurface::create(
                device,
                "cloud-noise",
                NOISE_DIM,
                NOISE_DIM,
                NOISE_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
            )
        })
    }

    /// The temp scratch texture, allocated on first access.
    pub fn temp(&mut self, device: &wgpu::Device) -> &ManagedSurface {
        self.temp.get_or_insert_with(|| {
            ManagedSurface::create(
                device,
                "cloud-temp",
                TEMP_DIM,
                TEMP_DIM,
                NOISE_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            )
        })
    }

    /// History target A ("last frame"), allocated on first access with the
    /// requested dimensions and format. An existing surface is returned as-is
    /// even if its dimensions are stale; invalidation is the caller's job.
    pub fn history_last(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> &ManagedSurface {
        self.history_last.get_or_insert_with(|| {
            ManagedSurface::create(
                device,
                "cloud-history-a",
                width,
                height,
                format,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST,
            )
        })
    }

    /// History target B ("current"), allocated on first access with the
    /// requested dimensions and format.
    pub fn history_current(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> &ManagedSurface {
        self.history_current.get_or_insert_with(|| {
            ManagedSurface::create(
                device,
                "cloud-history-b",
                width,
                height,
                format,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            )
        })
    }

    /// Look up an allocated surface without allocating.
    pub fn get(&self, kind: SurfaceKind) -> Option<&ManagedSurface> {
        match kind {
            SurfaceKind::Noise => self.noise.as_ref(),
            SurfaceKind::Temp => self.temp.as_ref(),
            SurfaceKind::HistoryLast => self.history_last.as_ref(),
            SurfaceKind::HistoryCurrent => self.history_current.as_ref(),
        }
    }

    /// Drop both history surfaces so the next access recreates them at the
    /// new dimensions. The noise texture persists across resizes.
    pub fn invalidate_history(&mut self) {
        if self.history_last.is_some() || self.history_current.is_some() {
            log::debug!("invalidating history surfaces");
        }
        self.history_last = None;
        self.history_current = None;
    }

    /// Release GPU memory for the noise and history surfaces and null their
    /// handles. The temp surface is intentionally excluded; it is cheap and
    /// reused. Idempotent.
    pub fn release_all(&mut self) {
        log::debug!("releasing cloud surfaces");
        self.noise = None;
        self.history_last = None;
        self.history_current = None;
    }

    /// Upload a CPU-generated noise tile into the noise surface (prebaked
    /// path). The tile must match the noise texture's fixed dimensions.
    pub fn upload_noise(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, tile: &NoiseTile) {
        debug_assert_eq!(tile.size, NOISE_DIM);
        let surface = self.noise(device);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &tile.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(tile.size * 4),
                rows_per_image: Some(tile.size),
            },
            wgpu::Extent3d {
                width: tile.size,
                height: tile.size,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_format_tracks_hdr_capability() {
        assert_eq!(history_format(true), wgpu::TextureFormat::Rgba16Float);
        assert_eq!(history_format(false), wgpu::TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn test_new_pool_has_nothing_allocated() {
        let pool = SurfacePool::new();
        for kind in [
            SurfaceKind::Noise,
            SurfaceKind::Temp,
            SurfaceKind::HistoryLast,
            SurfaceKind::HistoryCurrent,
        ] {
            assert!(pool.get(kind).is_none(), "{kind:?} unexpectedly allocated");
        }
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let mut pool = SurfacePool::new();
        pool.release_all();
        pool.release_all();
        assert!(pool.get(SurfaceKind::Noise).is_none());
        assert!(pool.get(SurfaceKind::HistoryLast).is_none());
        assert!(pool.get(SurfaceKind::HistoryCurrent).is_none());
    }

    #[test]
    fn test_invalidate_history_without_allocation_is_a_noop() {
        let mut pool = SurfacePool::new();
        pool.invalidate_history();
        assert!(pool.get(SurfaceKind::HistoryLast).is_none());
    }

    #[test]
    fn test_fixed_surface_dimensions() {
        assert_eq!(NOISE_DIM, 1024);
        assert_eq!(TEMP_DIM, 4);
    }
}
