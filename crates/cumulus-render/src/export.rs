//! Offline export of a pooled surface to PNG.
//!
//! Reads back the baked noise texture (or any RGBA8 pooled surface) and
//! serializes it on demand. This is a tooling path, not part of the per-frame
//! render loop: it blocks on the GPU readback.

use std::path::Path;

use crate::pool::ManagedSurface;

/// Errors from the readback-and-encode path.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The buffer map failed (device loss or validation error).
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    /// The map callback never fired.
    #[error("readback channel closed before the map completed")]
    MapChannelClosed,

    /// PNG encoding failed.
    #[error("failed to encode png: {0}")]
    Png(#[from] png::EncodingError),

    /// Writing the output file failed.
    #[error("failed to write png file: {0}")]
    Io(#[from] std::io::Error),
}

/// Read back a surface and encode its contents as an RGBA8 PNG.
pub fn encode_surface_png(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &ManagedSurface,
) -> Result<Vec<u8>, ExportError> {
    let bytes_per_pixel = 4u32;
    let unpadded = surface.width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("cloud-export-readback"),
        size: u64::from(padded * surface.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("cloud-export-encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &surface.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(surface.height),
            },
        },
        wgpu::Extent3d {
            width: surface.width,
            height: surface.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit([encoder.finish()]);

    let buffer_slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    });

    rx.recv().map_err(|_| ExportError::MapChannelClosed)??;

    let mapped = buffer_slice.get_mapped_range();
    let pixels = strip_row_padding(&mapped, surface.width, surface.height, padded);
    drop(mapped);
    readback.unmap();

    log::info!(
        "exported surface '{}' ({}x{}) to png",
        surface.label,
        surface.width,
        surface.height
    );
    encode_png_rgba(&pixels, surface.width, surface.height)
}

/// Read back a surface and write it to `path` as PNG.
pub fn save_surface_png(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &ManagedSurface,
    path: &Path,
) -> Result<(), ExportError> {
    let bytes = encode_surface_png(device, queue, surface)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Strip wgpu's 256-byte row alignment padding from a mapped readback buffer.
fn strip_row_padding(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let bytes_per_pixel = 4u32;
    let unpadded = (width * bytes_per_pixel) as usize;
    let mut pixels = Vec::with_capacity(unpadded * height as usize);
    for row in 0..height {
        let start = (row * padded_bytes_per_row) as usize;
        pixels.extend_from_slice(&data[start..start + unpadded]);
    }
    pixels
}

/// Encode tightly packed RGBA8 pixels as a PNG byte stream.
fn encode_png_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(std::io::Cursor::new(&mut out), width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(pixels)?;
    }
    Ok(out)
}
