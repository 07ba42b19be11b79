//! The multi-technique cloud pass effect: raymarch, noise bake, composite.
//!
//! Techniques are selected by the integer pass indices in
//! [`pass_index`](crate::command::pass_index); the orchestrator records blits
//! against those indices without knowing anything about the shader internals.
//! This module is the default implementation of that contract: one WGSL
//! module with a fragment entry point per technique, all sharing a fullscreen
//! triangle vertex stage that bilinearly interpolates the frustum corner rays.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::command::{BlitTarget, Command, CommandList, pass_index};
use crate::config::CloudConfig;
use crate::globals::{GlobalStore, SlotId};
use crate::orchestrator::CloudSlots;
use crate::pool::{ManagedSurface, NOISE_FORMAT, SurfaceKind, SurfacePool};

/// Errors that abort playback of a recorded command list. They fail only the
/// current frame's pass sequence, never the host's render loop.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// A command referenced a pool surface that is not allocated.
    #[error("surface {0:?} is not allocated")]
    SurfaceMissing(SurfaceKind),

    /// A texture global consumed by the passes was never published.
    #[error("shader global '{0}' is not bound")]
    GlobalNotBound(&'static str),

    /// A blit referenced an effect technique that does not exist.
    #[error("effect has no pass index {0}")]
    UnknownPass(u32),

    /// Plain copies are only defined between pool surfaces.
    #[error("plain copy must be between pool surfaces")]
    UnsupportedCopy,
}

/// GPU uniform for the cloud passes. `frustum_rays` rows are the bottom-left,
/// bottom-right, top-right and top-left corner rays, in that order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct CloudParams {
    pub frustum_rays: [[f32; 4]; 4],
    pub wind: [f32; 3],
    pub frame_index: u32,
    pub coverage: f32,
    pub density: f32,
    pub altitude_min: f32,
    pub altitude_max: f32,
    pub march_steps: u32,
    pub light_steps: u32,
    pub temporal_blend: f32,
    pub _pad: u32,
}

/// WGSL source for all cloud passes (raymarch, noise bake, composite).
pub const CLOUD_SHADER_SOURCE: &str = r#"
struct CloudParams {
    frustum_rays: mat4x4<f32>,
    wind: vec3<f32>,
    frame_index: u32,
    coverage: f32,
    density: f32,
    altitude_min: f32,
    altitude_max: f32,
    march_steps: u32,
    light_steps: u32,
    temporal_blend: f32,
    _pad: u32,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) ray: vec3<f32>,
};

@group(0) @binding(0) var<uniform> params: CloudParams;
@group(1) @binding(0) var src_texture: texture_2d<f32>;
@group(1) @binding(1) var src_sampler: sampler;
@group(2) @binding(0) var noise_texture: texture_2d<f32>;
@group(2) @binding(1) var history_texture: texture_2d<f32>;
@group(2) @binding(2) var noise_sampler: sampler;
@group(2) @binding(3) var history_sampler: sampler;

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let corner = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    // Corner rays are packed as matrix rows {bottom-left, bottom-right,
    // top-right, top-left}; mat4x4 uniforms are column-major, so transpose
    // back to row access before interpolating.
    let rays = transpose(params.frustum_rays);
    let bottom = mix(rays[0].xyz, rays[1].xyz, out.uv.x);
    let top = mix(rays[3].xyz, rays[2].xyz, out.uv.x);
    out.ray = mix(top, bottom, out.uv.y);
    return out;
}

fn hash21(p: vec2<f32>) -> f32 {
    var q = fract(p * vec2<f32>(123.34, 345.45));
    q += dot(q, q + 34.345);
    return fract(q.x * q.y);
}

fn hash22(p: vec2<f32>) -> vec2<f32> {
    let k = vec2<f32>(127.1, 311.7);
    let l = vec2<f32>(269.5, 183.3);
    return fract(sin(vec2<f32>(dot(p, k), dot(p, l))) * 43758.5453);
}

fn value_noise(p: vec2<f32>) -> f32 {
    let i = floor(p);
    let f = fract(p);
    let u = f * f * (3.0 - 2.0 * f);
    let a = hash21(i);
    let b = hash21(i + vec2<f32>(1.0, 0.0));
    let c = hash21(i + vec2<f32>(0.0, 1.0));
    let d = hash21(i + vec2<f32>(1.0, 1.0));
    return mix(mix(a, b, u.x), mix(c, d, u.x), u.y);
}

fn fbm(p: vec2<f32>) -> f32 {
    var total = 0.0;
    var amplitude = 0.5;
    var q = p;
    for (var i = 0; i < 4; i = i + 1) {
        total += value_noise(q) * amplitude;
        q = q * 2.0;
        amplitude = amplitude * 0.5;
    }
    return total;
}

fn worley(p: vec2<f32>, frequency: f32) -> f32 {
    let q = p * frequency;
    let cell = floor(q);
    var min_dist = 1.0e9;
    for (var dy = -1; dy <= 1; dy = dy + 1) {
        for (var dx = -1; dx <= 1; dx = dx + 1) {
            let neighbor = cell + vec2<f32>(f32(dx), f32(dy));
            let feature = neighbor + hash22(neighbor);
            min_dist = min(min_dist, distance(q, feature));
        }
    }
    return clamp(min_dist, 0.0, 1.0);
}

fn remap(value: f32, old_min: f32, old_max: f32, new_min: f32, new_max: f32) -> f32 {
    return new_min + (value - old_min) / max(old_max - old_min, 1.0e-5) * (new_max - new_min);
}

fn sample_density(pos: vec3<f32>) -> f32 {
    let drift = params.wind.xz * f32(params.frame_index) * 0.0005;
    let uv = fract(pos.xz * 0.00005 + drift);
    let n = textureSampleLevel(noise_texture, noise_sampler, uv, 0.0);
    let slab = max(params.altitude_max - params.altitude_min, 1.0);
    let h = clamp((pos.y - params.altitude_min) / slab, 0.0, 1.0);
    // Rounded vertical profile: zero at the slab edges, fattest in the middle.
    let profile = h * (1.0 - h) * 4.0;
    return max(n.r * profile - (1.0 - params.coverage), 0.0);
}

fn light_march(pos: vec3<f32>) -> f32 {
    let sun_dir = normalize(vec3<f32>(0.3, 0.8, 0.2));
    let steps = max(params.light_steps, 1u);
    let step_len = (params.altitude_max - params.altitude_min) / f32(steps);
    var occlusion = 0.0;
    var p = pos;
    for (var i = 0u; i < steps; i = i + 1u) {
        p += sun_dir * step_len;
        occlusion += sample_density(p);
    }
    return exp(-occlusion * params.density * step_len * 0.01);
}

@fragment
fn fs_raymarch(in: VertexOutput) -> @location(0) vec4<f32> {
    let history = textureSample(history_texture, history_sampler, in.uv);

    // Temporal schedule: each pixel fully refreshes once every four frames,
    // staggered by position parity; in between it leans on history.
    let pix = vec2<u32>(in.position.xy);
    let phase = (pix.x + 2u * pix.y + params.frame_index) % 4u;

    var cloud = vec4<f32>(0.0, 0.0, 0.0, 0.0);
    let ray = normalize(in.ray);
    if (ray.y > 0.02) {
        let t0 = params.altitude_min / ray.y;
        let t1 = params.altitude_max / ray.y;
        let steps = max(params.march_steps, 1u);
        let dt = (t1 - t0) / f32(steps);
        // Per-frame jitter decorrelates the sample pattern across frames.
        let jitter = hash21(in.uv * 1024.0 + f32(params.frame_index % 64u));
        var t = t0 + dt * jitter;
        var transmittance = 1.0;
        var energy = 0.0;
        for (var i = 0u; i < steps; i = i + 1u) {
            let pos = ray * t;
            let d = sample_density(pos);
            if (d > 0.0) {
                let lit = light_march(pos);
                energy += d * lit * transmittance * dt * params.density * 0.01;
                transmittance *= exp(-d * params.density * dt * 0.01);
                if (transmittance < 0.01) {
                    break;
                }
            }
            t += dt;
        }
        cloud = vec4<f32>(vec3<f32>(energy), 1.0 - transmittance);
    }

    let refresh = select(params.temporal_blend, 1.0, phase == 0u);
    return mix(history, cloud, refresh);
}

@fragment
fn fs_noise_bake(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = fbm(in.uv * 8.0);
    let w1 = 1.0 - worley(in.uv, 8.0);
    let w2 = 1.0 - worley(in.uv, 16.0);
    let w4 = 1.0 - worley(in.uv, 32.0);
    let shape = clamp(remap(base, w1, 1.0, 0.0, 1.0), 0.0, 1.0);
    return vec4<f32>(shape, w2, w4, 1.0);
}

@fragment
fn fs_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(src_texture, src_sampler, in.uv);
}
"#;

/// The multi-pass cloud effect: pipelines, samplers, and the params uniform.
pub struct CloudEffect {
    config: CloudConfig,
    #[allow(dead_code)]
    params_bgl: wgpu::BindGroupLayout,
    source_bgl: wgpu::BindGroupLayout,
    cloud_inputs_bgl: wgpu::BindGroupLayout,
    raymarch_pipeline: wgpu::RenderPipeline,
    noise_bake_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    sampler_linear: wgpu::Sampler,
    sampler_nearest: wgpu::Sampler,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
}

impl CloudEffect {
    /// Create the effect for a scene color format and a history buffer format.
    ///
    /// `scene_format` is the viewpoint's color target format (composite
    /// output); `history_format` is the format of the pooled history surfaces
    /// (raymarch output).
    pub fn new(
        device: &wgpu::Device,
        scene_format: wgpu::TextureFormat,
        history_format: wgpu::TextureFormat,
        config: CloudConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cloud-shader"),
            source: wgpu::ShaderSource::Wgsl(CLOUD_SHADER_SOURCE.into()),
        });

        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<CloudParams>() as u64
                    ),
                },
                count: None,
            }],
        });

        let source_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-source-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let cloud_inputs_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-inputs-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // The raymarch technique is the only one consuming the noise/history
        // inputs; bake and composite get a layout without that group so the
        // bake pass can render into the noise texture it would otherwise have
        // bound for sampling.
        let march_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cloud-march-layout"),
            bind_group_layouts: &[&params_bgl, &source_bgl, &cloud_inputs_bgl],
            immediate_size: 0,
        });
        let blit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cloud-blit-layout"),
            bind_group_layouts: &[&params_bgl, &source_bgl],
            immediate_size: 0,
        });

        let raymarch_pipeline = create_fullscreen_pipeline(
            device,
            &shader,
            &march_layout,
            "fs_raymarch",
            history_format,
            None,
            "cloud-raymarch",
        );
        let noise_bake_pipeline = create_fullscreen_pipeline(
            device,
            &shader,
            &blit_layout,
            "fs_noise_bake",
            NOISE_FORMAT,
            None,
            "cloud-noise-bake",
        );
        let composite_pipeline = create_fullscreen_pipeline(
            device,
            &shader,
            &blit_layout,
            "fs_composite",
            scene_format,
            Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::OVER,
            }),
            "cloud-composite",
        );

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("cloud-sampler-linear"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // The noise texture is point-filtered: the raymarcher treats it as a
        // hash source, not an image.
        let sampler_nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("cloud-sampler-nearest"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params = CloudParams::from_config(&config, Mat4::IDENTITY, 0);
        use wgpu::util::DeviceExt;
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cloud-params"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-params-bg"),
            layout: &params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        Self {
            config,
            params_bgl,
            source_bgl,
            cloud_inputs_bgl,
            raymarch_pipeline,
            noise_bake_pipeline,
            composite_pipeline,
            sampler_linear,
            sampler_nearest,
            params_buffer,
            params_bind_group,
        }
    }

    /// Update the effect configuration. Takes hold on the next `execute`.
    pub fn set_config(&mut self, config: CloudConfig) {
        self.config = config;
    }

    /// The active configuration.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Play a recorded command list into the encoder: technique blits become
    /// fullscreen passes, passless blits become texture copies. GPU ordering
    /// follows recording order.
    ///
    /// `scene_view` is the viewpoint's color target; its texture must carry
    /// both `RENDER_ATTACHMENT` and `TEXTURE_BINDING` usage since the
    /// raymarch pass samples it and the composite pass renders onto it.
    pub fn execute(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        list: &CommandList,
        pool: &SurfacePool,
        scene_view: &wgpu::TextureView,
        store: &GlobalStore,
        slots: &CloudSlots,
    ) -> Result<(), EffectError> {
        if list.is_empty() {
            return Ok(());
        }

        // Fold the list-scoped globals into this frame's params upload.
        let mut frustum = Mat4::IDENTITY;
        let mut frame_index = 0u32;
        for command in list.commands() {
            match command {
                Command::SetMat4 { slot, value } if *slot == slots.frustum_rays => {
                    frustum = *value;
                }
                Command::SetUint { slot, value } if *slot == slots.frame_index => {
                    frame_index = *value;
                }
                _ => {}
            }
        }
        let params = CloudParams::from_config(&self.config, frustum, frame_index);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[params]));

        // Resolve the store-scoped texture globals the raymarcher consumes.
        // Only built when the list actually raymarches, so a bake-only list
        // does not require history globals to be published yet.
        let needs_cloud_inputs = list.commands().iter().any(|c| {
            matches!(
                c,
                Command::Blit {
                    pass: Some(pass_index::RAYMARCH),
                    ..
                }
            )
        });
        let cloud_inputs = if needs_cloud_inputs {
            let noise = resolve_surface(store, pool, slots.noise)?;
            let history = resolve_surface(store, pool, slots.history)?;
            Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("cloud-inputs-bg"),
                layout: &self.cloud_inputs_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&noise.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&history.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler_nearest),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.sampler_linear),
                    },
                ],
            }))
        } else {
            None
        };

        for command in list.commands() {
            let Command::Blit { src, dst, pass } = command else {
                continue;
            };
            match pass {
                Some(index) => {
                    let pipeline = self.pipeline(*index)?;
                    let src_view = self.resolve_view(pool, scene_view, src)?;
                    let dst_view = self.resolve_view(pool, scene_view, dst)?;
                    let src_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("cloud-source-bg"),
                        layout: &self.source_bgl,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(src_view),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&self.sampler_linear),
                            },
                        ],
                    });

                    // Composite blends over the scene; everything else owns
                    // its whole target.
                    let load = if *index == pass_index::COMPOSITE {
                        wgpu::LoadOp::Load
                    } else {
                        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
                    };

                    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("cloud-pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: dst_view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load,
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        multiview_mask: None,
                    });
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, &self.params_bind_group, &[]);
                    rpass.set_bind_group(1, &src_bind, &[]);
                    if *index == pass_index::RAYMARCH
                        && let Some(inputs) = &cloud_inputs
                    {
                        rpass.set_bind_group(2, inputs, &[]);
                    }
                    rpass.draw(0..3, 0..1);
                }
                None => {
                    let (BlitTarget::Surface(src_kind), BlitTarget::Surface(dst_kind)) = (src, dst)
                    else {
                        return Err(EffectError::UnsupportedCopy);
                    };
                    let src_surface = pool
                        .get(*src_kind)
                        .ok_or(EffectError::SurfaceMissing(*src_kind))?;
                    let dst_surface = pool
                        .get(*dst_kind)
                        .ok_or(EffectError::SurfaceMissing(*dst_kind))?;
                    encoder.copy_texture_to_texture(
                        wgpu::TexelCopyTextureInfo {
                            texture: &src_surface.texture,
                            mip_level: 0,
                            origin: wgpu::Origin3d::ZERO,
                            aspect: wgpu::TextureAspect::All,
                        },
                        wgpu::TexelCopyTextureInfo {
                            texture: &dst_surface.texture,
                            mip_level: 0,
                            origin: wgpu::Origin3d::ZERO,
                            aspect: wgpu::TextureAspect::All,
                        },
                        wgpu::Extent3d {
                            width: src_surface.width,
                            height: src_surface.height,
                            depth_or_array_layers: 1,
                        },
                    );
                }
            }
        }

        Ok(())
    }

    fn pipeline(&self, index: u32) -> Result<&wgpu::RenderPipeline, EffectError> {
        match index {
            pass_index::RAYMARCH => Ok(&self.raymarch_pipeline),
            pass_index::NOISE_BAKE => Ok(&self.noise_bake_pipeline),
            pass_index::COMPOSITE => Ok(&self.composite_pipeline),
            other => Err(EffectError::UnknownPass(other)),
        }
    }

    fn resolve_view<'a>(
        &self,
        pool: &'a SurfacePool,
        scene_view: &'a wgpu::TextureView,
        target: &BlitTarget,
    ) -> Result<&'a wgpu::TextureView, EffectError> {
        match target {
            BlitTarget::SceneColor => Ok(scene_view),
            BlitTarget::Surface(kind) => pool
                .get(*kind)
                .map(|surface| &surface.view)
                .ok_or(EffectError::SurfaceMissing(*kind)),
        }
    }
}

impl CloudParams {
    fn from_config(config: &CloudConfig, frustum_rays: Mat4, frame_index: u32) -> Self {
        Self {
            frustum_rays: frustum_rays.to_cols_array_2d(),
            wind: config.wind.to_array(),
            frame_index,
            coverage: config.coverage,
            density: config.density,
            altitude_min: config.altitude_min,
            altitude_max: config.altitude_max,
            march_steps: config.march_steps,
            light_steps: config.light_steps,
            temporal_blend: config.temporal_blend,
            _pad: 0,
        }
    }
}

fn resolve_surface<'a>(
    store: &GlobalStore,
    pool: &'a SurfacePool,
    slot: SlotId,
) -> Result<&'a ManagedSurface, EffectError> {
    let kind = store
        .texture(slot)
        .ok_or_else(|| EffectError::GlobalNotBound(store.name(slot).unwrap_or("<unresolved>")))?;
    pool.get(kind).ok_or(EffectError::SurfaceMissing(kind))
}

/// Create a fullscreen render pipeline with the given fragment entry point.
fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    target_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_uniform_size_and_alignment() {
        // The WGSL CloudParams struct mirrors this layout exactly; uniform
        // structs must be 16-byte multiples.
        assert_eq!(std::mem::size_of::<CloudParams>(), 112);
        assert_eq!(std::mem::size_of::<CloudParams>() % 16, 0);
    }

    #[test]
    fn test_shader_declares_all_techniques() {
        for entry in ["vs_fullscreen", "fs_raymarch", "fs_noise_bake", "fs_composite"] {
            assert!(
                CLOUD_SHADER_SOURCE.contains(&format!("fn {entry}")),
                "missing entry point {entry}"
            );
        }
    }

    #[test]
    fn test_params_capture_config_and_frame() {
        let config = CloudConfig {
            coverage: 0.7,
            march_steps: 32,
            ..CloudConfig::default()
        };
        let params = CloudParams::from_config(&config, Mat4::IDENTITY, 41);
        assert_eq!(params.frame_index, 41);
        assert_eq!(params.coverage, 0.7);
        assert_eq!(params.march_steps, 32);
        assert_eq!(params.frustum_rays[0][0], 1.0);
    }
}
