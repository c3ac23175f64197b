//! Bloom post-processing for the wgpu [`Context`].
//!
//! The scene is drawn into an HDR target; bright pixels are extracted into a
//! half-resolution target, blurred horizontally then vertically, and added
//! back while tonemapping onto the surface.

use wgpu::util::DeviceExt;

use crate::{
    camera::CameraState,
    config::BloomSettings,
    context::Context,
    data_structures::{scene_graph::SceneGraph, texture::Texture},
    error::RenderError,
    render::{Pass, PostProcessChain},
};

#[cfg(not(target_arch = "wasm32"))]
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
// Float render targets are an optional WebGL2 extension.
#[cfg(target_arch = "wasm32")]
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct BloomParams {
    texel_dir: [f32; 2],
    threshold: f32,
    strength: f32,
}

/// Uniforms of the four fullscreen passes. Each pass owns its buffer since all
/// writes land before the frame's single submit.
struct ParamBuffers {
    threshold: wgpu::Buffer,
    blur_h: wgpu::Buffer,
    blur_v: wgpu::Buffer,
    composite: wgpu::Buffer,
}

impl ParamBuffers {
    fn new(device: &wgpu::Device) -> Self {
        let mk = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&[BloomParams::default()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        Self {
            threshold: mk("bloom threshold params"),
            blur_h: mk("bloom horizontal blur params"),
            blur_v: mk("bloom vertical blur params"),
            composite: mk("bloom composite params"),
        }
    }
}

/// Size-dependent targets and the bind groups sampling them.
struct Targets {
    hdr: Texture,
    bright: Texture,
    ping: Texture,
    threshold: wgpu::BindGroup,
    blur_h: wgpu::BindGroup,
    blur_v: wgpu::BindGroup,
    composite: wgpu::BindGroup,
}

impl Targets {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        params: &ParamBuffers,
        size: [u32; 2],
    ) -> Self {
        let half = half_size(size);
        let hdr = Texture::create_render_target(device, size, HDR_FORMAT, "bloom hdr target");
        let bright = Texture::create_render_target(device, half, HDR_FORMAT, "bloom bright target");
        let ping = Texture::create_render_target(device, half, HDR_FORMAT, "bloom ping target");

        let bind = |label: &str, source: &Texture, bloom: &Texture, buffer: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&bloom.view),
                    },
                ],
                label: Some(label),
            })
        };
        // Binding 3 is only read by the composite; the other passes repeat
        // their source so no bind group aliases its own render target.
        let threshold = bind("bloom threshold", &hdr, &hdr, &params.threshold);
        let blur_h = bind("bloom horizontal blur", &bright, &bright, &params.blur_h);
        let blur_v = bind("bloom vertical blur", &ping, &ping, &params.blur_v);
        let composite = bind("bloom composite", &hdr, &bright, &params.composite);

        Self {
            hdr,
            bright,
            ping,
            threshold,
            blur_h,
            blur_v,
            composite,
        }
    }
}

fn half_size(size: [u32; 2]) -> [u32; 2] {
    [(size[0] / 2).max(1), (size[1] / 2).max(1)]
}

/// Uniform values of each pass for one frame.
fn frame_params(settings: Option<BloomSettings>, size: [u32; 2]) -> [BloomParams; 4] {
    let [w, h] = half_size(size);
    let Some(settings) = settings else {
        return [BloomParams::default(); 4];
    };
    let spread = 1.0 + settings.radius * 4.0;
    let threshold = BloomParams {
        threshold: settings.threshold,
        ..Default::default()
    };
    let blur_h = BloomParams {
        texel_dir: [spread / w as f32, 0.0],
        ..Default::default()
    };
    let blur_v = BloomParams {
        texel_dir: [0.0, spread / h as f32],
        ..Default::default()
    };
    let composite = BloomParams {
        strength: settings.strength,
        ..Default::default()
    };
    [threshold, blur_h, blur_v, composite]
}

/// [`PostProcessChain`] for the wgpu backend.
pub struct EffectComposer {
    passes: Vec<Pass>,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    params: ParamBuffers,
    targets: Targets,
    size: [u32; 2],
}

impl EffectComposer {
    pub fn new(context: &mut Context) -> Self {
        context.ensure_pipelines(HDR_FORMAT);
        let device = &context.device;
        let size = [context.config.width, context.config.height];

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(3),
            ],
            label: Some("bloom_bind_group_layout"),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Bloom Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("bloom.wgsl").into()),
        });
        let threshold_pipeline =
            mk_fullscreen_pipeline(device, &pipeline_layout, &shader, "fs_threshold", HDR_FORMAT);
        let blur_pipeline =
            mk_fullscreen_pipeline(device, &pipeline_layout, &shader, "fs_blur", HDR_FORMAT);
        let composite_pipeline = mk_fullscreen_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "fs_composite",
            context.config.format,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let params = ParamBuffers::new(device);
        let targets = Targets::new(device, &layout, &sampler, &params, size);

        Self {
            passes: Vec::new(),
            layout,
            sampler,
            threshold_pipeline,
            blur_pipeline,
            composite_pipeline,
            params,
            targets,
            size,
        }
    }

    /// The standard chain: scene, bloom, output.
    pub fn with_bloom(context: &mut Context, settings: BloomSettings) -> Self {
        let mut composer = Self::new(context);
        composer.add_pass(Pass::Render);
        composer.add_pass(Pass::Bloom(settings));
        composer.add_pass(Pass::Output);
        composer
    }

    fn bloom_settings(&self) -> Option<BloomSettings> {
        self.passes.iter().find_map(|p| match p {
            Pass::Bloom(settings) => Some(*settings),
            _ => None,
        })
    }

    fn write_params(&self, queue: &wgpu::Queue) {
        let [threshold, blur_h, blur_v, composite] =
            frame_params(self.bloom_settings(), self.size);
        queue.write_buffer(&self.params.threshold, 0, bytemuck::cast_slice(&[threshold]));
        queue.write_buffer(&self.params.blur_h, 0, bytemuck::cast_slice(&[blur_h]));
        queue.write_buffer(&self.params.blur_v, 0, bytemuck::cast_slice(&[blur_v]));
        queue.write_buffer(&self.params.composite, 0, bytemuck::cast_slice(&[composite]));
    }

    fn encode_bloom(&self, encoder: &mut wgpu::CommandEncoder) {
        fullscreen_pass(
            encoder,
            "bloom threshold",
            &self.threshold_pipeline,
            &self.targets.threshold,
            &self.targets.bright.view,
        );
        fullscreen_pass(
            encoder,
            "bloom horizontal blur",
            &self.blur_pipeline,
            &self.targets.blur_h,
            &self.targets.ping.view,
        );
        fullscreen_pass(
            encoder,
            "bloom vertical blur",
            &self.blur_pipeline,
            &self.targets.blur_v,
            &self.targets.bright.view,
        );
    }
}

impl PostProcessChain<Context> for EffectComposer {
    /// Appends `pass`. A second bloom stage replaces the first one's settings.
    fn add_pass(&mut self, pass: Pass) {
        if let Pass::Bloom(settings) = pass {
            if let Some(existing) = self.passes.iter_mut().find(|p| matches!(p, Pass::Bloom(_))) {
                log::warn!("bloom pass already present, replacing its settings");
                *existing = Pass::Bloom(settings);
                return;
            }
        }
        self.passes.push(pass);
    }

    fn passes(&self) -> &[Pass] {
        &self.passes
    }

    fn render(
        &mut self,
        backend: &mut Context,
        scene: &SceneGraph,
        camera: &CameraState,
    ) -> Result<(), RenderError> {
        if !backend.is_surface_configured() {
            return Ok(());
        }
        backend.prepare(scene, camera);
        self.write_params(&backend.queue);

        let frame = backend.acquire_frame()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = backend
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Composer Encoder"),
            });
        for pass in &self.passes {
            match pass {
                Pass::Render => backend.encode_scene(
                    &mut encoder,
                    &self.targets.hdr.view,
                    HDR_FORMAT,
                    scene,
                    camera.camera.position,
                ),
                Pass::Bloom(_) => self.encode_bloom(&mut encoder),
                Pass::Output => fullscreen_pass(
                    &mut encoder,
                    "bloom composite",
                    &self.composite_pipeline,
                    &self.targets.composite,
                    &view,
                ),
            }
        }
        backend.queue.submit(std::iter::once(encoder.finish()));
        backend.window.pre_present_notify();
        frame.present();
        Ok(())
    }

    fn resize(&mut self, backend: &Context, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = [width, height];
        self.targets = Targets::new(
            &backend.device,
            &self.layout,
            &self.sampler,
            &self.params,
            self.size,
        );
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn mk_fullscreen_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        ..Default::default()
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_without_bloom_add_nothing() {
        let params = frame_params(None, [800, 600]);
        assert!(params.iter().all(|p| p.strength == 0.0));
    }

    #[test]
    fn blur_steps_follow_half_resolution_and_radius() {
        let settings = BloomSettings {
            strength: 1.5,
            radius: 0.0,
            threshold: 0.9,
        };
        let [threshold, blur_h, blur_v, composite] = frame_params(Some(settings), [800, 600]);
        assert_eq!(threshold.threshold, 0.9);
        assert_eq!(blur_h.texel_dir, [1.0 / 400.0, 0.0]);
        assert_eq!(blur_v.texel_dir, [0.0, 1.0 / 300.0]);
        assert_eq!(composite.strength, 1.5);
    }

    #[test]
    fn tiny_targets_never_collapse_to_zero() {
        assert_eq!(half_size([1, 1]), [1, 1]);
    }
}
