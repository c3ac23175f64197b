//! The wgpu rendering backend.
//!
//! [`Context`] owns the surface, device and every GPU resource derived from
//! the [`SceneGraph`]. Nodes and materials are uploaded lazily the first frame
//! they appear; material uniforms are rewritten whenever an interaction
//! changes their appearance.

use std::{collections::HashMap, sync::Arc};

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{CameraState, CameraUniform},
    data_structures::{
        instance::Instance,
        model::MaterialDesc,
        scene_graph::{NodeId, SceneGraph},
        texture::{self, Texture},
    },
    error::RenderError,
    pipelines::{
        basic::{self, MaterialUniform},
        lights::LightResources,
        transparent,
    },
    render::RenderBackend,
};

pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

struct ScenePipelines {
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
}

struct GpuMesh {
    /// Index into the node geometry's meshes.
    mesh: usize,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
}

struct GpuNode {
    meshes: Vec<GpuMesh>,
    instance_buffer: wgpu::Buffer,
    transform: Instance,
    /// World-space center, used to sort translucent draws.
    center: Vector3<f32>,
}

struct GpuMaterial {
    uniform: MaterialUniform,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct DrawCall<'a> {
    node: &'a GpuNode,
    mesh: &'a GpuMesh,
    material: &'a GpuMaterial,
}

impl DrawCall<'_> {
    fn draw(&self, pass: &mut wgpu::RenderPass) {
        pass.set_bind_group(0, &self.material.bind_group, &[]);
        pass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.node.instance_buffer.slice(..));
        pass.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.mesh.num_elements, 0, 0..1);
    }
}

pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub clear_colour: wgpu::Color,
    pub camera: CameraResources,
    pub lights: LightResources,
    material_layout: wgpu::BindGroupLayout,
    scene_layout: wgpu::PipelineLayout,
    pipelines: HashMap<wgpu::TextureFormat, ScenePipelines>,
    default_texture: Texture,
    sampler: wgpu::Sampler,
    nodes: HashMap<NodeId, GpuNode>,
    materials: Vec<GpuMaterial>,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, clear_colour: [f64; 4]) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders output linear colour and rely on an sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface is incompatible with the adapter"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        let camera = CameraResources {
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
            bind_group_layout: camera_bind_group_layout,
        };

        let lights = LightResources::new(&device, &SceneGraph::default());
        let material_layout = basic::material_layout(&device);
        let scene_layout = basic::scene_pipeline_layout(
            &device,
            &material_layout,
            &camera.bind_group_layout,
            &lights.bind_group_layout,
        );

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        let default_texture = Texture::create_default_white(&device, &queue);
        let sampler = texture::create_default_sampler(&device);
        let [r, g, b, a] = clear_colour;

        let mut context = Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            clear_colour: wgpu::Color { r, g, b, a },
            camera,
            lights,
            material_layout,
            scene_layout,
            pipelines: HashMap::new(),
            default_texture,
            sampler,
            nodes: HashMap::new(),
            materials: Vec::new(),
            is_surface_configured,
        };
        context.ensure_pipelines(surface_format);
        Ok(context)
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn is_surface_configured(&self) -> bool {
        self.is_surface_configured
    }

    /// Build the scene pipelines for a colour target format, once.
    pub(crate) fn ensure_pipelines(&mut self, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&format) {
            return;
        }
        log::debug!("creating scene pipelines for {format:?}");
        let pipelines = ScenePipelines {
            opaque: basic::mk_basic_pipeline(&self.device, &self.scene_layout, format),
            transparent: transparent::mk_transparent_pipeline(
                &self.device,
                &self.scene_layout,
                format,
            ),
        };
        self.pipelines.insert(format, pipelines);
    }

    /// Upload everything the next frame of `scene` needs.
    pub(crate) fn prepare(&mut self, scene: &SceneGraph, camera: &CameraState) {
        self.camera.uniform.update_view_proj(camera);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
        self.lights.update(&self.queue, scene);
        self.sync_materials(scene);
        self.sync_nodes(scene);
    }

    fn sync_materials(&mut self, scene: &SceneGraph) {
        for (idx, desc) in scene.materials().iter().enumerate() {
            let uniform = MaterialUniform::from_desc(desc);
            if idx < self.materials.len() {
                let gpu = &mut self.materials[idx];
                if gpu.uniform != uniform {
                    self.queue
                        .write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(&[uniform]));
                    gpu.uniform = uniform;
                }
            } else {
                let gpu = self.create_material(desc, uniform);
                self.materials.push(gpu);
            }
        }
    }

    fn create_material(&self, desc: &MaterialDesc, uniform: MaterialUniform) -> GpuMaterial {
        let uploaded = desc
            .diffuse_texture
            .as_ref()
            .map(|data| Texture::from_data(&self.device, &self.queue, data));
        let texture = uploaded.as_ref().unwrap_or(&self.default_texture);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} material", desc.name)),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some(&desc.name),
        });
        GpuMaterial {
            uniform,
            buffer,
            bind_group,
        }
    }

    fn sync_nodes(&mut self, scene: &SceneGraph) {
        self.nodes.retain(|id, _| scene.contains(*id));
        for (id, node) in scene.nodes() {
            if !node.visible {
                continue;
            }
            if let Some(gpu) = self.nodes.get_mut(&id) {
                if gpu.transform != node.transform {
                    self.queue.write_buffer(
                        &gpu.instance_buffer,
                        0,
                        bytemuck::cast_slice(&[node.transform.to_raw()]),
                    );
                    gpu.transform = node.transform;
                    gpu.center = node.bounds().map_or(node.transform.position, |b| b.center());
                }
                continue;
            }

            let meshes = node
                .geometry
                .meshes
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.indices.is_empty())
                .map(|(idx, m)| GpuMesh {
                    mesh: idx,
                    vertex_buffer: self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some(&format!("{}/{} Vertex Buffer", node.bundle, m.name)),
                            contents: bytemuck::cast_slice(&m.vertices),
                            usage: wgpu::BufferUsages::VERTEX,
                        },
                    ),
                    index_buffer: self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some(&format!("{}/{} Index Buffer", node.bundle, m.name)),
                            contents: bytemuck::cast_slice(&m.indices),
                            usage: wgpu::BufferUsages::INDEX,
                        },
                    ),
                    num_elements: m.indices.len() as u32,
                })
                .collect();
            let instance_buffer =
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Instance Buffer", node.bundle)),
                        contents: bytemuck::cast_slice(&[node.transform.to_raw()]),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
            log::debug!("uploaded node {id:?} of bundle {}", node.bundle);
            self.nodes.insert(
                id,
                GpuNode {
                    meshes,
                    instance_buffer,
                    transform: node.transform,
                    center: node.bounds().map_or(node.transform.position, |b| b.center()),
                },
            );
        }
    }

    pub(crate) fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture, RenderError> {
        self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => RenderError::SurfaceLost,
            other => RenderError::Backend(other.to_string()),
        })
    }

    /// Record the opaque then translucent draws of `scene` into `target`.
    ///
    /// [`prepare`](Self::prepare) must have run for this frame and
    /// [`ensure_pipelines`](Self::ensure_pipelines) for `format`.
    pub(crate) fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        scene: &SceneGraph,
        eye: Point3<f32>,
    ) {
        let Some(pipelines) = self.pipelines.get(&format) else {
            log::error!("no scene pipelines for {format:?}");
            return;
        };

        let mut opaque = Vec::new();
        let mut translucent = Vec::new();
        for (id, node) in scene.nodes() {
            if !node.visible {
                continue;
            }
            let Some(gpu_node) = self.nodes.get(&id) else {
                continue;
            };
            for mesh in &gpu_node.meshes {
                let material_id = node.material_for_mesh(mesh.mesh);
                let Some(material) = self.materials.get(material_id.0) else {
                    continue;
                };
                let call = DrawCall {
                    node: gpu_node,
                    mesh,
                    material,
                };
                if scene
                    .material(material_id)
                    .is_some_and(MaterialDesc::is_transparent)
                {
                    let distance = (gpu_node.center - eye.to_vec()).magnitude2();
                    translucent.push((distance, call));
                } else {
                    opaque.push(call);
                }
            }
        }
        translucent.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_bind_group(1, &self.camera.bind_group, &[]);
        pass.set_bind_group(2, &self.lights.bind_group, &[]);

        pass.set_pipeline(&pipelines.opaque);
        for call in &opaque {
            call.draw(&mut pass);
        }
        pass.set_pipeline(&pipelines.transparent);
        for (_, call) in &translucent {
            call.draw(&mut pass);
        }
    }
}

impl RenderBackend for Context {
    fn render(&mut self, scene: &SceneGraph, camera: &CameraState) -> Result<(), RenderError> {
        // We can't render unless the surface is configured
        if !self.is_surface_configured {
            return Ok(());
        }
        self.prepare(scene, camera);

        let output = self.acquire_frame()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.encode_scene(
            &mut encoder,
            &view,
            self.config.format,
            scene,
            camera.camera.position,
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            self.is_surface_configured = false;
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.is_surface_configured = true;
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }
}
