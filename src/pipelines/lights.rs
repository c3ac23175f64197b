use wgpu::util::DeviceExt;

use crate::data_structures::scene_graph::SceneGraph;

/// Point lights beyond this count are not shaded.
pub const MAX_LIGHTS: usize = 8;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    position: [f32; 3],
    range: f32,
    color: [f32; 3],
    intensity: f32,
}

/// Ambient term plus up to [`MAX_LIGHTS`] point lights, matching `scene.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    /// Ambient colour in rgb, intensity in w.
    ambient: [f32; 4],
    /// Number of active lights in x; uniforms need 16 byte spacing.
    count: [u32; 4],
    lights: [PointLightRaw; MAX_LIGHTS],
}

impl LightsUniform {
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let [r, g, b] = scene.ambient.color;
        let mut lights = [PointLightRaw::default(); MAX_LIGHTS];
        let active = scene.lights().len().min(MAX_LIGHTS);
        for (raw, light) in lights.iter_mut().zip(scene.lights()) {
            *raw = PointLightRaw {
                position: light.position.into(),
                range: light.range,
                color: light.color,
                intensity: light.intensity,
            };
        }
        Self {
            ambient: [r, g, b, scene.ambient.intensity],
            count: [active as u32, 0, 0, 0],
            lights,
        }
    }

    pub fn active(&self) -> usize {
        self.count[0] as usize
    }
}

pub struct LightResources {
    pub uniform: LightsUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    warned_overflow: bool,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, scene: &SceneGraph) -> Self {
        let uniform = LightsUniform::from_scene(scene);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("lights_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("lights_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            warned_overflow: false,
        }
    }

    /// Upload the scene's lights if they changed since the last frame.
    pub fn update(&mut self, queue: &wgpu::Queue, scene: &SceneGraph) {
        let uniform = LightsUniform::from_scene(scene);
        if uniform == self.uniform {
            return;
        }
        if scene.lights().len() > MAX_LIGHTS && !self.warned_overflow {
            log::warn!(
                "scene has {} lights, only the first {MAX_LIGHTS} are shaded",
                scene.lights().len()
            );
            self.warned_overflow = true;
        }
        self.uniform = uniform;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
