//! CPU-side geometry and material descriptions.
//!
//! The loader produces these as plain owned data so that a finished bundle can
//! travel from a loading task to the event-loop thread. GPU buffers are made
//! from them later by the rendering backend.

use std::sync::Arc;

use cgmath::Vector3;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// One triangulated, single-indexed mesh of a geometry file.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    /// Index into the bundle's [`MaterialSet`].
    pub material: Option<usize>,
}

/// All meshes of one geometry file, shared between the scene and the GPU cache.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub meshes: Vec<MeshData>,
}

impl Geometry {
    pub fn new(meshes: Vec<MeshData>) -> Arc<Self> {
        Arc::new(Self { meshes })
    }

    pub fn positions(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.meshes
            .iter()
            .flat_map(|m| m.vertices.iter())
            .map(|v| Vector3::from(v.position))
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    /// An axis-aligned box with the given extents, centered on the origin.
    ///
    /// Used as an invisible collision proxy for picking.
    pub fn cuboid(size: Vector3<f32>) -> Arc<Self> {
        let h = size * 0.5;
        let corners = [
            [-h.x, -h.y, -h.z],
            [h.x, -h.y, -h.z],
            [h.x, h.y, -h.z],
            [-h.x, h.y, -h.z],
            [-h.x, -h.y, h.z],
            [h.x, -h.y, h.z],
            [h.x, h.y, h.z],
            [-h.x, h.y, h.z],
        ];
        let vertices = corners
            .iter()
            .map(|&position| ModelVertex {
                position,
                tex_coords: [0.0, 0.0],
                normal: [0.0, 1.0, 0.0],
            })
            .collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // back
            4, 5, 6, 4, 6, 7, // front
            0, 1, 5, 0, 5, 4, // bottom
            3, 7, 6, 3, 6, 2, // top
            0, 4, 7, 0, 7, 3, // left
            1, 2, 6, 1, 6, 5, // right
        ];
        Self::new(vec![MeshData {
            name: "hitbox".to_string(),
            vertices,
            indices,
            material: None,
        }])
    }
}

/// Decoded RGBA8 image ready for upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Emissive strength and opacity of a material: the part an interaction toggles.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Appearance {
    pub emissive_intensity: f32,
    pub opacity: f32,
}

#[derive(Clone, Debug)]
pub struct MaterialDesc {
    pub name: String,
    pub diffuse: [f32; 3],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub opacity: f32,
    pub diffuse_texture: Option<Arc<TextureData>>,
}

impl MaterialDesc {
    pub fn appearance(&self) -> Appearance {
        Appearance {
            emissive_intensity: self.emissive_intensity,
            opacity: self.opacity,
        }
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        self.emissive_intensity = appearance.emissive_intensity;
        self.opacity = appearance.opacity;
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse: [0.8, 0.8, 0.8],
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            opacity: 1.0,
            diffuse_texture: None,
        }
    }
}

/// The resolved materials of one bundle, in MTL declaration order.
///
/// `source` keeps the raw MTL text so the geometry stage can resolve
/// `usemtl` names to the same indices.
#[derive(Clone, Debug, Default)]
pub struct MaterialSet {
    pub source: String,
    pub materials: Vec<MaterialDesc>,
}

impl MaterialSet {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }
}
