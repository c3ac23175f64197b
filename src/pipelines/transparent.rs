use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::basic::{mk_render_pipeline, scene_shader},
};

/// Alpha-blended variant of the scene pipeline.
///
/// Depth is tested but not written, so translucent meshes drawn back to front
/// after the opaque pass blend over each other.
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    mk_render_pipeline(
        device,
        layout,
        color_format,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        false,
        &[ModelVertex::desc(), InstanceRaw::desc()],
        scene_shader(),
    )
}
