//! Render pipelines and their uniforms.
//!
//! - `basic` builds the lit scene pipeline and the material bind group layout
//! - `transparent` is the alpha-blended variant for translucent materials
//! - `lights` packs the ambient term and point lights into one uniform
//! - `bloom` is the post-processing chain of the wgpu backend

pub mod basic;
pub mod bloom;
pub mod lights;
pub mod transparent;
