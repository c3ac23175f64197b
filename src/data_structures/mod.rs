//! Engine data structures: geometry, materials, textures, the scene graph,
//! and instances.
//!
//! - `bounds` holds axis-aligned bounding volumes and rays
//! - `model` contains mesh and material definitions shared by loader and renderer
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `instance` holds per-node transformation data and its GPU layout
//! - `scene_graph` is the flat node, material and light registry the renderer draws

pub mod bounds;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
