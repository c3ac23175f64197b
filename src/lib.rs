//! cafe-scene
//!
//! An explorable café interior composed at runtime from independently
//! authored OBJ/MTL bundles, rendered with wgpu on native and WASM.
//!
//! Bundles load concurrently and finish in any order. Each one is normalized
//! into the shared world frame as it arrives, lamps and signs derive their
//! point lights from their placed bounds, and the sign becomes clickable to
//! toggle its glow. The render loop runs from the first frame, whatever has
//! loaded so far.
//!
//! High-level modules
//! - `camera`: perspective camera, damped orbit controls and uniforms
//! - `config`: the scene manifest (bundles, placement, lights, interactions)
//! - `context`: wgpu backend owning device, queue and uploaded scene resources
//! - `data_structures`: geometry, materials, bounds and the scene graph
//! - `flow`: winit host lifecycle and event routing
//! - `i18n`: language selection interface of the surrounding page
//! - `interaction`: registry of pickable objects and their actions
//! - `lights`: point light derivation from fixture bounds
//! - `normalize`: table-driven placement of loaded bundles
//! - `pick`: screen-to-ray picking against registered hitboxes
//! - `pipelines`: scene, transparency and bloom pipelines
//! - `render`: render loop and the backend/post-processing seams
//! - `resources`: asynchronous bundle loading
//! - `scene`: the composer tying loading, placement and interaction together
//! - `viewport`: drawing surface size tracking

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod i18n;
pub mod interaction;
pub mod lights;
pub mod normalize;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod viewport;

pub use config::SceneManifest;
pub use flow::run;
pub use render::{PostProcessChain, RenderBackend};
pub use scene::SceneComposer;
