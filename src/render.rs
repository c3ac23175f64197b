//! Render loop and the seams to the rendering backend.
//!
//! The loop does not know anything about GPUs. It drives a [`RenderBackend`]
//! directly, or through a [`PostProcessChain`] that wraps the backend's render
//! call with extra passes.
//!
//! # Key types
//!
//! - [`RenderBackend`] submits one frame of the scene as seen from a camera
//! - [`PostProcessChain`] is an ordered list of [`Pass`]es decorating the backend
//! - [`RenderLoop`] is the `NotStarted -> Running` state machine ticked once per frame

use crate::{
    camera::CameraState, config::BloomSettings, data_structures::scene_graph::SceneGraph,
    error::RenderError,
};

/// Submits frames and owns the GPU resources behind them.
pub trait RenderBackend {
    /// Draw `scene` from `camera` into the presentable surface.
    fn render(&mut self, scene: &SceneGraph, camera: &CameraState) -> Result<(), RenderError>;

    /// Resize the surface and every size-dependent target.
    fn resize(&mut self, width: u32, height: u32);
}

/// A stage of a post-processing chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pass {
    /// Draw the scene into the chain's HDR target.
    Render,
    /// Bright-pass, blur and add back.
    Bloom(BloomSettings),
    /// Tonemap and write to the backend's surface.
    Output,
}

/// Decorates the backend's render call with additional passes.
pub trait PostProcessChain<B: RenderBackend> {
    fn add_pass(&mut self, pass: Pass);

    fn passes(&self) -> &[Pass];

    fn render(
        &mut self,
        backend: &mut B,
        scene: &SceneGraph,
        camera: &CameraState,
    ) -> Result<(), RenderError>;

    /// Resize every pass target.
    fn resize(&mut self, backend: &B, width: u32, height: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running,
}

/// Per-frame driver: advance camera damping, then submit one frame.
#[derive(Debug)]
pub struct RenderLoop {
    state: LoopState,
    frames: u64,
    failed_frames: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::NotStarted,
            frames: 0,
            failed_frames: 0,
        }
    }

    /// Enter `Running`. There is no way back.
    pub fn start(&mut self) {
        match self.state {
            LoopState::NotStarted => {
                log::info!("render loop running");
                self.state = LoopState::Running;
            }
            LoopState::Running => log::warn!("render loop already running"),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Frames submitted, including the failed ones.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn failed_frames(&self) -> u64 {
        self.failed_frames
    }

    /// Run one frame against whatever the scene contains right now.
    ///
    /// A failed frame is logged and returned to the caller; the loop itself
    /// stays `Running`.
    pub fn tick<B: RenderBackend>(
        &mut self,
        camera: &mut CameraState,
        scene: &SceneGraph,
        backend: &mut B,
        chain: Option<&mut (dyn PostProcessChain<B> + 'static)>,
    ) -> Result<(), RenderError> {
        if self.state == LoopState::NotStarted {
            log::debug!("tick before the render loop was started");
            return Ok(());
        }
        camera.update();
        self.frames += 1;
        let result = match chain {
            Some(chain) => chain.render(backend, scene, camera),
            None => backend.render(scene, camera),
        };
        if let Err(e) = &result {
            self.failed_frames += 1;
            log::error!("Unable to render frame {}: {}", self.frames, e);
        }
        result
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}
