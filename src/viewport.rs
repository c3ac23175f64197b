//! Viewport resize handling.

use crate::{
    camera::CameraState,
    render::{PostProcessChain, RenderBackend},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Remembers the last applied size so repeated notifications are no-ops.
#[derive(Debug)]
pub struct Viewport {
    size: ViewportSize,
    /// The backend was told the surface collapsed and is not presenting.
    collapsed: bool,
}

impl Viewport {
    /// A viewport whose targets were already created at `size`.
    pub fn new(size: ViewportSize) -> Self {
        Self {
            size,
            collapsed: false,
        }
    }

    /// Last non-empty size.
    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Apply a new size to the projection, the backend and every chain pass.
    ///
    /// An empty size (a minimized window) is forwarded to the backend once so
    /// it stops presenting, but the stored size, the projection and the chain
    /// targets are kept. Returns whether the backend was reconfigured at a
    /// drawable size.
    pub fn resize<B: RenderBackend>(
        &mut self,
        size: ViewportSize,
        camera: &mut CameraState,
        backend: &mut B,
        chain: Option<&mut (dyn PostProcessChain<B> + 'static)>,
    ) -> bool {
        if size.is_empty() {
            if !self.collapsed {
                log::debug!("viewport collapsed to {}x{}", size.width, size.height);
                self.collapsed = true;
                backend.resize(size.width, size.height);
            }
            return false;
        }
        if size == self.size && !self.collapsed {
            log::debug!("viewport already {}x{}", size.width, size.height);
            return false;
        }
        self.collapsed = false;
        backend.resize(size.width, size.height);
        if size == self.size {
            return true;
        }
        self.size = size;
        camera.projection.resize(size.width, size.height);
        if let Some(chain) = chain {
            chain.resize(backend, size.width, size.height);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CameraSettings, data_structures::scene_graph::SceneGraph, error::RenderError,
        render::Pass,
    };

    #[derive(Default)]
    struct ResizeLog {
        sizes: Vec<(u32, u32)>,
    }

    impl RenderBackend for ResizeLog {
        fn render(&mut self, _: &SceneGraph, _: &CameraState) -> Result<(), RenderError> {
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.sizes.push((width, height));
        }
    }

    #[derive(Default)]
    struct ChainLog {
        sizes: Vec<(u32, u32)>,
    }

    impl PostProcessChain<ResizeLog> for ChainLog {
        fn add_pass(&mut self, _: Pass) {}

        fn passes(&self) -> &[Pass] {
            &[]
        }

        fn render(&mut self, _: &mut ResizeLog, _: &SceneGraph, _: &CameraState) -> Result<(), RenderError> {
            Ok(())
        }

        fn resize(&mut self, _: &ResizeLog, width: u32, height: u32) {
            self.sizes.push((width, height));
        }
    }

    #[test]
    fn repeated_identical_size_resizes_once() {
        let mut viewport = Viewport::new(ViewportSize::new(800, 600));
        let mut camera = CameraState::new(&CameraSettings::default(), 800, 600);
        let mut backend = ResizeLog::default();
        let mut chain = ChainLog::default();

        for _ in 0..3 {
            viewport.resize(ViewportSize::new(1024, 768), &mut camera, &mut backend, Some(&mut chain));
        }
        assert_eq!(backend.sizes, vec![(1024, 768)]);
        assert_eq!(chain.sizes, vec![(1024, 768)]);
        assert!((camera.projection.aspect() - 1024.0 / 768.0).abs() < 1e-6);
    }

    #[test]
    fn initial_size_is_already_applied() {
        let mut viewport = Viewport::new(ViewportSize::new(800, 600));
        let mut camera = CameraState::new(&CameraSettings::default(), 800, 600);
        let mut backend = ResizeLog::default();
        assert!(!viewport.resize(ViewportSize::new(800, 600), &mut camera, &mut backend, None));
        assert!(backend.sizes.is_empty());
    }

    #[test]
    fn collapse_is_forwarded_once_and_keeps_targets() {
        let mut viewport = Viewport::new(ViewportSize::new(800, 600));
        let mut camera = CameraState::new(&CameraSettings::default(), 800, 600);
        let mut backend = ResizeLog::default();
        let mut chain = ChainLog::default();
        assert!(!viewport.resize(ViewportSize::new(0, 600), &mut camera, &mut backend, Some(&mut chain)));
        assert!(!viewport.resize(ViewportSize::new(0, 0), &mut camera, &mut backend, Some(&mut chain)));
        assert_eq!(viewport.size(), ViewportSize::new(800, 600));
        assert!(viewport.is_collapsed());
        assert_eq!(backend.sizes, vec![(0, 600)]);
        assert!(chain.sizes.is_empty());
    }

    #[test]
    fn restoring_the_previous_size_reconfigures_the_backend_only() {
        let mut viewport = Viewport::new(ViewportSize::new(800, 600));
        let mut camera = CameraState::new(&CameraSettings::default(), 800, 600);
        let mut backend = ResizeLog::default();
        let mut chain = ChainLog::default();
        viewport.resize(ViewportSize::new(0, 0), &mut camera, &mut backend, Some(&mut chain));
        assert!(viewport.resize(ViewportSize::new(800, 600), &mut camera, &mut backend, Some(&mut chain)));
        assert!(!viewport.resize(ViewportSize::new(800, 600), &mut camera, &mut backend, Some(&mut chain)));
        assert_eq!(backend.sizes, vec![(0, 0), (800, 600)]);
        assert!(chain.sizes.is_empty());
        assert!(!viewport.is_collapsed());
    }
}
