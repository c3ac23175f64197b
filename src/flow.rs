//! Host lifecycle and the application event loop.
//!
//! [`run`] opens a window (or attaches to the `canvas` element on the web),
//! creates the wgpu [`Context`] and hands it to a [`SceneComposer`]. Every
//! bundle of the manifest is then loaded as its own task; tasks report back
//! with an [`EngineEvent::Bundle`] through the event loop proxy, so the scene
//! is only ever mutated on the event loop thread.
//!
//! Input routing:
//!
//! - left click picks
//! - right drag orbits the camera
//! - the mouse wheel zooms
//! - resize events reconfigure the viewport

use std::sync::Arc;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::{BundleDecl, SceneManifest},
    context::Context,
    pipelines::bloom::EffectComposer,
    resources::{BundleEvent, ObjLoader, load_bundle},
    scene::SceneComposer,
    viewport::ViewportSize,
};

/// Pixels of wheel travel that count as one zoom step.
const PIXELS_PER_ZOOM_STEP: f32 = 40.0;

/// Messages delivered to the event loop from asynchronous tasks.
pub(crate) enum EngineEvent {
    /// The GPU context finished initialising (web only, native blocks on it).
    #[cfg(target_arch = "wasm32")]
    Initialized(Box<SceneComposer<Context>>),
    Bundle(BundleEvent),
}

impl std::fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            EngineEvent::Initialized(_) => f.write_str("Initialized"),
            EngineEvent::Bundle(event) => f.debug_tuple("Bundle").field(&event.name()).finish(),
        }
    }
}

/// Pointer input reduced to the gestures the scene understands.
#[derive(Debug, Default)]
struct PointerState {
    position: Option<PhysicalPosition<f64>>,
    orbiting: bool,
}

impl PointerState {
    /// Track the cursor. Returns the drag delta while orbiting.
    fn moved(&mut self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
        let delta = match (self.orbiting, self.position) {
            (true, Some(last)) => Some(((position.x - last.x) as f32, (position.y - last.y) as f32)),
            _ => None,
        };
        self.position = Some(position);
        delta
    }

    fn left(&mut self) {
        self.position = None;
        self.orbiting = false;
    }

    /// Returns the click position for a left press over the surface.
    fn button(&mut self, button: MouseButton, state: ElementState) -> Option<(f32, f32)> {
        match button {
            MouseButton::Right => {
                self.orbiting = state == ElementState::Pressed;
                None
            }
            MouseButton::Left if state == ElementState::Pressed => {
                self.position.map(|p| (p.x as f32, p.y as f32))
            }
            _ => None,
        }
    }
}

fn zoom_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_ZOOM_STEP,
    }
}

fn compose(manifest: &SceneManifest, mut context: Context) -> SceneComposer<Context> {
    let size = context.window.inner_size();
    let chain = manifest
        .bloom
        .map(|settings| EffectComposer::with_bloom(&mut context, settings));
    let mut composer =
        SceneComposer::new(manifest, context, ViewportSize::new(size.width, size.height));
    if let Some(chain) = chain {
        composer.attach_chain(Box::new(chain));
    }
    composer
}

pub(crate) struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<EngineEvent>,
    manifest: SceneManifest,
    loader: Arc<ObjLoader>,
    composer: Option<SceneComposer<Context>>,
    pointer: PointerState,
    load_started: Option<instant::Instant>,
    attached: bool,
}

impl App {
    fn new(event_loop: &EventLoop<EngineEvent>, manifest: SceneManifest) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            manifest,
            loader: Arc::new(ObjLoader),
            composer: None,
            pointer: PointerState::default(),
            load_started: None,
            attached: false,
        })
    }

    /// Start the render loop and fire off one load task per bundle.
    fn start(&mut self, mut composer: SceneComposer<Context>) {
        let decls = composer.begin_loading();
        log::info!("loading {} bundles", decls.len());
        self.load_started = Some(instant::Instant::now());
        for decl in decls {
            self.spawn_load(decl);
        }
        composer.backend().window.request_redraw();
        self.composer = Some(composer);
    }

    fn spawn_load(&self, decl: BundleDecl) {
        let loader = self.loader.clone();
        let proxy = self.proxy.clone();
        let task = async move {
            let event = load_bundle(loader.as_ref(), &decl).await;
            if proxy.send_event(EngineEvent::Bundle(event)).is_err() {
                log::warn!("event loop closed before bundle {} finished", decl.name);
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.async_runtime.spawn(task);
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(task);
        }
    }

    fn window_attributes() -> anyhow::Result<winit::window::WindowAttributes> {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("Café");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
            let document = window
                .document()
                .ok_or_else(|| anyhow::anyhow!("no document"))?;
            let canvas = document
                .get_element_by_id(CANVAS_ID)
                .ok_or_else(|| anyhow::anyhow!("no element with id {CANVAS_ID}"))?;
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        Ok(window_attributes)
    }
}

impl ApplicationHandler<EngineEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // The surface is attached once; later resumes keep the running scene.
        if self.attached {
            return;
        }
        self.attached = true;

        let window = match Self::window_attributes()
            .and_then(|attributes| Ok(event_loop.create_window(attributes)?))
        {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create the drawing surface: {e}");
                event_loop.exit();
                return;
            }
        };
        let clear_colour = self.manifest.clear_colour;

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self
                .async_runtime
                .block_on(Context::new(window, clear_colour))
            {
                Ok(context) => {
                    let composer = compose(&self.manifest, context);
                    self.start(composer);
                }
                Err(e) => {
                    log::error!("could not initialise the renderer: {e}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let manifest = self.manifest.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Context::new(window, clear_colour).await {
                    Ok(context) => {
                        let composer = compose(&manifest, context);
                        if proxy
                            .send_event(EngineEvent::Initialized(Box::new(composer)))
                            .is_err()
                        {
                            log::warn!("event loop closed before the renderer was ready");
                        }
                    }
                    Err(e) => log::error!("could not initialise the renderer: {e}"),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: EngineEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            #[cfg(target_arch = "wasm32")]
            EngineEvent::Initialized(composer) => self.start(*composer),
            EngineEvent::Bundle(event) => {
                let Some(composer) = self.composer.as_mut() else {
                    log::warn!("bundle {} finished before the scene existed", event.name());
                    return;
                };
                let name = event.name().to_string();
                if composer.on_bundle_event(event) {
                    if let Some(started) = self.load_started {
                        log::info!("bundle {name} settled after {:?}", started.elapsed());
                    }
                }
                composer.backend().window.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(composer) = self.composer.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                composer.resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((dx, dy)) = self.pointer.moved(position) {
                    composer.orbit(dx, dy);
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some((x, y)) = self.pointer.button(button, state) {
                    if let Some(node) = composer.click(x, y) {
                        log::debug!("clicked {node:?}");
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => composer.zoom(zoom_steps(delta)),
            WindowEvent::RedrawRequested => {
                if let Err(e) = composer.tick() {
                    log::debug!("frame skipped: {e}");
                }
                composer.backend().window.request_redraw();
            }
            _ => {}
        }
    }
}

/// Open the café scene and run until the window closes.
pub fn run(manifest: SceneManifest) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }

    manifest.validate()?;

    let event_loop: EventLoop<EngineEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, manifest)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run(SceneManifest::cafe()).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> PhysicalPosition<f64> {
        PhysicalPosition::new(x, y)
    }

    #[test]
    fn right_drag_reports_deltas() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.moved(at(10.0, 10.0)), None);
        assert_eq!(pointer.button(MouseButton::Right, ElementState::Pressed), None);
        assert_eq!(pointer.moved(at(14.0, 7.0)), Some((4.0, -3.0)));
        pointer.button(MouseButton::Right, ElementState::Released);
        assert_eq!(pointer.moved(at(20.0, 7.0)), None);
    }

    #[test]
    fn left_press_clicks_at_the_cursor() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.button(MouseButton::Left, ElementState::Pressed), None);
        pointer.moved(at(320.0, 240.0));
        assert_eq!(
            pointer.button(MouseButton::Left, ElementState::Pressed),
            Some((320.0, 240.0))
        );
        assert_eq!(pointer.button(MouseButton::Left, ElementState::Released), None);
    }

    #[test]
    fn leaving_the_surface_stops_orbiting() {
        let mut pointer = PointerState::default();
        pointer.moved(at(1.0, 1.0));
        pointer.button(MouseButton::Right, ElementState::Pressed);
        pointer.left();
        pointer.moved(at(5.0, 5.0));
        assert_eq!(pointer.moved(at(9.0, 9.0)), None);
    }

    #[test]
    fn pixel_scrolls_are_scaled_to_steps() {
        assert_eq!(zoom_steps(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
        let pixels = MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 80.0));
        assert_eq!(zoom_steps(pixels), 2.0);
    }
}
