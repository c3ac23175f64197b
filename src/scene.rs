//! Scene composition.
//!
//! [`SceneComposer`] owns the scene graph, the interaction registry, the
//! camera, the viewport and the render loop. Bundle loads run elsewhere and
//! report back through [`BundleEvent`]s, which are applied here one at a time
//! on the thread that also ticks the render loop. There is no barrier waiting
//! for all bundles: every tick renders whatever has been applied so far.
//!
//! # Lifecycle of a bundle
//!
//! 1. `Pending` once the manifest is read
//! 2. `Loading` after [`SceneComposer::begin_loading`] handed it out
//! 3. `Loaded` or `Failed` when its completion event arrives
//!
//! A loaded bundle is normalized before anything is added to the scene, then
//! contributes its node, its lights and (if configured) a hitbox with an
//! emissive toggle.

use crate::{
    camera::CameraState,
    config::{BundleDecl, SceneManifest},
    data_structures::{
        model::MaterialDesc,
        scene_graph::{MaterialId, Node, NodeId, SceneGraph},
    },
    error::{BundleLoadError, InteractionError, RenderError},
    interaction::{Action, EmissiveToggle, InteractionRegistry},
    lights::derive_lights,
    normalize::normalize,
    pick,
    render::{PostProcessChain, RenderBackend, RenderLoop},
    resources::{BundleEvent, LoadedBundle},
    viewport::{Viewport, ViewportSize},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleState {
    Pending,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug)]
struct BundleSlot {
    decl: BundleDecl,
    state: BundleState,
    node: Option<NodeId>,
    hitbox: Option<NodeId>,
    error: Option<BundleLoadError>,
}

pub struct SceneComposer<B: RenderBackend> {
    bundles: Vec<BundleSlot>,
    scene: SceneGraph,
    registry: InteractionRegistry,
    camera: CameraState,
    viewport: Viewport,
    render_loop: RenderLoop,
    backend: B,
    chain: Option<Box<dyn PostProcessChain<B>>>,
}

impl<B: RenderBackend> SceneComposer<B> {
    /// Build the empty scene and start the render loop.
    ///
    /// `backend` must already be sized to `size`.
    pub fn new(manifest: &SceneManifest, backend: B, size: ViewportSize) -> Self {
        let bundles = manifest
            .bundles
            .iter()
            .map(|decl| BundleSlot {
                decl: decl.clone(),
                state: BundleState::Pending,
                node: None,
                hitbox: None,
                error: None,
            })
            .collect();
        let mut render_loop = RenderLoop::new();
        render_loop.start();
        Self {
            bundles,
            scene: SceneGraph::new(manifest.ambient),
            registry: InteractionRegistry::new(),
            camera: CameraState::new(&manifest.camera, size.width, size.height),
            viewport: Viewport::new(size),
            render_loop,
            backend,
            chain: None,
        }
    }

    /// Route every following frame through `chain`.
    pub fn attach_chain(&mut self, chain: Box<dyn PostProcessChain<B>>) {
        if self.chain.is_some() {
            log::warn!("replacing the attached post-processing chain");
        }
        self.chain = Some(chain);
    }

    /// Mark every pending bundle as loading and return what to load.
    ///
    /// Calling it again returns nothing; loads are issued once.
    pub fn begin_loading(&mut self) -> Vec<BundleDecl> {
        self.bundles
            .iter_mut()
            .filter(|slot| slot.state == BundleState::Pending)
            .map(|slot| {
                slot.state = BundleState::Loading;
                log::info!("loading bundle {}", slot.decl.name);
                slot.decl.clone()
            })
            .collect()
    }

    /// Apply one completion message.
    ///
    /// Returns `false` when the event was ignored: unknown bundle, or a bundle
    /// that is not currently loading (duplicate or late message).
    pub fn on_bundle_event(&mut self, event: BundleEvent) -> bool {
        let idx = match self.bundles.iter().position(|s| s.decl.name == event.name()) {
            Some(idx) => idx,
            None => {
                log::warn!("completion for undeclared bundle {} ignored", event.name());
                return false;
            }
        };
        if self.bundles[idx].state != BundleState::Loading {
            log::warn!(
                "completion for bundle {} in state {:?} ignored",
                event.name(),
                self.bundles[idx].state
            );
            return false;
        }

        let outcome = match event {
            BundleEvent::Loaded(bundle) => self.place(idx, bundle),
            BundleEvent::Failed { error, .. } => Err(error),
        };
        let slot = &mut self.bundles[idx];
        match outcome {
            Ok(()) => {
                slot.state = BundleState::Loaded;
                log::info!("bundle {} loaded", slot.decl.name);
            }
            Err(error) => {
                log::error!("bundle {} failed: {}", slot.decl.name, error);
                slot.state = BundleState::Failed;
                slot.error = Some(error);
            }
        }
        true
    }

    /// Normalize, then add the bundle's node, lights and hitbox.
    ///
    /// Everything that can fail runs before the first scene mutation.
    fn place(&mut self, idx: usize, bundle: LoadedBundle) -> Result<(), BundleLoadError> {
        let decl = &self.bundles[idx].decl;
        let mut node = Node::new(&decl.name, bundle.geometry);
        let bounds = normalize(&mut node, &decl.placement()).ok_or_else(|| {
            BundleLoadError::EmptyGeometry {
                path: decl.geometry_path(),
            }
        })?;

        let mut materials = bundle.materials.materials;
        if materials.is_empty() {
            materials.push(MaterialDesc {
                name: format!("{}-default", decl.name),
                ..Default::default()
            });
        }
        let toggled = decl.interaction.as_ref().map(|interaction| {
            let position = match &interaction.material {
                Some(name) => materials.iter().position(|m| &m.name == name).unwrap_or_else(|| {
                    log::warn!(
                        "bundle {} has no material {name}, toggling its first material",
                        decl.name
                    );
                    0
                }),
                None => 0,
            };
            (position, interaction.unlit)
        });
        let rig = decl.lights.clone();
        let name = decl.name.clone();

        let ids: Vec<MaterialId> = materials
            .into_iter()
            .map(|m| self.scene.add_material(m))
            .collect();
        node.materials = node
            .geometry
            .meshes
            .iter()
            .map(|mesh| mesh.material.and_then(|i| ids.get(i).copied()).unwrap_or(ids[0]))
            .collect();
        let node_id = self.scene.add_node(node);
        self.bundles[idx].node = Some(node_id);

        if let Some(rig) = rig {
            for light in derive_lights(&name, &bounds, &rig) {
                self.scene.add_light(light);
            }
        }

        if let Some((position, unlit)) = toggled {
            let hitbox = self.scene.add_node(Node::hitbox(&name, &bounds));
            self.bundles[idx].hitbox = Some(hitbox);
            match EmissiveToggle::capture(&self.scene, ids[position], unlit) {
                Some(toggle) => {
                    if let Err(e) =
                        self.registry
                            .register(&self.scene, hitbox, Action::ToggleEmissive(toggle))
                    {
                        log::error!("could not make bundle {name} clickable: {e}");
                    }
                }
                None => log::error!("material of bundle {name} vanished before registration"),
            }
        }
        Ok(())
    }

    /// Run one frame. A lost surface is reconfigured at the current size.
    pub fn tick(&mut self) -> Result<(), RenderError> {
        let result = self.render_loop.tick(
            &mut self.camera,
            &self.scene,
            &mut self.backend,
            self.chain.as_deref_mut(),
        );
        if matches!(result, Err(RenderError::SurfaceLost)) && !self.viewport.is_collapsed() {
            let size = self.viewport.size();
            log::warn!("surface lost, reconfiguring at {}x{}", size.width, size.height);
            self.backend.resize(size.width, size.height);
        }
        result
    }

    /// Returns whether the backend was reconfigured at a drawable size.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        self.viewport.resize(
            ViewportSize::new(width, height),
            &mut self.camera,
            &mut self.backend,
            self.chain.as_deref_mut(),
        )
    }

    /// Pick at a pointer position and run the hit node's action.
    pub fn click(&mut self, x: f32, y: f32) -> Option<NodeId> {
        pick::dispatch_click(
            x,
            y,
            self.viewport.size(),
            &self.camera,
            &mut self.scene,
            &mut self.registry,
        )
    }

    /// Make an existing node clickable with a host-supplied action.
    pub fn register_action(&mut self, node: NodeId, action: Action) -> Result<(), InteractionError> {
        self.registry.register(&self.scene, node, action)
    }

    /// Queue an orbit from a drag of `(dx, dy)` pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.camera
            .controls
            .rotate(dx, dy, self.viewport.size().height);
    }

    pub fn zoom(&mut self, steps: f32) {
        self.camera.controls.zoom(steps);
    }

    pub fn bundle_state(&self, name: &str) -> Option<BundleState> {
        self.slot(name).map(|s| s.state)
    }

    pub fn bundle_error(&self, name: &str) -> Option<&BundleLoadError> {
        self.slot(name).and_then(|s| s.error.as_ref())
    }

    /// Names of loaded bundles in declaration order.
    pub fn loaded_bundles(&self) -> impl Iterator<Item = &str> {
        self.bundles
            .iter()
            .filter(|s| s.state == BundleState::Loaded)
            .map(|s| s.decl.name.as_str())
    }

    pub fn node_of(&self, name: &str) -> Option<NodeId> {
        self.slot(name).and_then(|s| s.node)
    }

    pub fn hitbox_of(&self, name: &str) -> Option<NodeId> {
        self.slot(name).and_then(|s| s.hitbox)
    }

    fn slot(&self, name: &str) -> Option<&BundleSlot> {
        self.bundles.iter().find(|s| s.decl.name == name)
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn registry(&self) -> &InteractionRegistry {
        &self.registry
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn viewport_size(&self) -> ViewportSize {
        self.viewport.size()
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
