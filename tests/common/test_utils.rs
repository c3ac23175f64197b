#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use cafe_scene::{
    camera::CameraState,
    config::{BundleDecl, SceneManifest},
    data_structures::{
        model::{Geometry, MaterialDesc, MaterialSet, MeshData, ModelVertex},
        scene_graph::SceneGraph,
    },
    error::{BundleLoadError, RenderError},
    render::{Pass, PostProcessChain, RenderBackend},
    resources::{AssetLoader, BundleEvent, LoadFuture, load_bundle},
    scene::SceneComposer,
    viewport::ViewportSize,
};
use cgmath::{Vector3, Vector4};

/// What one submitted frame contained.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub nodes: usize,
    pub visible_nodes: usize,
    pub lights: usize,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub frames: Vec<FrameRecord>,
    pub resizes: Vec<(u32, u32)>,
}

impl RenderBackend for RecordingBackend {
    fn render(&mut self, scene: &SceneGraph, _: &CameraState) -> Result<(), RenderError> {
        self.frames.push(FrameRecord {
            nodes: scene.node_count(),
            visible_nodes: scene.nodes().filter(|(_, n)| n.visible).count(),
            lights: scene.lights().len(),
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.resizes.push((width, height));
    }
}

/// Shared counters, readable after the chain moved into the composer.
#[derive(Debug, Default)]
pub struct ChainLog {
    pub renders: usize,
    pub resizes: Vec<(u32, u32)>,
}

pub struct RecordingChain {
    passes: Vec<Pass>,
    pub log: Arc<Mutex<ChainLog>>,
}

impl RecordingChain {
    pub fn new() -> (Self, Arc<Mutex<ChainLog>>) {
        let log = Arc::new(Mutex::new(ChainLog::default()));
        (
            Self {
                passes: Vec::new(),
                log: log.clone(),
            },
            log,
        )
    }
}

impl PostProcessChain<RecordingBackend> for RecordingChain {
    fn add_pass(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    fn passes(&self) -> &[Pass] {
        &self.passes
    }

    fn render(
        &mut self,
        backend: &mut RecordingBackend,
        scene: &SceneGraph,
        camera: &CameraState,
    ) -> Result<(), RenderError> {
        self.log.lock().unwrap().renders += 1;
        backend.render(scene, camera)
    }

    fn resize(&mut self, _: &RecordingBackend, width: u32, height: u32) {
        self.log.lock().unwrap().resizes.push((width, height));
    }
}

/// Axis-aligned box spanning `min..max` in the bundle's own frame.
pub fn box_mesh(name: &str, min: [f32; 3], max: [f32; 3], material: Option<usize>) -> MeshData {
    let corners = (0..8)
        .map(|i| ModelVertex {
            position: [
                if i & 1 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 4 == 0 { min[2] } else { max[2] },
            ],
            tex_coords: [0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
        })
        .collect();
    let indices = vec![
        0, 1, 3, 0, 3, 2, 4, 6, 7, 4, 7, 5, 0, 4, 5, 0, 5, 1, 2, 3, 7, 2, 7, 6, 0, 2, 6, 0, 6, 4,
        1, 5, 7, 1, 7, 3,
    ];
    MeshData {
        name: name.to_string(),
        vertices: corners,
        indices,
        material,
    }
}

pub fn material(name: &str, emissive: [f32; 3]) -> MaterialDesc {
    MaterialDesc {
        name: name.to_string(),
        emissive,
        ..Default::default()
    }
}

/// Serves in-memory bundles by path; unknown paths fail like a 404.
#[derive(Default)]
pub struct MemoryLoader {
    materials: HashMap<String, MaterialSet>,
    geometry: HashMap<String, Arc<Geometry>>,
    pub requests: Mutex<Vec<String>>,
}

impl MemoryLoader {
    pub fn with_bundle(
        mut self,
        decl: &BundleDecl,
        materials: Vec<MaterialDesc>,
        geometry: Arc<Geometry>,
    ) -> Self {
        self.materials.insert(
            decl.material_path(),
            MaterialSet {
                source: String::new(),
                materials,
            },
        );
        self.geometry.insert(decl.geometry_path(), geometry);
        self
    }

    /// Off-center, differently sized stand-ins for the five café bundles.
    pub fn cafe(manifest: &SceneManifest) -> Self {
        let decl = |name: &str| manifest.bundle(name).unwrap();
        MemoryLoader::default()
            .with_bundle(
                decl("floor"),
                vec![material("tiles", [0.0; 3])],
                Geometry::new(vec![box_mesh("floor", [2.0, -0.3, 2.0], [14.0, -0.2, 14.0], Some(0))]),
            )
            .with_bundle(
                decl("cafe"),
                vec![material("plaster", [0.0; 3])],
                Geometry::new(vec![box_mesh("walls", [-5.0, 1.0, -4.0], [5.0, 4.2, 3.0], Some(0))]),
            )
            .with_bundle(
                decl("lamp"),
                vec![material("shade", [1.0, 0.85, 0.6])],
                Geometry::new(vec![box_mesh("shade", [10.0, 5.0, 10.0], [10.7, 6.4, 10.7], Some(0))]),
            )
            .with_bundle(
                decl("table"),
                vec![material("walnut", [0.0; 3])],
                Geometry::new(vec![box_mesh("top", [-0.6, 0.0, -0.6], [0.6, 0.78, 0.6], Some(0))]),
            )
            .with_bundle(
                decl("sign"),
                vec![material("backing", [0.0; 3]), material("neon", [1.0, 0.25, 0.65])],
                Geometry::new(vec![
                    box_mesh("backing", [-1.2, 3.0, -0.05], [1.2, 3.8, 0.0], Some(0)),
                    box_mesh("neon", [-1.0, 3.15, 0.0], [1.0, 3.65, 0.04], Some(1)),
                ]),
            )
    }

    /// Drop a bundle's geometry so its second load stage fails.
    pub fn without_geometry(mut self, decl: &BundleDecl) -> Self {
        self.geometry.remove(&decl.geometry_path());
        self
    }
}

impl AssetLoader for MemoryLoader {
    fn load_material_set<'a>(&'a self, path: &'a str) -> LoadFuture<'a, MaterialSet> {
        self.requests.lock().unwrap().push(path.to_string());
        let result = self
            .materials
            .get(path)
            .cloned()
            .ok_or_else(|| BundleLoadError::fetch(path, "404 Not Found"));
        Box::pin(async move { result })
    }

    fn load_geometry<'a>(
        &'a self,
        path: &'a str,
        _: &'a MaterialSet,
    ) -> LoadFuture<'a, Arc<Geometry>> {
        self.requests.lock().unwrap().push(path.to_string());
        let result = self
            .geometry
            .get(path)
            .cloned()
            .ok_or_else(|| BundleLoadError::fetch(path, "404 Not Found"));
        Box::pin(async move { result })
    }
}

pub fn composer(manifest: &SceneManifest) -> SceneComposer<RecordingBackend> {
    SceneComposer::new(
        manifest,
        RecordingBackend::default(),
        ViewportSize::new(800, 600),
    )
}

/// Load every bundle the composer hands out, returning the events unapplied.
pub fn load_all(
    composer: &mut SceneComposer<RecordingBackend>,
    loader: &MemoryLoader,
) -> Vec<BundleEvent> {
    composer
        .begin_loading()
        .iter()
        .map(|decl| futures::executor::block_on(load_bundle(loader, decl)))
        .collect()
}

/// Replace the listed bundles' outcomes with fetch failures.
pub fn fail(events: Vec<BundleEvent>, failing: &HashSet<&str>) -> Vec<BundleEvent> {
    events
        .into_iter()
        .map(|event| {
            if failing.contains(event.name()) {
                let name = event.name().to_string();
                BundleEvent::Failed {
                    error: BundleLoadError::fetch(&format!("models/{name}/{name}.mtl"), "timeout"),
                    name,
                }
            } else {
                event
            }
        })
        .collect()
}

/// Every ordering of `0..n` (Heap's algorithm).
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn heap(k: usize, items: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        heap(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap(k - 1, items, out);
        }
    }
    let mut items: Vec<usize> = (0..n).collect();
    let mut out = Vec::new();
    heap(n, &mut items, &mut out);
    out
}

/// Screen position of a world point for the composer's current camera.
pub fn project(camera: &CameraState, size: ViewportSize, p: Vector3<f32>) -> (f32, f32) {
    let clip = camera.view_proj() * Vector4::new(p.x, p.y, p.z, 1.0);
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    (
        (ndc_x + 1.0) * 0.5 * size.width as f32,
        (1.0 - ndc_y) * 0.5 * size.height as f32,
    )
}

pub fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
    assert!(
        (a - b).x.abs() < 1e-4 && (a - b).y.abs() < 1e-4 && (a - b).z.abs() < 1e-4,
        "{a:?} != {b:?}"
    );
}
