//! The scene graph: every placed node, material and point light.
//!
//! The graph only ever grows. Nodes are handed out [`NodeId`]s when they are
//! added, and those handles are what the rest of the engine (interaction
//! registry, GPU cache) keys on.

use std::{collections::HashMap, sync::Arc};

use crate::{
    data_structures::{bounds::BoundingVolume, instance::Instance, model},
    lights::LightFixture,
};

/// Opaque handle of a node, assigned by [`SceneGraph::add_node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Index into the scene's material table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// A placed, renderable object instance.
#[derive(Clone, Debug)]
pub struct Node {
    /// Name of the bundle this node belongs to.
    pub bundle: String,
    pub geometry: Arc<model::Geometry>,
    /// Scene material for each mesh of `geometry`, by mesh index.
    pub materials: Vec<MaterialId>,
    pub transform: Instance,
    /// Invisible nodes (hitboxes) are never drawn but still have bounds.
    pub visible: bool,
}

impl Node {
    pub fn new(bundle: &str, geometry: Arc<model::Geometry>) -> Self {
        Self {
            bundle: bundle.to_string(),
            geometry,
            materials: Vec::new(),
            transform: Instance::new(),
            visible: true,
        }
    }

    /// Non-visible box matching `bounds`, used as the clickable region of a bundle.
    pub fn hitbox(bundle: &str, bounds: &BoundingVolume) -> Self {
        let mut node = Self::new(bundle, model::Geometry::cuboid(bounds.size()));
        node.transform.position = bounds.center();
        node.visible = false;
        node
    }

    /// World-space bounds at the current transform.
    pub fn bounds(&self) -> Option<BoundingVolume> {
        BoundingVolume::from_points(
            self.geometry
                .positions()
                .map(|p| self.transform.transform_point(p)),
        )
    }

    pub fn material_for_mesh(&self, mesh: usize) -> MaterialId {
        self.materials
            .get(mesh)
            .copied()
            .unwrap_or(SceneGraph::DEFAULT_MATERIAL)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 0.25,
        }
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    nodes: Vec<(NodeId, Node)>,
    node_index: HashMap<NodeId, usize>,
    materials: Vec<model::MaterialDesc>,
    lights: Vec<LightFixture>,
    pub ambient: AmbientLight,
    next_id: u32,
}

impl SceneGraph {
    /// Material used by meshes without an assignment. Always present.
    pub const DEFAULT_MATERIAL: MaterialId = MaterialId(0);

    pub fn new(ambient: AmbientLight) -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            materials: vec![model::MaterialDesc::default()],
            lights: Vec::new(),
            ambient,
            next_id: 1,
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.node_index.insert(id, self.nodes.len());
        self.nodes.push((id, node));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|&idx| &self.nodes[idx].1)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_of<'a>(&'a self, bundle: &'a str) -> impl Iterator<Item = (NodeId, &'a Node)> {
        self.nodes().filter(move |(_, n)| n.bundle == bundle)
    }

    /// Freshly computed world bounds of a node.
    pub fn bounds_of(&self, id: NodeId) -> Option<BoundingVolume> {
        self.node(id).and_then(Node::bounds)
    }

    pub fn add_material(&mut self, material: model::MaterialDesc) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&model::MaterialDesc> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut model::MaterialDesc> {
        self.materials.get_mut(id.0)
    }

    pub fn materials(&self) -> &[model::MaterialDesc] {
        &self.materials
    }

    /// Adds a light unless one already occupies its `(bundle, slot)`.
    ///
    /// Returns whether the light was added.
    pub fn add_light(&mut self, light: LightFixture) -> bool {
        let taken = self
            .lights
            .iter()
            .any(|l| l.bundle == light.bundle && l.slot == light.slot);
        if taken {
            log::warn!(
                "light slot {} of bundle {} already exists, ignoring",
                light.slot,
                light.bundle
            );
            return false;
        }
        self.lights.push(light);
        true
    }

    pub fn lights(&self) -> &[LightFixture] {
        &self.lights
    }

    pub fn lights_of<'a>(&'a self, bundle: &'a str) -> impl Iterator<Item = &'a LightFixture> {
        self.lights.iter().filter(move |l| l.bundle == bundle)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.lights.is_empty()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new(AmbientLight::default())
    }
}
