//! Clickable objects and what clicking them does.
//!
//! The registry maps a hitbox [`NodeId`] to an [`Action`]. Entries keep their
//! registration order, which the picker uses to break distance ties.

use std::{collections::HashMap, fmt};

use crate::{
    data_structures::{
        model::Appearance,
        scene_graph::{MaterialId, NodeId, SceneGraph},
    },
    error::InteractionError,
};

/// Lit state of a toggleable emissive material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleState {
    Lit,
    Unlit,
}

impl ToggleState {
    pub fn flipped(self) -> Self {
        match self {
            ToggleState::Lit => ToggleState::Unlit,
            ToggleState::Unlit => ToggleState::Lit,
        }
    }
}

/// Switches a shared material between its loaded (lit) look and a dimmed one.
#[derive(Clone, Debug, PartialEq)]
pub struct EmissiveToggle {
    pub material: MaterialId,
    pub state: ToggleState,
    pub lit: Appearance,
    pub unlit: Appearance,
}

impl EmissiveToggle {
    /// Starts `Lit`, capturing the material's current look as the lit appearance.
    pub fn capture(scene: &SceneGraph, material: MaterialId, unlit: Appearance) -> Option<Self> {
        let lit = scene.material(material)?.appearance();
        Some(Self {
            material,
            state: ToggleState::Lit,
            lit,
            unlit,
        })
    }

    fn toggle(&mut self, scene: &mut SceneGraph) {
        self.state = self.state.flipped();
        let appearance = match self.state {
            ToggleState::Lit => self.lit,
            ToggleState::Unlit => self.unlit,
        };
        match scene.material_mut(self.material) {
            Some(material) => material.set_appearance(appearance),
            None => log::warn!("toggled material {:?} no longer exists", self.material),
        }
    }
}

pub enum Action {
    ToggleEmissive(EmissiveToggle),
    Callback(Box<dyn FnMut(&mut SceneGraph)>),
}

impl Action {
    pub fn invoke(&mut self, scene: &mut SceneGraph) {
        match self {
            Action::ToggleEmissive(toggle) => toggle.toggle(scene),
            Action::Callback(f) => f(scene),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ToggleEmissive(toggle) => f.debug_tuple("ToggleEmissive").field(toggle).finish(),
            Action::Callback(_) => f.write_str("Callback(|&mut SceneGraph| {...})"),
        }
    }
}

#[derive(Debug)]
pub struct PickableEntry {
    pub node: NodeId,
    pub action: Action,
}

#[derive(Debug, Default)]
pub struct InteractionRegistry {
    entries: Vec<PickableEntry>,
    index: HashMap<NodeId, usize>,
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` for a node that is already in `scene`.
    pub fn register(
        &mut self,
        scene: &SceneGraph,
        node: NodeId,
        action: Action,
    ) -> Result<(), InteractionError> {
        if !scene.contains(node) {
            return Err(InteractionError::UnknownNode(node));
        }
        if self.index.contains_key(&node) {
            return Err(InteractionError::AlreadyRegistered(node));
        }
        self.index.insert(node, self.entries.len());
        self.entries.push(PickableEntry { node, action });
        Ok(())
    }

    pub fn resolve_action(&mut self, node: NodeId) -> Option<&mut Action> {
        let idx = *self.index.get(&node)?;
        Some(&mut self.entries[idx].action)
    }

    pub fn action(&self, node: NodeId) -> Option<&Action> {
        self.index.get(&node).map(|&idx| &self.entries[idx].action)
    }

    /// Pickable nodes in registration order.
    pub fn pickable(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|e| e.node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
