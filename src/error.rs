//! Error types of the scene engine.
//!
//! Failures never cross the bundle boundary: a [`BundleLoadError`] is delivered
//! through the failing bundle's own completion message, and a [`RenderError`]
//! is logged by the render loop, which keeps ticking.

use thiserror::Error;

use crate::data_structures::scene_graph::NodeId;

/// Material or geometry fetch/parse failure of a single bundle.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BundleLoadError {
    #[error("could not fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("could not parse material set {path}: {reason}")]
    Material { path: String, reason: String },

    #[error("could not decode texture {path}: {reason}")]
    Texture { path: String, reason: String },

    #[error("could not parse geometry {path}: {reason}")]
    Geometry { path: String, reason: String },

    #[error("geometry {path} contains no vertices")]
    EmptyGeometry { path: String },
}

impl BundleLoadError {
    pub fn fetch(path: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn material(path: &str, reason: impl ToString) -> Self {
        Self::Material {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn texture(path: &str, reason: impl ToString) -> Self {
        Self::Texture {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn geometry(path: &str, reason: impl ToString) -> Self {
        Self::Geometry {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A frame that could not be submitted.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The surface is lost or outdated and must be reconfigured.
    #[error("render surface lost or outdated")]
    SurfaceLost,

    #[error("render backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum InteractionError {
    #[error("node {0:?} is not part of the scene")]
    UnknownNode(NodeId),

    #[error("node {0:?} already has a registered action")]
    AlreadyRegistered(NodeId),
}
