//! Transform normalization of freshly loaded bundles.
//!
//! Bundles are authored in unrelated local frames. Before a bundle's node is
//! allowed into the scene it is scaled, centered on the origin, grounded so its
//! lowest point rests on `y = 0`, and finally moved by its authored offset on
//! the axes its [`OffsetAxes`] policy selects.

use std::fmt;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::data_structures::{bounds::BoundingVolume, instance::Instance, scene_graph::Node};

/// Which components of a bundle's authored offset are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OffsetAxes {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl OffsetAxes {
    pub const ALL: Self = Self {
        x: true,
        y: true,
        z: true,
    };
    pub const HORIZONTAL: Self = Self {
        x: true,
        y: false,
        z: true,
    };
    pub const VERTICAL: Self = Self {
        x: false,
        y: true,
        z: false,
    };
    pub const NONE: Self = Self {
        x: false,
        y: false,
        z: false,
    };

    pub fn mask(&self, offset: Vector3<f32>) -> Vector3<f32> {
        let pick = |on: bool, v: f32| if on { v } else { 0.0 };
        Vector3::new(pick(self.x, offset.x), pick(self.y, offset.y), pick(self.z, offset.z))
    }
}

/// Horizontal only, so a bundle stays grounded unless it opts into `y`.
impl Default for OffsetAxes {
    fn default() -> Self {
        Self::HORIZONTAL
    }
}

impl TryFrom<String> for OffsetAxes {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_lowercase();
        if value == "none" || value.is_empty() {
            return Ok(Self::NONE);
        }
        let mut axes = Self::NONE;
        for c in value.chars() {
            match c {
                'x' => axes.x = true,
                'y' => axes.y = true,
                'z' => axes.z = true,
                other => return Err(format!("unknown offset axis '{other}' in \"{value}\"")),
            }
        }
        Ok(axes)
    }
}

impl From<OffsetAxes> for String {
    fn from(axes: OffsetAxes) -> Self {
        axes.to_string()
    }
}

impl fmt::Display for OffsetAxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            return f.write_str("none");
        }
        for (on, name) in [(self.x, "x"), (self.y, "y"), (self.z, "z")] {
            if on {
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}

/// Authored placement of one bundle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub offset: Vector3<f32>,
    pub scale: f32,
    pub axes: OffsetAxes,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            offset: Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
            axes: OffsetAxes::default(),
        }
    }
}

/// Scale, center, ground and offset `node` in place.
///
/// Returns the node's bounds after placement, or `None` (leaving the transform
/// untouched) when the geometry has no vertices.
pub fn normalize(node: &mut Node, placement: &Placement) -> Option<BoundingVolume> {
    let scale = if placement.scale.is_finite() && placement.scale > 0.0 {
        placement.scale
    } else {
        log::warn!(
            "bundle {} has invalid scale {}, using 1.0",
            node.bundle,
            placement.scale
        );
        1.0
    };

    let mut transform = Instance::uniform_scale(scale);
    let raw = bounds_with(node, &transform)?;
    transform.translate(-raw.center());

    // Recompute after centering; the grounding offset must come from the centered box.
    let centered = bounds_with(node, &transform)?;
    transform.translate(Vector3::new(0.0, -centered.min.y, 0.0));

    transform.translate(placement.axes.mask(placement.offset));
    node.transform = transform;
    node.bounds()
}

fn bounds_with(node: &Node, transform: &Instance) -> Option<BoundingVolume> {
    BoundingVolume::from_points(node.geometry.positions().map(|p| transform.transform_point(p)))
}
