//! Point lights derived from fixture-bearing bundles.
//!
//! A [`LightRig`] describes where the bulbs of a lamp (or the glow of a sign)
//! sit relative to the bundle's placed bounding volume. Positions are a pure
//! function of that volume, so they don't depend on which other bundles have
//! finished loading.

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::data_structures::bounds::BoundingVolume;

/// Local horizontal offset of one fixture from the owner's center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixtureSlot {
    pub dx: f32,
    pub dz: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    /// Distance from the owner's top down to the light's head height.
    #[serde(default)]
    pub clearance: f32,
    #[serde(default = "LightRig::default_color")]
    pub color: [f32; 3],
    #[serde(default = "LightRig::default_intensity")]
    pub intensity: f32,
    /// Falloff distance; the light contributes nothing beyond it.
    #[serde(default = "LightRig::default_range")]
    pub range: f32,
    pub slots: Vec<FixtureSlot>,
}

impl LightRig {
    fn default_color() -> [f32; 3] {
        [1.0, 0.85, 0.6]
    }

    fn default_intensity() -> f32 {
        1.5
    }

    fn default_range() -> f32 {
        6.0
    }
}

/// A point light owned by a loaded bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct LightFixture {
    pub bundle: String,
    /// Index of the [`FixtureSlot`] that produced this light.
    pub slot: usize,
    pub position: Vector3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: f32,
}

/// One light per slot of `rig`, positioned from the owner's placed bounds.
pub fn derive_lights(bundle: &str, placed: &BoundingVolume, rig: &LightRig) -> Vec<LightFixture> {
    let head_height = placed.max.y - rig.clearance;
    let center = placed.center();
    rig.slots
        .iter()
        .enumerate()
        .map(|(slot, offset)| LightFixture {
            bundle: bundle.to_string(),
            slot,
            position: Vector3::new(center.x + offset.dx, head_height, center.z + offset.dz),
            color: rig.color,
            intensity: rig.intensity,
            range: rig.range,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> LightRig {
        LightRig {
            clearance: 0.25,
            color: [1.0, 0.9, 0.7],
            intensity: 2.0,
            range: 4.0,
            slots: vec![FixtureSlot { dx: 0.5, dz: 0.0 }, FixtureSlot { dx: -0.5, dz: 1.0 }],
        }
    }

    #[test]
    fn lights_hang_below_the_top_of_the_owner() {
        let placed = BoundingVolume::new(Vector3::new(1.0, 0.0, 2.0), Vector3::new(3.0, 2.0, 4.0));
        let lights = derive_lights("lamp", &placed, &rig());
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].position, Vector3::new(2.5, 1.75, 3.0));
        assert_eq!(lights[1].position, Vector3::new(1.5, 1.75, 4.0));
        assert!(lights.iter().all(|l| l.bundle == "lamp" && l.range == 4.0));
        assert_eq!(lights[1].slot, 1);
    }

    #[test]
    fn rig_without_slots_yields_no_lights() {
        let placed = BoundingVolume::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let rig = LightRig {
            slots: vec![],
            ..rig()
        };
        assert!(derive_lights("lamp", &placed, &rig).is_empty());
    }

    #[test]
    fn rig_fields_default_when_missing() {
        let rig: LightRig = serde_json::from_str(r#"{"slots": [{"dx": 0.0, "dz": 0.0}]}"#).unwrap();
        assert_eq!(rig.clearance, 0.0);
        assert_eq!(rig.intensity, 1.5);
        assert_eq!(rig.slots.len(), 1);
    }
}
