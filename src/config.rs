//! Scene manifest: camera, lighting, post-processing and the bundle table.
//!
//! Every field has a default so a manifest only needs to name its bundles.
//! [`SceneManifest::cafe`] is the built-in café.

use std::collections::HashSet;

use anyhow::bail;
use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{model::Appearance, scene_graph::AmbientLight},
    lights::{FixtureSlot, LightRig},
    normalize::{OffsetAxes, Placement},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Share of the pending orbit motion applied per frame.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 3.5, 9.0],
            target: [0.0, 1.0, 0.0],
            fovy_degrees: 45.0,
            znear: 0.1,
            zfar: 200.0,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 2.0,
            max_distance: 25.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub strength: f32,
    /// Scales the texel step of the half-resolution blur.
    pub radius: f32,
    /// Luminance above which a pixel contributes to the glow.
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.2,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

/// Makes a bundle clickable with an emissive on/off toggle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Material to toggle, the bundle's first material when absent.
    #[serde(default)]
    pub material: Option<String>,
    pub unlit: Appearance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleDecl {
    pub name: String,
    #[serde(default)]
    pub base_dir: String,
    pub material: String,
    pub geometry: String,
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default = "BundleDecl::default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub offset_axes: OffsetAxes,
    #[serde(default)]
    pub lights: Option<LightRig>,
    #[serde(default)]
    pub interaction: Option<InteractionConfig>,
}

impl BundleDecl {
    fn default_scale() -> f32 {
        1.0
    }

    pub fn new(name: &str, base_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            base_dir: base_dir.to_string(),
            material: format!("{name}.mtl"),
            geometry: format!("{name}.obj"),
            offset: [0.0; 3],
            scale: 1.0,
            offset_axes: OffsetAxes::default(),
            lights: None,
            interaction: None,
        }
    }

    pub fn material_path(&self) -> String {
        join_asset_path(&self.base_dir, &self.material)
    }

    pub fn geometry_path(&self) -> String {
        join_asset_path(&self.base_dir, &self.geometry)
    }

    pub fn placement(&self) -> Placement {
        Placement {
            offset: Vector3::from(self.offset),
            scale: self.scale,
            axes: self.offset_axes,
        }
    }
}

/// Join a bundle directory and a file name with `/`, valid both as a URL
/// segment and as a relative path.
pub fn join_asset_path(base_dir: &str, file: &str) -> String {
    let base = base_dir.trim_end_matches('/');
    if base.is_empty() {
        file.to_string()
    } else {
        format!("{base}/{file}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneManifest {
    pub camera: CameraSettings,
    pub ambient: AmbientLight,
    pub clear_colour: [f64; 4],
    pub bloom: Option<BloomSettings>,
    pub bundles: Vec<BundleDecl>,
}

impl Default for SceneManifest {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            ambient: AmbientLight::default(),
            clear_colour: [0.02, 0.02, 0.03, 1.0],
            bloom: None,
            bundles: Vec::new(),
        }
    }
}

impl SceneManifest {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for bundle in &self.bundles {
            if bundle.name.is_empty() {
                bail!("bundle names must not be empty");
            }
            if !seen.insert(bundle.name.as_str()) {
                bail!("bundle {} is declared twice", bundle.name);
            }
        }
        Ok(())
    }

    pub fn bundle(&self, name: &str) -> Option<&BundleDecl> {
        self.bundles.iter().find(|b| b.name == name)
    }

    /// The café: floor, shell, hanging lamp, table and a clickable neon sign.
    pub fn cafe() -> Self {
        let floor = BundleDecl {
            offset_axes: OffsetAxes::NONE,
            ..BundleDecl::new("floor", "models/floor")
        };
        let cafe = BundleDecl {
            offset: [0.0, 0.0, -1.0],
            offset_axes: OffsetAxes::HORIZONTAL,
            ..BundleDecl::new("cafe", "models/cafe")
        };
        let lamp = BundleDecl {
            offset: [2.6, 0.0, -1.6],
            scale: 0.6,
            lights: Some(LightRig {
                clearance: 0.2,
                color: [1.0, 0.82, 0.55],
                intensity: 2.2,
                range: 6.0,
                slots: vec![FixtureSlot { dx: 0.0, dz: 0.0 }],
            }),
            ..BundleDecl::new("lamp", "models/lamp")
        };
        let table = BundleDecl {
            offset: [1.4, 0.0, 0.6],
            offset_axes: OffsetAxes::HORIZONTAL,
            ..BundleDecl::new("table", "models/table")
        };
        let sign = BundleDecl {
            offset: [-1.8, 0.0, -2.4],
            scale: 0.5,
            lights: Some(LightRig {
                clearance: 0.25,
                color: [1.0, 0.3, 0.7],
                intensity: 1.4,
                range: 3.5,
                slots: vec![FixtureSlot { dx: 0.0, dz: 0.4 }],
            }),
            interaction: Some(InteractionConfig {
                material: Some("neon".to_string()),
                unlit: Appearance {
                    emissive_intensity: 0.0,
                    opacity: 0.35,
                },
            }),
            ..BundleDecl::new("sign", "models/sign")
        };
        Self {
            bloom: Some(BloomSettings::default()),
            ambient: AmbientLight {
                color: [1.0, 0.95, 0.9],
                intensity: 0.2,
            },
            bundles: vec![floor, cafe, lamp, table, sign],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cafe_declares_five_distinct_bundles() {
        let manifest = SceneManifest::cafe();
        manifest.validate().unwrap();
        let names: Vec<_> = manifest.bundles.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["floor", "cafe", "lamp", "table", "sign"]);
        assert!(manifest.bundle("sign").unwrap().interaction.is_some());
        assert!(manifest.bundle("lamp").unwrap().lights.is_some());
        assert!(manifest.bundles.iter().all(|b| !b.offset_axes.y));
        assert_eq!(manifest.camera.damping_factor, 0.05);
    }

    #[test]
    fn minimal_json_fills_in_defaults() {
        let manifest = SceneManifest::from_json_str(
            r#"{ "bundles": [
                { "name": "sign", "base_dir": "models/sign/", "material": "sign.mtl",
                  "geometry": "sign.obj", "offset": [1, 2, 3], "offset_axes": "xz" }
            ] }"#,
        )
        .unwrap();
        let sign = &manifest.bundles[0];
        assert_eq!(sign.scale, 1.0);
        assert_eq!(sign.offset_axes, OffsetAxes::HORIZONTAL);
        assert_eq!(sign.material_path(), "models/sign/sign.mtl");
        assert_eq!(sign.geometry_path(), "models/sign/sign.obj");
        assert!(manifest.bloom.is_none());
        assert_eq!(manifest.camera, CameraSettings::default());
    }

    #[test]
    fn duplicate_bundle_names_are_rejected() {
        let json = r#"{ "bundles": [
            { "name": "lamp", "material": "a.mtl", "geometry": "a.obj" },
            { "name": "lamp", "material": "b.mtl", "geometry": "b.obj" }
        ] }"#;
        assert!(SceneManifest::from_json_str(json).is_err());
    }

    #[test]
    fn unknown_offset_axis_is_rejected() {
        let json = r#"{ "bundles": [
            { "name": "lamp", "material": "a.mtl", "geometry": "a.obj", "offset_axes": "xw" }
        ] }"#;
        assert!(SceneManifest::from_json_str(json).is_err());
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = SceneManifest::cafe();
        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(SceneManifest::from_json_str(&json).unwrap(), manifest);
    }

    #[test]
    fn paths_without_base_dir_are_bare_file_names() {
        assert_eq!(join_asset_path("", "floor.obj"), "floor.obj");
    }
}
