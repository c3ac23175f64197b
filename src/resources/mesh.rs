//! Conversion of parsed OBJ/MTL data into engine geometry and materials.

use crate::data_structures::model::{MaterialDesc, MeshData, ModelVertex};

/// One [`MeshData`] per OBJ model. Texture V is flipped to wgpu's top-left origin.
pub fn to_meshes(models: &[tobj::Model]) -> Vec<MeshData> {
    models
        .iter()
        .map(|m| {
            let vertices = (0..m.mesh.positions.len() / 3)
                .map(|i| ModelVertex {
                    position: [
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ],
                    tex_coords: [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                    normal: [
                        m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 1).map_or(1.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                })
                .collect::<Vec<_>>();

            MeshData {
                name: m.name.clone(),
                vertices,
                indices: m.mesh.indices.clone(),
                material: m.mesh.material_id,
            }
        })
        .collect()
}

/// Translate an MTL material, including its `Ke` emissive colour.
///
/// Parsers that predate `Material::emissive` leave `Ke` in `unknown_param`.
pub fn to_material(m: &tobj::Material) -> MaterialDesc {
    let defaults = MaterialDesc::default();
    let emissive = m
        .emissive
        .or_else(|| m.unknown_param.get("Ke").and_then(|ke| parse_rgb(ke)))
        .unwrap_or(defaults.emissive);
    MaterialDesc {
        name: m.name.clone(),
        diffuse: m.diffuse.unwrap_or(defaults.diffuse),
        emissive,
        emissive_intensity: defaults.emissive_intensity,
        opacity: m.dissolve.map_or(1.0, |d| d.clamp(0.0, 1.0)),
        diffuse_texture: None,
    }
}

fn parse_rgb(value: &str) -> Option<[f32; 3]> {
    let mut parts = value.split_whitespace().map(str::parse::<f32>);
    let r = parts.next()?.ok()?;
    // A single component means grey.
    let g = parts.next().map_or(Some(r), Result::ok)?;
    let b = parts.next().map_or(Some(r), Result::ok)?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use super::*;

    const MTL: &str = "newmtl neon\nKd 0.9 0.1 0.5\nKe 1.0 0.2 0.6\nd 0.8\n\nnewmtl wood\nKd 0.4 0.25 0.1\n";

    #[test]
    fn emissive_and_dissolve_are_read() {
        let (materials, _) = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(MTL))).unwrap();
        let neon = to_material(&materials[0]);
        assert_eq!(neon.name, "neon");
        assert_eq!(neon.emissive, [1.0, 0.2, 0.6]);
        assert_eq!(neon.opacity, 0.8);
        assert!(neon.is_transparent());

        let wood = to_material(&materials[1]);
        assert_eq!(wood.emissive, [0.0, 0.0, 0.0]);
        assert_eq!(wood.opacity, 1.0);
        assert_eq!(wood.diffuse, [0.4, 0.25, 0.1]);
    }

    #[test]
    fn triangulated_quad_becomes_one_mesh() {
        let obj = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nf 1/1 2/2 3/3 4/4\n";
        let (models, _) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(obj)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Err(tobj::LoadError::OpenFileFailed),
        )
        .unwrap();
        let meshes = to_meshes(&models);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].vertices.len(), 4);
        assert_eq!(meshes[0].indices.len(), 6);
        assert_eq!(meshes[0].vertices[0].tex_coords, [0.0, 1.0]);
        assert_eq!(meshes[0].material, None);
    }

    #[test]
    fn emissive_from_unknown_params_is_still_honoured() {
        let mut material = tobj::Material {
            name: "legacy".to_string(),
            ..Default::default()
        };
        material
            .unknown_param
            .insert("Ke".to_string(), "0.3 0.6 0.9".to_string());
        assert_eq!(to_material(&material).emissive, [0.3, 0.6, 0.9]);
    }

    #[test]
    fn shipped_sign_material_glows() {
        let mtl = include_str!("../../assets/models/sign/sign.mtl");
        let (materials, _) = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl))).unwrap();
        let neon = materials.iter().find(|m| m.name == "neon").map(to_material).unwrap();
        assert_eq!(neon.emissive, [1.0, 0.25, 0.65]);
    }

    #[test]
    fn single_component_colour_is_grey() {
        assert_eq!(parse_rgb("0.5"), Some([0.5, 0.5, 0.5]));
        assert_eq!(parse_rgb("a b c"), None);
    }
}
