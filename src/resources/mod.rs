//! Asset bundle loading.
//!
//! A bundle loads in two stages: its material set is resolved first, then its
//! geometry is parsed against that material set. A failing first stage
//! short-circuits the second. Either way the outcome is one owned
//! [`BundleEvent`] that the event loop hands to the scene composer.

use std::{
    io::{BufReader, Cursor},
    sync::Arc,
};

use crate::{
    config::{BundleDecl, join_asset_path},
    data_structures::model::{Geometry, MaterialSet},
    error::BundleLoadError,
};

pub mod mesh;
pub mod texture;

#[cfg(not(target_arch = "wasm32"))]
pub type LoadFuture<'a, T> = futures::future::BoxFuture<'a, Result<T, BundleLoadError>>;
#[cfg(target_arch = "wasm32")]
pub type LoadFuture<'a, T> = futures::future::LocalBoxFuture<'a, Result<T, BundleLoadError>>;

/// Parses material and geometry descriptions.
pub trait AssetLoader {
    fn load_material_set<'a>(&'a self, path: &'a str) -> LoadFuture<'a, MaterialSet>;

    fn load_geometry<'a>(
        &'a self,
        path: &'a str,
        materials: &'a MaterialSet,
    ) -> LoadFuture<'a, Arc<Geometry>>;
}

/// A bundle whose geometry and materials are fully resolved.
#[derive(Clone, Debug)]
pub struct LoadedBundle {
    pub name: String,
    pub geometry: Arc<Geometry>,
    pub materials: MaterialSet,
}

/// Completion message of one bundle load.
#[derive(Clone, Debug)]
pub enum BundleEvent {
    Loaded(LoadedBundle),
    Failed { name: String, error: BundleLoadError },
}

impl BundleEvent {
    pub fn name(&self) -> &str {
        match self {
            BundleEvent::Loaded(bundle) => &bundle.name,
            BundleEvent::Failed { name, .. } => name,
        }
    }
}

/// Load one bundle. Never fails; errors are reported in the returned event.
pub async fn load_bundle<L: AssetLoader + ?Sized>(loader: &L, decl: &BundleDecl) -> BundleEvent {
    let failed = |error: BundleLoadError| BundleEvent::Failed {
        name: decl.name.clone(),
        error,
    };

    let material_path = decl.material_path();
    let materials = match loader.load_material_set(&material_path).await {
        Ok(materials) => materials,
        Err(error) => return failed(error),
    };

    let geometry_path = decl.geometry_path();
    match loader.load_geometry(&geometry_path, &materials).await {
        Ok(geometry) => BundleEvent::Loaded(LoadedBundle {
            name: decl.name.clone(),
            geometry,
            materials,
        }),
        Err(error) => failed(error),
    }
}

/// Parse MTL text into a [`MaterialSet`].
///
/// Returns the texture file referenced by each material (`map_Kd`), resolved
/// relative to the MTL file's directory.
pub fn parse_material_set(
    path: &str,
    source: String,
) -> Result<(MaterialSet, Vec<(usize, String)>), BundleLoadError> {
    let (obj_materials, _) = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(source.as_str())))
        .map_err(|e| BundleLoadError::material(path, e))?;
    let dir = path.rsplit_once('/').map_or("", |(dir, _)| dir);
    let textures = obj_materials
        .iter()
        .enumerate()
        .filter_map(|(idx, m)| {
            m.diffuse_texture
                .as_ref()
                .map(|file| (idx, join_asset_path(dir, file)))
        })
        .collect();
    let materials = obj_materials.iter().map(mesh::to_material).collect();
    Ok((MaterialSet { source, materials }, textures))
}

/// Parse OBJ text. `usemtl` names resolve against `materials`.
pub async fn parse_geometry(
    path: &str,
    source: String,
    materials: &MaterialSet,
) -> Result<Arc<Geometry>, BundleLoadError> {
    let mut obj_reader = BufReader::new(Cursor::new(source));
    let mtl_source = materials.source.as_str();
    let (models, _) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        // The material set is already resolved; every `mtllib` maps to it.
        |_| {
            let mtl_source = mtl_source.to_string();
            async move { tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_source))) }
        },
    )
    .await
    .map_err(|e| BundleLoadError::geometry(path, e))?;

    let meshes = mesh::to_meshes(&models);
    let geometry = Geometry::new(meshes);
    if geometry.vertex_count() == 0 {
        return Err(BundleLoadError::EmptyGeometry {
            path: path.to_string(),
        });
    }
    for (idx, m) in geometry.meshes.iter().enumerate() {
        if let Some(material) = m.material {
            if material >= materials.materials.len() {
                log::warn!(
                    "mesh {idx} ({}) of {path} references unknown material {material}",
                    m.name
                );
            }
        }
    }
    Ok(geometry)
}

/// Loads OBJ/MTL bundles from the asset root.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjLoader;

impl ObjLoader {
    async fn material_set(&self, path: &str) -> Result<MaterialSet, BundleLoadError> {
        let source = texture::load_string(path)
            .await
            .map_err(|e| BundleLoadError::fetch(path, e))?;
        let (mut set, textures) = parse_material_set(path, source)?;
        for (idx, texture_path) in textures {
            let bytes = texture::load_binary(&texture_path)
                .await
                .map_err(|e| BundleLoadError::fetch(&texture_path, e))?;
            let data = texture::decode_texture(&texture_path, &bytes)
                .map_err(|e| BundleLoadError::texture(&texture_path, e))?;
            set.materials[idx].diffuse_texture = Some(Arc::new(data));
        }
        Ok(set)
    }

    async fn geometry(
        &self,
        path: &str,
        materials: &MaterialSet,
    ) -> Result<Arc<Geometry>, BundleLoadError> {
        let source = texture::load_string(path)
            .await
            .map_err(|e| BundleLoadError::fetch(path, e))?;
        parse_geometry(path, source, materials).await
    }
}

impl AssetLoader for ObjLoader {
    fn load_material_set<'a>(&'a self, path: &'a str) -> LoadFuture<'a, MaterialSet> {
        Box::pin(self.material_set(path))
    }

    fn load_geometry<'a>(
        &'a self,
        path: &'a str,
        materials: &'a MaterialSet,
    ) -> LoadFuture<'a, Arc<Geometry>> {
        Box::pin(self.geometry(path, materials))
    }
}
