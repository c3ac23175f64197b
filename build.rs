use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::{Path, PathBuf};

/// Warn about bundle directories missing their material or geometry file.
fn check_bundles(models: &Path) -> Result<()> {
    if !models.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(models)? {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        for ext in ["mtl", "obj"] {
            let file = dir.join(format!("{name}.{ext}"));
            if !file.exists() {
                println!("cargo::warning=bundle {name} has no {}", file.display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    println!("cargo::rerun-if-changed=assets");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets_src = manifest_dir.join("assets");
    check_bundles(&assets_src.join("models"))?;

    if assets_src.exists() {
        let out_dir = env::var("OUT_DIR")?;
        let mut copy_options = CopyOptions::new();
        copy_options.overwrite = true;
        copy_items(&[assets_src], out_dir, &copy_options)?;
    }

    Ok(())
}
