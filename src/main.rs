use anyhow::Context;

/// `cafe [manifest.json]`: runs the built-in café unless a manifest is given.
fn main() -> anyhow::Result<()> {
    let manifest = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading scene manifest {path}"))?;
            cafe_scene::SceneManifest::from_json_str(&json)?
        }
        None => cafe_scene::SceneManifest::cafe(),
    };
    cafe_scene::run(manifest)
}
