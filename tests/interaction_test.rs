use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use cafe_scene::{
    config::SceneManifest,
    data_structures::{model::Appearance, scene_graph::NodeId},
    error::InteractionError,
    interaction::{Action, ToggleState},
    scene::SceneComposer,
};

use crate::common::test_utils::{
    MemoryLoader, RecordingBackend, RecordingChain, composer, fail, load_all, project,
};

mod common;

fn loaded_cafe(failing: &HashSet<&str>) -> SceneComposer<RecordingBackend> {
    let manifest = SceneManifest::cafe();
    let loader = MemoryLoader::cafe(&manifest);
    let mut composer = composer(&manifest);
    for event in fail(load_all(&mut composer, &loader), failing) {
        composer.on_bundle_event(event);
    }
    composer.tick().unwrap();
    composer
}

fn sign_center(composer: &SceneComposer<RecordingBackend>) -> (f32, f32) {
    let hitbox = composer.hitbox_of("sign").unwrap();
    let center = composer.scene().bounds_of(hitbox).unwrap().center();
    project(composer.camera(), composer.viewport_size(), center)
}

fn neon(composer: &SceneComposer<RecordingBackend>) -> Appearance {
    let node = composer
        .scene()
        .node(composer.node_of("sign").unwrap())
        .unwrap();
    composer
        .scene()
        .material(node.materials[1])
        .unwrap()
        .appearance()
}

#[test]
fn clicking_the_sign_toggles_its_glow_and_back() {
    let mut composer = loaded_cafe(&HashSet::new());
    let lit = neon(&composer);
    let (x, y) = sign_center(&composer);

    let hit = composer.click(x, y);
    assert_eq!(hit, composer.hitbox_of("sign"));
    assert_eq!(
        neon(&composer),
        Appearance {
            emissive_intensity: 0.0,
            opacity: 0.35
        }
    );

    composer.click(x, y);
    assert_eq!(neon(&composer), lit);
}

#[test]
fn toggle_state_is_tracked_in_the_registry() {
    let mut composer = loaded_cafe(&HashSet::new());
    let hitbox = composer.hitbox_of("sign").unwrap();
    let (x, y) = sign_center(&composer);
    composer.click(x, y);

    match composer.registry().action(hitbox) {
        Some(Action::ToggleEmissive(toggle)) => assert_eq!(toggle.state, ToggleState::Unlit),
        other => panic!("unexpected action {other:?}"),
    }
}

#[test]
fn only_the_toggled_material_changes() {
    let mut composer = loaded_cafe(&HashSet::new());
    let before: Vec<_> = composer
        .scene()
        .materials()
        .iter()
        .map(|m| m.appearance())
        .collect();
    let (x, y) = sign_center(&composer);
    composer.click(x, y);

    let changed: Vec<usize> = composer
        .scene()
        .materials()
        .iter()
        .zip(&before)
        .enumerate()
        .filter(|(_, (now, was))| now.appearance() != **was)
        .map(|(i, _)| i)
        .collect();
    let node = composer
        .scene()
        .node(composer.node_of("sign").unwrap())
        .unwrap();
    assert_eq!(changed, vec![node.materials[1].0]);
}

#[test]
fn clicking_empty_space_is_a_no_op() {
    let mut composer = loaded_cafe(&HashSet::new());
    let lit = neon(&composer);
    let size = composer.viewport_size();

    assert_eq!(
        composer.click(size.width as f32 - 1.0, size.height as f32 - 1.0),
        None
    );
    assert_eq!(neon(&composer), lit);
}

#[test]
fn decorative_geometry_is_never_picked() {
    let mut composer = loaded_cafe(&HashSet::new());
    let table = composer.node_of("table").unwrap();
    let center = composer.scene().bounds_of(table).unwrap().center();
    let (x, y) = project(composer.camera(), composer.viewport_size(), center);

    let hit = composer.click(x, y);
    assert_ne!(hit, Some(table));
}

#[test]
fn nothing_is_pickable_before_the_sign_arrives() {
    let mut composer = loaded_cafe(&HashSet::from(["sign"]));
    let (w, h) = {
        let size = composer.viewport_size();
        (size.width as f32, size.height as f32)
    };
    for (x, y) in [(0.0, 0.0), (w / 2.0, h / 2.0), (w / 4.0, h / 4.0)] {
        assert_eq!(composer.click(x, y), None);
    }
}

#[test]
fn host_callbacks_make_other_nodes_clickable() {
    let mut composer = loaded_cafe(&HashSet::new());
    let table = composer.node_of("table").unwrap();
    let clicks = Arc::new(Mutex::new(Vec::<NodeId>::new()));
    let seen = clicks.clone();
    composer
        .register_action(
            table,
            Action::Callback(Box::new(move |_| seen.lock().unwrap().push(table))),
        )
        .unwrap();

    let center = composer.scene().bounds_of(table).unwrap().center();
    let (x, y) = project(composer.camera(), composer.viewport_size(), center);
    assert_eq!(composer.click(x, y), Some(table));
    assert_eq!(*clicks.lock().unwrap(), vec![table]);
}

#[test]
fn a_node_cannot_be_registered_twice() {
    let mut composer = loaded_cafe(&HashSet::new());
    let hitbox = composer.hitbox_of("sign").unwrap();
    let err = composer
        .register_action(hitbox, Action::Callback(Box::new(|_| {})))
        .unwrap_err();
    assert_eq!(err, InteractionError::AlreadyRegistered(hitbox));
    assert_eq!(composer.registry().len(), 1);
}

#[test]
fn pick_follows_the_viewport_after_resize() {
    let manifest = SceneManifest::cafe();
    let loader = MemoryLoader::cafe(&manifest);
    let mut composer = composer(&manifest);
    let (chain, _) = RecordingChain::new();
    composer.attach_chain(Box::new(chain));
    for event in load_all(&mut composer, &loader) {
        composer.on_bundle_event(event);
    }
    assert!(composer.resize(1280, 720));
    composer.tick().unwrap();

    let (x, y) = sign_center(&composer);
    assert_eq!(composer.click(x, y), composer.hitbox_of("sign"));
}
