//! Pointer picking.
//!
//! A click is turned into a world-space ray through the current camera and
//! tested against the bounds of the registered hitbox nodes only. Decorative
//! geometry is never a candidate.
//!
//! 1. Normalize the pointer position to device coordinates using the viewport size
//! 2. Unproject the near and far plane points to build the ray
//! 3. Intersect the ray with every pickable node's bounds
//! 4. Keep the nearest hit, the first registered one on equal distance
//! 5. Resolve and invoke its action

use crate::{
    camera::CameraState,
    data_structures::scene_graph::{NodeId, SceneGraph},
    interaction::InteractionRegistry,
    viewport::ViewportSize,
};

/// The nearest pickable node under the pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    /// Distance along the ray from the near plane.
    pub distance: f32,
}

/// Map a pointer position (origin top-left) to `[-1, 1]` device coordinates.
///
/// Returns `None` for an empty viewport or a position outside it.
pub fn ndc_from_screen(x: f32, y: f32, size: ViewportSize) -> Option<(f32, f32)> {
    if size.is_empty() {
        return None;
    }
    let (width, height) = (size.width as f32, size.height as f32);
    if !(0.0..=width).contains(&x) || !(0.0..=height).contains(&y) {
        return None;
    }
    let ndc_x = (x / width) * 2.0 - 1.0;
    let ndc_y = 1.0 - (y / height) * 2.0;
    Some((ndc_x, ndc_y))
}

pub fn pick(
    x: f32,
    y: f32,
    size: ViewportSize,
    camera: &CameraState,
    scene: &SceneGraph,
    registry: &InteractionRegistry,
) -> Option<PickHit> {
    let (ndc_x, ndc_y) = ndc_from_screen(x, y, size)?;
    let ray = camera.ray_from_ndc(ndc_x, ndc_y)?;

    let mut closest: Option<PickHit> = None;
    for node in registry.pickable() {
        let bounds = match scene.bounds_of(node) {
            Some(b) => b,
            None => continue,
        };
        let distance = match bounds.intersect_ray(&ray) {
            Some(t) => t,
            None => continue,
        };
        // Strict comparison keeps the earlier registration on ties.
        if closest.is_none_or(|c| distance < c.distance) {
            closest = Some(PickHit { node, distance });
        }
    }
    closest
}

/// Pick under the pointer and invoke the hit node's action.
///
/// Returns the node whose action ran. A miss is not an error.
pub fn dispatch_click(
    x: f32,
    y: f32,
    size: ViewportSize,
    camera: &CameraState,
    scene: &mut SceneGraph,
    registry: &mut InteractionRegistry,
) -> Option<NodeId> {
    let hit = pick(x, y, size, camera, scene, registry);
    let hit = match hit {
        Some(hit) => hit,
        None => {
            log::debug!("click at ({x}, {y}) hit nothing pickable");
            return None;
        }
    };
    log::debug!("click at ({x}, {y}) picked {:?} at distance {}", hit.node, hit.distance);
    let action = registry.resolve_action(hit.node)?;
    action.invoke(scene);
    Some(hit.node)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use cgmath::Vector3;

    use super::*;
    use crate::{
        config::CameraSettings,
        data_structures::{bounds::BoundingVolume, model::Geometry, scene_graph::Node},
        interaction::Action,
    };

    const SIZE: ViewportSize = ViewportSize {
        width: 800,
        height: 600,
    };

    fn camera() -> CameraState {
        let settings = CameraSettings {
            position: [0.0, 0.0, 10.0],
            target: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        CameraState::new(&settings, SIZE.width, SIZE.height)
    }

    fn add_box(scene: &mut SceneGraph, name: &str, min: [f32; 3], max: [f32; 3]) -> NodeId {
        let bounds = BoundingVolume::new(min.into(), max.into());
        scene.add_node(Node::hitbox(name, &bounds))
    }

    fn recording(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Action {
        let log = log.clone();
        Action::Callback(Box::new(move |_| log.borrow_mut().push(name)))
    }

    #[test]
    fn screen_corners_map_to_device_corners() {
        assert_eq!(ndc_from_screen(0.0, 0.0, SIZE), Some((-1.0, 1.0)));
        assert_eq!(ndc_from_screen(800.0, 600.0, SIZE), Some((1.0, -1.0)));
        assert_eq!(ndc_from_screen(400.0, 300.0, SIZE), Some((0.0, 0.0)));
        assert_eq!(ndc_from_screen(1.0, 1.0, ViewportSize { width: 0, height: 600 }), None);
    }

    #[test]
    fn pointer_outside_the_viewport_picks_nothing() {
        assert_eq!(ndc_from_screen(-1.0, 300.0, SIZE), None);
        assert_eq!(ndc_from_screen(400.0, 600.5, SIZE), None);

        // Box left of the frustum, on the ray an unclamped x = -400 would cast.
        let mut scene = SceneGraph::default();
        let mut registry = InteractionRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let hidden = add_box(&mut scene, "hidden", [-40.0, -1.0, -1.0], [-9.0, 1.0, 1.0]);
        registry.register(&scene, hidden, recording(&log, "hidden")).unwrap();

        assert!(dispatch_click(-400.0, 300.0, SIZE, &camera(), &mut scene, &mut registry).is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn click_inside_hitbox_invokes_action_once() {
        let mut scene = SceneGraph::default();
        let mut registry = InteractionRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sign = add_box(&mut scene, "sign", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        registry.register(&scene, sign, recording(&log, "sign")).unwrap();

        let hit = dispatch_click(400.0, 300.0, SIZE, &camera(), &mut scene, &mut registry);
        assert_eq!(hit, Some(sign));
        assert_eq!(*log.borrow(), vec!["sign"]);
    }

    #[test]
    fn click_outside_every_hitbox_is_a_no_op() {
        let mut scene = SceneGraph::default();
        let mut registry = InteractionRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sign = add_box(&mut scene, "sign", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        registry.register(&scene, sign, recording(&log, "sign")).unwrap();

        assert!(dispatch_click(5.0, 5.0, SIZE, &camera(), &mut scene, &mut registry).is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn decorative_geometry_is_never_picked() {
        let mut scene = SceneGraph::default();
        let registry = InteractionRegistry::new();
        scene.add_node(Node::new("cafe", Geometry::cuboid(Vector3::new(4.0, 4.0, 4.0))));
        assert!(pick(400.0, 300.0, SIZE, &camera(), &scene, &registry).is_none());
    }

    #[test]
    fn nearest_hitbox_wins() {
        let mut scene = SceneGraph::default();
        let mut registry = InteractionRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let far = add_box(&mut scene, "far", [-1.0, -1.0, -4.0], [1.0, 1.0, -2.0]);
        let near = add_box(&mut scene, "near", [-1.0, -1.0, 2.0], [1.0, 1.0, 4.0]);
        registry.register(&scene, far, recording(&log, "far")).unwrap();
        registry.register(&scene, near, recording(&log, "near")).unwrap();

        assert_eq!(
            dispatch_click(400.0, 300.0, SIZE, &camera(), &mut scene, &mut registry),
            Some(near)
        );
        assert_eq!(*log.borrow(), vec!["near"]);
    }

    #[test]
    fn equal_distance_goes_to_first_registered() {
        let mut scene = SceneGraph::default();
        let mut registry = InteractionRegistry::new();
        let first = add_box(&mut scene, "first", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        let second = add_box(&mut scene, "second", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        registry.register(&scene, first, Action::Callback(Box::new(|_| ()))).unwrap();
        registry.register(&scene, second, Action::Callback(Box::new(|_| ()))).unwrap();

        let hit = pick(400.0, 300.0, SIZE, &camera(), &scene, &registry).unwrap();
        assert_eq!(hit.node, first);
    }
}
