//! World transform propagation
//!
//! Walks the scene graph parents-first and composes each node's parent world
//! matrix with its own local matrix. Roots get `world = local`. A node without
//! a `Transform` passes its parent's world matrix through to its children.

use crate::ecs::{Scene, System, SystemPhase, Transform};
use crate::foundation::math::Mat4;
use crate::scene::hierarchy;
use std::collections::HashMap;

/// Recompute every world transform in `scene`; returns the nodes updated
pub fn propagate_transforms(scene: &Scene) -> usize {
    let mut inherited: HashMap<_, Mat4> = HashMap::new();
    let mut updated = 0;

    for entity in hierarchy::traverse(scene) {
        let parent_world = hierarchy::parent_of(scene, entity)
            .and_then(|parent| inherited.get(&parent).copied())
            .unwrap_or_else(Mat4::identity);

        let world = match scene.get_component::<Transform>(entity) {
            Some(transform) => {
                let mut transform = transform.borrow_mut();
                let world = parent_world * transform.local_transform();
                transform.set_world_transform(world);
                updated += 1;
                world
            }
            None => parent_world,
        };
        inherited.insert(entity, world);
    }
    updated
}

/// System that keeps `Transform::world_transform` current
///
/// Runs in [`SystemPhase::PostUpdate`] so it sees every local change made
/// during the same tick.
#[derive(Debug, Default)]
pub struct TransformPropagationSystem;

impl TransformPropagationSystem {
    /// Create the system
    pub const fn new() -> Self {
        Self
    }
}

impl System for TransformPropagationSystem {
    fn update(&mut self, _dt: f32, scene: &Scene) {
        let updated = propagate_transforms(scene);
        log::trace!("Propagated {} world transforms", updated);
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::PostUpdate
    }

    fn name(&self) -> &str {
        "TransformPropagationSystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Entity, Query, QuerySystem, SceneNode};
    use crate::foundation::math::{Quat, Vec3};
    use crate::scene::attach_child;
    use approx::assert_relative_eq;

    fn node(scene: &mut Scene, transform: Option<Transform>) -> Entity {
        let entity = scene.spawn();
        scene.set_component(entity, SceneNode::new());
        if let Some(transform) = transform {
            scene.set_component(entity, transform);
        }
        entity
    }

    fn world_of(scene: &Scene, entity: Entity) -> Mat4 {
        *scene.get_component::<Transform>(entity).unwrap().borrow().world_transform()
    }

    fn local_of(scene: &Scene, entity: Entity) -> Mat4 {
        scene.get_component::<Transform>(entity).unwrap().borrow().local_transform()
    }

    fn registered_scene() -> Scene {
        let mut scene = Scene::new();
        scene.register_component_type::<SceneNode>();
        scene.register_component_type::<Transform>();
        scene
    }

    #[test]
    fn test_three_level_propagation() {
        let mut scene = registered_scene();
        let root = node(
            &mut scene,
            Some(Transform::from_trs(
                Vec3::new(1.0, 0.0, 0.0),
                Quat::from_axis_angle(&Vec3::y_axis(), 0.3),
                Vec3::new(2.0, 2.0, 2.0),
            )),
        );
        let child = node(&mut scene, Some(Transform::from_translation(Vec3::new(0.0, 3.0, 0.0))));
        let sibling = node(&mut scene, Some(Transform::from_translation(Vec3::new(0.0, 0.0, -1.0))));
        let grandchild = node(
            &mut scene,
            Some(Transform::from_trs(
                Vec3::new(0.5, 0.0, 0.0),
                Quat::from_axis_angle(&Vec3::x_axis(), 1.2),
                Vec3::new(1.0, 1.0, 1.0),
            )),
        );
        assert!(attach_child(&scene, root, child));
        assert!(attach_child(&scene, root, sibling));
        assert!(attach_child(&scene, child, grandchild));

        assert_eq!(propagate_transforms(&scene), 4);

        assert_relative_eq!(world_of(&scene, root), local_of(&scene, root));
        for (parent, entity) in [(root, child), (root, sibling), (child, grandchild)] {
            assert_relative_eq!(
                world_of(&scene, entity),
                world_of(&scene, parent) * local_of(&scene, entity),
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn test_node_without_transform_passes_parent_world_through() {
        let mut scene = registered_scene();
        let root = node(&mut scene, Some(Transform::from_translation(Vec3::new(1.0, 2.0, 3.0))));
        let group = node(&mut scene, None);
        let leaf = node(&mut scene, Some(Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))));
        assert!(attach_child(&scene, root, group));
        assert!(attach_child(&scene, group, leaf));

        assert_eq!(propagate_transforms(&scene), 2);
        assert_relative_eq!(
            world_of(&scene, leaf),
            Mat4::new_translation(&Vec3::new(1.0, 3.0, 3.0)),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_propagation_sees_same_tick_changes() {
        let mut scene = registered_scene();
        let root = node(&mut scene, Some(Transform::identity()));

        // Registered first but runs last
        scene.add_system(TransformPropagationSystem::new());
        let query = Query::<(Transform,)>::collect(&scene).unwrap();
        scene.add_system(QuerySystem::new(query, |_dt: f32, (transform,): (&mut Transform,)| {
            transform.set_translation(Vec3::new(4.0, 0.0, 0.0));
        }));

        scene.update(0.016);
        assert_relative_eq!(world_of(&scene, root)[(0, 3)], 4.0);
    }
}
