//! Scene graph hierarchy: linking nodes and walking the tree
//!
//! Nodes are `SceneNode` components. Linking goes through [`attach_child`],
//! which keeps parent and child in agreement and refuses anything that would
//! break the tree shape. Failures follow the scene's lenient policy: a
//! warning and `false`.

use crate::ecs::{Entity, Scene, SceneNode};
use std::collections::HashSet;

/// Make `child` the last child of `parent`
///
/// Both entities need a `SceneNode`. Self-links, re-parenting a child that
/// already has a parent, and links that would close a cycle are refused.
pub fn attach_child(scene: &Scene, parent: Entity, child: Entity) -> bool {
    if parent == child {
        log::warn!("Cannot attach {} to itself", child);
        return false;
    }
    let (Some(parent_node), Some(child_node)) = (
        scene.get_component::<SceneNode>(parent),
        scene.get_component::<SceneNode>(child),
    ) else {
        log::warn!("Cannot attach {} to {}: both need a SceneNode", child, parent);
        return false;
    };
    if let Some(existing) = child_node.borrow().parent {
        log::warn!("Cannot attach {} to {}: already a child of {}", child, parent, existing);
        return false;
    }
    if ancestors(scene, parent).contains(&child) {
        log::warn!("Cannot attach {} to {}: would create a cycle", child, parent);
        return false;
    }

    child_node.borrow_mut().parent = Some(parent);
    parent_node.borrow_mut().children.push(child);
    log::trace!("Attached {} under {}", child, parent);
    true
}

/// Parent of `entity` in the scene graph
pub fn parent_of(scene: &Scene, entity: Entity) -> Option<Entity> {
    let node = scene.get_component::<SceneNode>(entity)?;
    let parent = node.borrow().parent;
    parent
}

/// Ancestors of `entity`, nearest first
pub fn ancestors(scene: &Scene, entity: Entity) -> Vec<Entity> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([entity]);
    let mut current = entity;
    while let Some(parent) = parent_of(scene, current) {
        if !seen.insert(parent) {
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain
}

/// Root nodes in entity-id order
///
/// A node whose parent lost its `SceneNode` also counts as a root.
pub fn roots(scene: &Scene) -> Vec<Entity> {
    let Some(nodes) = scene.components_of_type::<SceneNode>() else {
        return Vec::new();
    };
    nodes
        .iter()
        .filter(|(_, node)| node.borrow().parent.map_or(true, |parent| !nodes.contains(parent)))
        .map(|(entity, _)| entity)
        .collect()
}

/// Every node in depth-first pre-order
///
/// Roots are visited in entity-id order and children in the order they were
/// attached, so parents always precede their descendants. Each node appears
/// once.
pub fn traverse(scene: &Scene) -> Vec<Entity> {
    let Some(nodes) = scene.components_of_type::<SceneNode>() else {
        return Vec::new();
    };

    let mut order = Vec::with_capacity(nodes.len());
    let mut visited = HashSet::with_capacity(nodes.len());
    let mut stack: Vec<Entity> = roots(scene).into_iter().rev().collect();

    while let Some(entity) = stack.pop() {
        if !visited.insert(entity) {
            continue;
        }
        order.push(entity);
        if let Some(node) = nodes.get(entity) {
            stack.extend(
                node.borrow()
                    .children
                    .iter()
                    .rev()
                    .copied()
                    .filter(|child| nodes.contains(*child)),
            );
        }
    }

    if order.len() < nodes.len() {
        log::warn!(
            "{} scene nodes are unreachable from any root",
            nodes.len() - order.len()
        );
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_nodes(count: usize) -> (Scene, Vec<Entity>) {
        let mut scene = Scene::new();
        scene.register_component_type::<SceneNode>();
        let entities = (0..count)
            .map(|_| {
                let entity = scene.spawn();
                scene.set_component(entity, SceneNode::new());
                entity
            })
            .collect();
        (scene, entities)
    }

    #[test]
    fn test_attach_links_both_sides() {
        let (scene, e) = scene_with_nodes(2);
        assert!(attach_child(&scene, e[0], e[1]));

        let parent = scene.get_component::<SceneNode>(e[0]).unwrap();
        let child = scene.get_component::<SceneNode>(e[1]).unwrap();
        assert_eq!(parent.borrow().children(), &[e[1]]);
        assert_eq!(child.borrow().parent(), Some(e[0]));
        assert!(!child.borrow().is_root());
    }

    #[test]
    fn test_attach_refuses_bad_links() {
        let (mut scene, e) = scene_with_nodes(3);
        assert!(!attach_child(&scene, e[0], e[0]));

        assert!(attach_child(&scene, e[0], e[1]));
        assert!(attach_child(&scene, e[1], e[2]));
        // Re-parenting
        assert!(!attach_child(&scene, e[0], e[2]));
        // Cycle
        assert!(!attach_child(&scene, e[2], e[0]));

        let bare = scene.spawn();
        assert!(!attach_child(&scene, e[0], bare));
    }

    #[test]
    fn test_traverse_is_depth_first_pre_order() {
        // Children attached before their parents exist in id order
        let (scene, e) = scene_with_nodes(6);
        assert!(attach_child(&scene, e[3], e[1]));
        assert!(attach_child(&scene, e[3], e[0]));
        assert!(attach_child(&scene, e[1], e[5]));
        assert!(attach_child(&scene, e[2], e[4]));

        assert_eq!(traverse(&scene), vec![e[2], e[4], e[3], e[1], e[5], e[0]]);
        assert_eq!(roots(&scene), vec![e[2], e[3]]);
        assert_eq!(ancestors(&scene, e[5]), vec![e[1], e[3]]);
    }

    #[test]
    fn test_traverse_without_nodes() {
        let scene = Scene::new();
        assert!(traverse(&scene).is_empty());
    }
}
