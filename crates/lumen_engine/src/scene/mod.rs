//! Scene graph
//!
//! The graph is stored in the ECS as `SceneNode` components; this module
//! holds the operations that treat those components as a tree. World
//! transforms are derived from it by
//! [`TransformPropagationSystem`](crate::ecs::TransformPropagationSystem) and
//! render tasks are compiled in its traversal order.

pub mod hierarchy;

pub use hierarchy::{ancestors, attach_child, parent_of, roots, traverse};
