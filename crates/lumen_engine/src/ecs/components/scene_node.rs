//! Scene graph node component
//!
//! Links are plain entity ids: `parent` is a back-reference, not ownership.
//! Build links with `scene::hierarchy::attach_child`, which keeps both sides
//! consistent and rejects cycles.

use crate::ecs::{Component, Entity};

/// Parent/child links of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneNode {
    pub(crate) parent: Option<Entity>,
    pub(crate) children: Vec<Entity>,
}

impl Component for SceneNode {}

impl SceneNode {
    /// Create a detached node
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent entity, `None` for roots
    pub const fn parent(&self) -> Option<Entity> {
        self.parent
    }

    /// Children in the order they were attached
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// Whether this node has no parent
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
