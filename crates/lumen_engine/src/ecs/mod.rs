//! Entity-Component-System implementation
//!
//! Entities are plain ids, components live in per-type sparse tables owned by
//! the [`Scene`], queries take snapshots over those tables and systems apply a
//! callback to a query's matches every tick.
//!
//! Scene mutations are lenient: adding an entity twice, registering a type
//! twice or attaching a component to an unknown entity logs a warning and
//! does nothing. Queries against unregistered types are programming errors
//! and fail with [`EcsError`].

pub mod scene;
pub mod entity;
pub mod component;
pub mod system;
pub mod query;
pub mod components;
pub mod systems;

pub use scene::Scene;
pub use entity::{Entity, EntityAllocator, EntityId};
pub use component::{Component, ComponentTable, ComponentType, Shared};
pub use system::{System, SystemPhase, QuerySystem};
pub use query::{ComponentSet, Query};
pub use components::{Camera, Light, LightSources, Material, SceneNode, Transform};
pub use systems::TransformPropagationSystem;

use thiserror::Error;

/// Errors raised by hard-failing ECS operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A query named a component type the scene never registered
    #[error("Query requested unregistered component type `{0}`")]
    UnregisteredComponent(&'static str),

    /// A query named the same component type more than once
    #[error("Query requested component type `{0}` more than once")]
    DuplicateComponent(&'static str),
}

/// Result type for ECS operations
pub type EcsResult<T> = Result<T, EcsError>;
