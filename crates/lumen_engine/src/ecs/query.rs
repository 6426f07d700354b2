//! Query system for component access
//!
//! A [`Query`] is a snapshot join over the scene's component tables for a
//! fixed tuple of component types. Running it collects, for every entity that
//! has all of the requested types, the entity and a tuple of shared handles.

use super::component::{Component, ComponentType, Shared};
use super::{EcsError, EcsResult, Entity, Scene};
use std::collections::HashSet;

/// A tuple of component types a query can join over
///
/// Implemented for tuples of one to six component types.
pub trait ComponentSet: 'static {
    /// Shared handles for one matched entity
    type Handles: Clone;

    /// Mutable references handed to system callbacks
    type Refs<'a>;

    /// The requested types, in tuple order
    fn component_types() -> Vec<ComponentType>;

    /// Resolve every requested type for `entity`, or `None` if any is missing
    fn fetch(scene: &Scene, entity: Entity) -> Option<Self::Handles>;

    /// Borrow every handle mutably and pass the references to `f`
    fn with_refs<R>(handles: &Self::Handles, f: impl FnOnce(Self::Refs<'_>) -> R) -> R;
}

macro_rules! impl_component_set {
    ($(($ty:ident, $var:ident)),+) => {
        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            type Handles = ($(Shared<$ty>,)+);
            type Refs<'a> = ($(&'a mut $ty,)+);

            fn component_types() -> Vec<ComponentType> {
                vec![$(ComponentType::of::<$ty>()),+]
            }

            fn fetch(scene: &Scene, entity: Entity) -> Option<Self::Handles> {
                Some(($(scene.get_component::<$ty>(entity)?,)+))
            }

            fn with_refs<R>(handles: &Self::Handles, f: impl FnOnce(Self::Refs<'_>) -> R) -> R {
                let ($($var,)+) = handles;
                $(let mut $var = $var.borrow_mut();)+
                f(($(&mut *$var,)+))
            }
        }
    };
}

impl_component_set!((A, a));
impl_component_set!((A, a), (B, b));
impl_component_set!((A, a), (B, b), (C, c));
impl_component_set!((A, a), (B, b), (C, c), (D, d));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f_));

/// Query for accessing components
///
/// Results accumulate: running the same query twice appends a second copy
/// of the matches. Build a fresh query (or use [`Query::collect`]) for each
/// snapshot.
pub struct Query<Q: ComponentSet> {
    entities: Vec<Entity>,
    components: Vec<Q::Handles>,
}

impl<Q: ComponentSet> Default for Query<Q> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            components: Vec::new(),
        }
    }
}

impl<Q: ComponentSet> Query<Q> {
    /// Create a new, empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query and run it once against `scene`
    pub fn collect(scene: &Scene) -> EcsResult<Self> {
        let mut query = Self::new();
        query.run(scene)?;
        Ok(query)
    }

    /// Append every entity of `scene` that has all requested components
    ///
    /// Fails if a requested type was never registered on `scene` or is
    /// requested twice; nothing is appended in that case.
    pub fn run(&mut self, scene: &Scene) -> EcsResult<()> {
        let mut seen = HashSet::new();
        for ty in Q::component_types() {
            if !seen.insert(ty.id) {
                return Err(EcsError::DuplicateComponent(ty.name));
            }
            if !scene.is_type_registered(&ty) {
                return Err(EcsError::UnregisteredComponent(ty.name));
            }
        }

        for entity in scene.entities() {
            if let Some(handles) = Q::fetch(scene, entity) {
                self.entities.push(entity);
                self.components.push(handles);
            }
        }
        log::trace!("Query matched {} entities", self.entities.len());
        Ok(())
    }

    /// Matched entities, in scene order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Matched component tuples, parallel to [`entities`](Self::entities)
    pub fn components(&self) -> &[Q::Handles] {
        &self.components
    }

    /// Iterate matched entities and their component tuples in lockstep
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &Q::Handles)> + '_ {
        self.entities.iter().copied().zip(self.components.iter())
    }

    /// Number of matches
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
