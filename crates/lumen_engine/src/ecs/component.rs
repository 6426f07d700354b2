//! Component trait and per-type component tables

use super::Entity;
use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Marker trait for components
///
/// The component's Rust type is its table key, so every concrete type gets
/// its own table. Variants that must share a table (all shader kinds, for
/// instance) are modelled as one type with a kind field.
pub trait Component: 'static {}

/// Shared handle to a stored component
///
/// Tables hand out clones of this handle; systems and render tasks mutate
/// the component in place through it.
pub type Shared<T> = Rc<RefCell<T>>;

/// Runtime identity of a component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    /// Type id used as the table key
    pub id: TypeId,
    /// Type name used in diagnostics
    pub name: &'static str,
}

impl ComponentType {
    /// Identity of `T`
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// Sparse table of one component type keyed by entity
///
/// Iteration is in entity-id order.
#[derive(Debug)]
pub struct ComponentTable<T> {
    slots: BTreeMap<Entity, Shared<T>>,
}

impl<T> Default for ComponentTable<T> {
    fn default() -> Self {
        Self { slots: BTreeMap::new() }
    }
}

impl<T> ComponentTable<T> {
    /// Get the component stored for `entity`
    pub fn get(&self, entity: Entity) -> Option<&Shared<T>> {
        self.slots.get(&entity)
    }

    /// Whether `entity` has a component in this table
    pub fn contains(&self, entity: Entity) -> bool {
        self.slots.contains_key(&entity)
    }

    /// Store `component` for `entity`, returning the handle it replaced
    pub(crate) fn insert(&mut self, entity: Entity, component: Shared<T>) -> Option<Shared<T>> {
        self.slots.insert(entity, component)
    }

    /// Reverse lookup by handle identity (linear scan)
    pub fn entity_of(&self, component: &Shared<T>) -> Option<Entity> {
        self.slots
            .iter()
            .find(|(_, stored)| Rc::ptr_eq(stored, component))
            .map(|(entity, _)| *entity)
    }

    /// Iterate `(entity, component)` pairs in entity-id order
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &Shared<T>)> + '_ {
        self.slots.iter().map(|(entity, component)| (*entity, component))
    }

    /// Entities holding a component of this type, in id order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.keys().copied()
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
