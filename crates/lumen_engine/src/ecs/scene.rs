//! Scene: the registry owning entities, component tables and systems

use super::component::{Component, ComponentTable, ComponentType, Shared};
use super::entity::{Entity, EntityAllocator};
use super::system::{System, SystemPhase};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
struct EntityState {
    enabled: bool,
}

struct RegisteredTable {
    name: &'static str,
    table: Box<dyn Any>,
}

/// ECS scene containing all entities, components, and systems
///
/// The scene is the only place entities and components come into existence.
/// Systems mutate component contents through shared handles but never add or
/// remove entries.
#[derive(Default)]
pub struct Scene {
    allocator: EntityAllocator,
    entities: BTreeMap<Entity, EntityState>,
    tables: HashMap<TypeId, RegisteredTable>,
    systems: Vec<Box<dyn System>>,
}

impl Scene {
    /// Create a new scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scene whose [`spawn`](Self::spawn) draws ids from `allocator`
    pub fn with_allocator(allocator: EntityAllocator) -> Self {
        Self {
            allocator,
            ..Self::default()
        }
    }

    /// Register `entity` as present
    ///
    /// Returns `false` (and warns) if it was already present.
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        if self.entities.contains_key(&entity) {
            log::warn!("{} is already part of the scene", entity);
            return false;
        }
        self.entities.insert(entity, EntityState { enabled: true });
        log::trace!("Added {}", entity);
        true
    }

    /// Allocate a fresh entity from the scene's allocator and add it
    pub fn spawn(&mut self) -> Entity {
        loop {
            let entity = self.allocator.create();
            if !self.entities.contains_key(&entity) {
                self.entities.insert(entity, EntityState { enabled: true });
                log::trace!("Spawned {}", entity);
                return entity;
            }
        }
    }

    /// Whether `entity` has been added
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// All entities in id order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    /// Number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Enable or disable an entity; disabled entities are skipped by systems
    ///
    /// Returns `false` (and warns) if the entity is not part of the scene.
    pub fn set_entity_enabled(&mut self, entity: Entity, enabled: bool) -> bool {
        match self.entities.get_mut(&entity) {
            Some(state) => {
                state.enabled = enabled;
                true
            }
            None => {
                log::warn!("Cannot change enabled state of {}: not in scene", entity);
                false
            }
        }
    }

    /// Whether `entity` is present and enabled
    pub fn is_entity_enabled(&self, entity: Entity) -> bool {
        self.entities.get(&entity).is_some_and(|state| state.enabled)
    }

    /// Create an empty table for `T`
    ///
    /// Returns `false` (and warns) if `T` was already registered; the existing
    /// table is left untouched.
    pub fn register_component_type<T: Component>(&mut self) -> bool {
        let ty = ComponentType::of::<T>();
        if self.tables.contains_key(&ty.id) {
            log::warn!("Component type `{}` is already registered", ty.name);
            return false;
        }
        self.tables.insert(
            ty.id,
            RegisteredTable {
                name: ty.name,
                table: Box::new(ComponentTable::<T>::default()),
            },
        );
        log::debug!("Registered component type `{}`", ty.name);
        true
    }

    /// Whether `T` has been registered
    pub fn is_registered<T: Component>(&self) -> bool {
        self.tables.contains_key(&TypeId::of::<T>())
    }

    /// Whether the component type with this id has been registered
    pub fn is_type_registered(&self, ty: &ComponentType) -> bool {
        self.tables.contains_key(&ty.id)
    }

    /// Names of all registered component types
    pub fn registered_type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.values().map(|registered| registered.name)
    }

    /// Attach `component` to `entity`, overwriting any previous instance
    ///
    /// Returns the stored handle, or `None` (and warns) if the entity is not
    /// in the scene or `T` is unregistered. Nothing is mutated in that case.
    pub fn set_component<T: Component>(&mut self, entity: Entity, component: T) -> Option<Shared<T>> {
        let handle = Rc::new(RefCell::new(component));
        self.attach_shared(entity, Rc::clone(&handle)).then_some(handle)
    }

    /// Attach an existing handle to `entity`
    ///
    /// The same handle may be attached to several entities (a shader shared
    /// by many meshes, for instance). Reverse lookup returns the first owner.
    pub fn attach_shared<T: Component>(&mut self, entity: Entity, component: Shared<T>) -> bool {
        if !self.entities.contains_key(&entity) {
            log::warn!(
                "Cannot set `{}` on {}: entity not in scene",
                std::any::type_name::<T>(),
                entity
            );
            return false;
        }
        let Some(table) = self.table_mut::<T>() else {
            log::warn!(
                "Cannot set `{}` on {}: component type not registered",
                std::any::type_name::<T>(),
                entity
            );
            return false;
        };
        table.insert(entity, component);
        true
    }

    /// Get the `T` attached to `entity`
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<Shared<T>> {
        self.components_of_type::<T>()?.get(entity).cloned()
    }

    /// Whether `entity` has a `T` attached
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.components_of_type::<T>()
            .is_some_and(|table| table.contains(entity))
    }

    /// Reverse lookup: the entity owning `component` (linear scan)
    pub fn get_entity<T: Component>(&self, component: &Shared<T>) -> Option<Entity> {
        self.components_of_type::<T>()?.entity_of(component)
    }

    /// The whole table for `T`, for bulk iteration
    pub fn components_of_type<T: Component>(&self) -> Option<&ComponentTable<T>> {
        self.tables
            .get(&TypeId::of::<T>())
            .and_then(|registered| registered.table.downcast_ref::<ComponentTable<T>>())
    }

    fn table_mut<T: Component>(&mut self) -> Option<&mut ComponentTable<T>> {
        self.tables
            .get_mut(&TypeId::of::<T>())
            .and_then(|registered| registered.table.downcast_mut::<ComponentTable<T>>())
    }

    /// Append a system; it runs in its phase after previously added ones
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.add_boxed_system(Box::new(system));
    }

    /// Append an already boxed system
    pub fn add_boxed_system(&mut self, system: Box<dyn System>) {
        log::debug!("Added system `{}` ({:?})", system.name(), system.phase());
        self.systems.push(system);
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Run every system once
    ///
    /// Phases run in order (`PreUpdate`, `Update`, `PostUpdate`); within a
    /// phase systems run in registration order.
    pub fn update(&mut self, dt: f32) {
        let mut systems = std::mem::take(&mut self.systems);
        for phase in SystemPhase::ALL {
            for system in systems.iter_mut().filter(|system| system.phase() == phase) {
                system.update(dt, self);
            }
        }
        // Keep anything registered while systems were detached
        systems.append(&mut self.systems);
        self.systems = systems;
    }
}
