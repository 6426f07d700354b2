//! Entity implementation

use std::fmt;

/// Raw entity identifier
pub type EntityId = u64;

/// Entity identifier
///
/// An entity carries no data; it is only a key into the scene's component
/// tables. Ordering follows the id, which is also the order scenes iterate
/// entities in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    id: EntityId,
}

impl Entity {
    /// Reference an existing id without allocating a new one
    pub const fn from_id(id: EntityId) -> Self {
        Self { id }
    }

    /// Get the entity ID
    pub const fn id(self) -> EntityId {
        self.id
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.id)
    }
}

/// Monotonic entity id generator
///
/// Ids are never reused or decremented. Each allocator is an independent
/// counter, so tests can start from a known id.
#[derive(Debug, Clone, Default)]
pub struct EntityAllocator {
    next_id: EntityId,
}

impl EntityAllocator {
    /// Create an allocator starting at id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator whose first entity gets `first_id`
    pub const fn starting_at(first_id: EntityId) -> Self {
        Self { next_id: first_id }
    }

    /// Allocate a fresh entity
    pub fn create(&mut self) -> Entity {
        let entity = Entity::from_id(self.next_id);
        self.next_id += 1;
        entity
    }

    /// The id the next call to [`create`](Self::create) will return
    pub const fn peek_next(&self) -> EntityId {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        let b = allocator.create();
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(allocator.peek_next(), 2);
    }

    #[test]
    fn test_allocators_are_independent() {
        let mut first = EntityAllocator::starting_at(10);
        let mut second = EntityAllocator::new();
        assert_eq!(first.create(), Entity::from_id(10));
        assert_eq!(second.create(), Entity::from_id(0));
    }
}
