//! System trait and implementations

use super::query::{ComponentSet, Query};
use super::{EcsResult, Scene};

/// System execution phases with explicit ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SystemPhase {
    /// Runs before gameplay systems
    PreUpdate = 0,
    /// Gameplay and animation: mutates local state
    #[default]
    Update = 1,
    /// Derived state such as world transforms
    PostUpdate = 2,
}

impl SystemPhase {
    /// All phases in execution order
    pub const ALL: [Self; 3] = [Self::PreUpdate, Self::Update, Self::PostUpdate];
}

/// System trait for processing entities and components
///
/// Systems mutate component contents through shared handles; the scene they
/// receive is read-only, so they cannot add entities or components.
pub trait System {
    /// Run the system once
    fn update(&mut self, dt: f32, scene: &Scene);

    /// Which phase this system belongs to
    fn phase(&self) -> SystemPhase {
        SystemPhase::Update
    }

    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

type QueryCallback<Q> = Box<dyn for<'a> FnMut(f32, <Q as ComponentSet>::Refs<'a>)>;

/// A per-frame callback bound to one query's matches
///
/// The match set is the snapshot taken when the query ran; call
/// [`refresh`](Self::refresh) after adding entities that should join it.
pub struct QuerySystem<Q: ComponentSet> {
    name: String,
    phase: SystemPhase,
    query: Query<Q>,
    callback: QueryCallback<Q>,
}

impl<Q: ComponentSet> QuerySystem<Q> {
    /// Bind `callback` to the matches of `query`
    pub fn new(query: Query<Q>, callback: impl for<'a> FnMut(f32, Q::Refs<'a>) + 'static) -> Self {
        Self {
            name: std::any::type_name::<Q>().to_string(),
            phase: SystemPhase::default(),
            query,
            callback: Box::new(callback),
        }
    }

    /// Move the system to another phase
    #[must_use]
    pub fn with_phase(mut self, phase: SystemPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the diagnostic name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the snapshot with a fresh run against `scene`
    pub fn refresh(&mut self, scene: &Scene) -> EcsResult<()> {
        self.query = Query::collect(scene)?;
        Ok(())
    }

    /// The bound query
    pub const fn query(&self) -> &Query<Q> {
        &self.query
    }
}

impl<Q: ComponentSet> System for QuerySystem<Q> {
    fn update(&mut self, dt: f32, scene: &Scene) {
        let callback = &mut self.callback;
        for (entity, handles) in self.query.iter() {
            if !scene.is_entity_enabled(entity) {
                continue;
            }
            Q::with_refs(handles, |refs| callback(dt, refs));
        }
    }

    fn phase(&self) -> SystemPhase {
        self.phase
    }

    fn name(&self) -> &str {
        &self.name
    }
}
