//! Context handed to component lifecycle hooks.

use crate::component::Component;
use crate::entity::Entity;
use crate::registry::Registry;

/// Access a lifecycle hook has to the rest of the registry.
///
/// Hooks may read and mutate fields of other flushed components, and may
/// enqueue further structural mutations. Enqueued mutations issued during a
/// flush are applied later in that same flush.
pub struct HookContext<'a> {
    entity: Entity,
    registry: &'a mut Registry,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(entity: Entity, registry: &'a mut Registry) -> Self {
        Self { entity, registry }
    }

    /// The entity owning the component whose hook is running.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Read-only view of the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &*self.registry
    }

    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.registry.get_component::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.registry.get_component_mut::<T>(entity)
    }

    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.registry.is_alive(entity)
    }

    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        self.registry.add_component(entity, component);
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.registry.remove_component::<T>(entity);
    }

    pub fn destroy_entity(&mut self, entity: Entity) {
        self.registry.destroy_entity(entity);
    }
}
