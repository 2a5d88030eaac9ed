//! The component registry.
//!
//! [`Registry`] is the sole owner of entity existence and component storage.
//! Entity creation is immediate, but every structural change (attach,
//! detach, destroy) goes through a FIFO queue that is applied only by
//! [`Registry::process_pending_operations`]. Between two flushes every read
//! sees the same snapshot, however many mutations are queued meanwhile.
//!
//! Operating on an unknown or retired handle is never an error: the call
//! has no observable effect and a warning is logged.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, trace, warn};

use crate::component::{Component, ComponentCategory, ComponentTags, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator, RegistryId};
use crate::hook::HookContext;
use crate::mutation::{Mutation, MutationQueue};

/// Storage for every flushed instance of one component type.
struct ComponentTable {
    type_name: &'static str,
    category: ComponentCategory,
    /// Ordered by handle so iteration is stable within a frame.
    entries: BTreeMap<Entity, Box<dyn Component>>,
}

impl ComponentTable {
    fn new(type_name: &'static str, category: ComponentCategory) -> Self {
        Self {
            type_name,
            category,
            entries: BTreeMap::new(),
        }
    }
}

/// Rounds of hook-queued mutations one flush applies before deferring the
/// remainder to the next flush.
pub const MAX_FLUSH_ROUNDS: usize = 64;

fn downcast_ref<T: Component>(component: &dyn Component) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}

fn downcast_mut<T: Component>(component: &mut dyn Component) -> Option<&mut T> {
    component.as_any_mut().downcast_mut::<T>()
}

/// Entity handles, per-type component tables and the pending mutation queue.
pub struct Registry {
    allocator: EntityAllocator,
    tables: HashMap<ComponentTypeId, ComponentTable>,
    queue: MutationQueue,
    flushes: u64,
}

impl Registry {
    /// Creates an empty registry with a random identity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(RegistryId::random())
    }

    /// Creates an empty registry stamping handles with `id`.
    #[must_use]
    pub fn with_id(id: RegistryId) -> Self {
        Self {
            allocator: EntityAllocator::new(id),
            tables: HashMap::new(),
            queue: MutationQueue::default(),
            flushes: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.allocator.registry()
    }

    // -- Entity lifecycle --

    /// Allocates a new entity. Not deferred: the handle is live and
    /// enumerable immediately, but has no components until an attach is
    /// flushed.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        trace!(%entity, "entity created");
        entity
    }

    /// Queues destruction of `entity`. At flush every owned component is
    /// detached, then the handle retires.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if !self.allocator.is_alive(entity) {
            warn!(%entity, "destroy_entity on unknown entity ignored");
            return;
        }
        self.queue.push(Mutation::Destroy { entity });
    }

    /// Returns `true` if `entity` was created here and has not retired.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities, including those created since the last
    /// flush and those whose destruction is still pending.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.allocator.count()
    }

    /// Every live entity, in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.iter()
    }

    // -- Deferred component mutation --

    /// Queues attaching `component` to `entity`.
    ///
    /// Nothing is visible until the next flush. Queuing a second component
    /// of the same type for the same entity before that flush supersedes the
    /// first one, which is dropped without running any hook.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        let type_name = std::any::type_name::<T>();
        if !self.allocator.is_alive(entity) {
            warn!(%entity, component = type_name, "add_component on unknown entity ignored");
            return;
        }
        let type_id = ComponentTypeId::of::<T>();
        if self.queue.supersede_attach(entity, type_id).is_some() {
            debug!(%entity, component = type_name, "pending attach superseded");
        }
        self.queue.push(Mutation::Attach {
            entity,
            type_id,
            component: Box::new(component),
        });
    }

    /// Queues detaching the `T` component of `entity`. Applying it is a
    /// no-op if the entity has no such component at flush time.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        let type_name = std::any::type_name::<T>();
        if !self.allocator.is_alive(entity) {
            warn!(%entity, component = type_name, "remove_component on unknown entity ignored");
            return;
        }
        self.queue.push(Mutation::Detach {
            entity,
            type_id: ComponentTypeId::of::<T>(),
            type_name,
        });
    }

    /// Number of mutations waiting for the next flush.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Number of pending mutations targeting `entity`.
    #[must_use]
    pub fn pending_count_for(&self, entity: Entity) -> usize {
        self.queue.count_for(entity)
    }

    /// Number of flushes performed so far, empty ones included.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Applies every queued mutation in enqueue order, firing lifecycle
    /// hooks as each one applies, and returns how many were applied.
    ///
    /// Mutations queued by hooks while flushing are applied before this
    /// returns, round by round, up to [`MAX_FLUSH_ROUNDS`] rounds. Whatever
    /// hooks still queue past that stays pending for the next flush. Calling
    /// it with nothing queued changes nothing.
    pub fn process_pending_operations(&mut self) -> usize {
        self.flushes += 1;
        let mut applied = 0;
        // Mutations queued while a round runs form the next round.
        let mut rounds = usize::from(!self.queue.is_empty());
        let mut round_left = self.queue.len();
        loop {
            if round_left == 0 {
                if self.queue.is_empty() {
                    break;
                }
                if rounds == MAX_FLUSH_ROUNDS {
                    warn!(
                        flush = self.flushes,
                        rounds,
                        deferred = self.queue.len(),
                        "hooks kept queueing mutations; rest deferred to next flush"
                    );
                    break;
                }
                rounds += 1;
                round_left = self.queue.len();
            }
            let Some(mutation) = self.queue.pop_front() else {
                break;
            };
            round_left -= 1;
            trace!(entity = %mutation.entity(), kind = mutation.kind(), "applying mutation");
            self.apply(mutation);
            applied += 1;
        }
        if applied > 0 {
            debug!(
                flush = self.flushes,
                applied,
                rounds,
                entities = self.entity_count(),
                "pending operations applied"
            );
        }
        applied
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Attach {
                entity,
                type_id,
                component,
            } => self.attach_now(entity, type_id, component),
            Mutation::Detach {
                entity,
                type_id,
                type_name,
            } => {
                if !self.allocator.is_alive(entity) {
                    warn!(%entity, component = type_name, "detach for retired entity ignored");
                } else if !self.detach_now(entity, type_id) {
                    trace!(%entity, component = type_name, "detach of absent component skipped");
                }
            }
            Mutation::Destroy { entity } => self.destroy_now(entity),
        }
    }

    fn attach_now(&mut self, entity: Entity, type_id: ComponentTypeId, mut component: Box<dyn Component>) {
        if !self.allocator.is_alive(entity) {
            warn!(
                %entity,
                component = (*component).type_name(),
                "attach to retired entity dropped"
            );
            return;
        }
        if self.detach_now(entity, type_id) {
            debug!(%entity, component = (*component).type_name(), "existing component replaced");
        }
        component.base_mut().set_owner(entity);
        {
            let mut ctx = HookContext::new(entity, self);
            component.on_attach(&mut ctx);
            if component.is_enabled() {
                component.on_enable(&mut ctx);
            }
        }
        self.insert(entity, type_id, component);
    }

    /// Runs the disable/detach hooks of a flushed component and then drops
    /// it. Returns `false` if there was nothing to detach.
    fn detach_now(&mut self, entity: Entity, type_id: ComponentTypeId) -> bool {
        if !self.run_detach_hooks(entity, type_id) {
            return false;
        }
        self.take(entity, type_id);
        true
    }

    /// Runs `on_disable` (if enabled) and `on_detach` while the component is
    /// out of its table, then puts it back. The entity's other components
    /// stay readable throughout.
    fn run_detach_hooks(&mut self, entity: Entity, type_id: ComponentTypeId) -> bool {
        let Some(mut component) = self.take(entity, type_id) else {
            return false;
        };
        {
            let mut ctx = HookContext::new(entity, self);
            if component.is_enabled() {
                component.on_disable(&mut ctx);
            }
            component.on_detach(&mut ctx);
        }
        self.insert(entity, type_id, component);
        true
    }

    /// Detaches every component of `entity`. All detach hooks run before
    /// any of the components is dropped.
    fn detach_all(&mut self, entity: Entity) {
        let owned = self.owned_types(entity);
        for &type_id in &owned {
            self.run_detach_hooks(entity, type_id);
        }
        for type_id in owned {
            self.take(entity, type_id);
        }
    }

    fn destroy_now(&mut self, entity: Entity) {
        if !self.allocator.is_alive(entity) {
            debug!(%entity, "destroy of retired entity skipped");
            return;
        }
        self.detach_all(entity);
        self.allocator.retire(entity);
        trace!(%entity, "entity retired");
    }

    fn owned_types(&self, entity: Entity) -> Vec<ComponentTypeId> {
        let mut owned: Vec<(&'static str, ComponentTypeId)> = self
            .tables
            .iter()
            .filter(|(_, table)| table.entries.contains_key(&entity))
            .map(|(type_id, table)| (table.type_name, *type_id))
            .collect();
        owned.sort();
        owned.into_iter().map(|(_, type_id)| type_id).collect()
    }

    fn take(&mut self, entity: Entity, type_id: ComponentTypeId) -> Option<Box<dyn Component>> {
        self.tables.get_mut(&type_id)?.entries.remove(&entity)
    }

    fn insert(&mut self, entity: Entity, type_id: ComponentTypeId, component: Box<dyn Component>) {
        self.tables
            .entry(type_id)
            .or_insert_with(|| ComponentTable::new((*component).type_name(), component.category()))
            .entries
            .insert(entity, component);
    }

    /// Synchronously tears everything down: pending mutations are dropped
    /// without hooks, every component of every live entity is detached with
    /// hooks, and every entity retires.
    ///
    /// Meant for shutdown and test isolation, never mid-frame.
    pub fn cleanup(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        let entities: Vec<Entity> = self.allocator.iter().collect();
        for &entity in &entities {
            self.detach_all(entity);
        }
        for &entity in &entities {
            self.allocator.retire(entity);
        }
        self.tables.clear();
        self.queue.clear();
        debug!(entities = entities.len(), dropped, "registry cleaned up");
    }

    // -- Immediate field-level changes --

    /// Enables or disables the `T` component of `entity`, firing
    /// `on_enable`/`on_disable` on an actual transition.
    ///
    /// A disabled component stays attached and enumerable. Returns `true`
    /// if the flag changed.
    pub fn set_component_enabled<T: Component>(&mut self, entity: Entity, enabled: bool) -> bool {
        let type_id = ComponentTypeId::of::<T>();
        let Some(mut component) = self.take(entity, type_id) else {
            warn!(
                %entity,
                component = std::any::type_name::<T>(),
                "set_component_enabled on missing component ignored"
            );
            return false;
        };
        let changed = component.is_enabled() != enabled;
        if changed {
            component.base_mut().set_enabled(enabled);
            let mut ctx = HookContext::new(entity, self);
            if enabled {
                component.on_enable(&mut ctx);
            } else {
                component.on_disable(&mut ctx);
            }
        }
        self.insert(entity, type_id, component);
        changed
    }

    // -- Queries over flushed state --

    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let component = self.tables.get(&ComponentTypeId::of::<T>())?.entries.get(&entity)?;
        downcast_ref::<T>(&**component)
    }

    /// Mutable access to the fields of a flushed component. Does not change
    /// which components exist.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let component = self
            .tables
            .get_mut(&ComponentTypeId::of::<T>())?
            .entries
            .get_mut(&entity)?;
        downcast_mut::<T>(&mut **component)
    }

    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.tables
            .get(&ComponentTypeId::of::<T>())
            .is_some_and(|table| table.entries.contains_key(&entity))
    }

    /// Every flushed `T`, ordered by owning entity.
    #[must_use]
    pub fn get_all_components<T: Component>(&self) -> Vec<&T> {
        self.components::<T>().map(|(_, component)| component).collect()
    }

    /// Every flushed `T` with its owner, ordered by owning entity.
    pub fn components<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.tables
            .get(&ComponentTypeId::of::<T>())
            .into_iter()
            .flat_map(|table| table.entries.iter())
            .filter_map(|(entity, component)| downcast_ref::<T>(&**component).map(|c| (*entity, c)))
    }

    #[must_use]
    pub fn component_count<T: Component>(&self) -> usize {
        self.tables
            .get(&ComponentTypeId::of::<T>())
            .map_or(0, |table| table.entries.len())
    }

    /// Every flushed component whose type belongs to `category`.
    #[must_use]
    pub fn components_in_category(&self, category: ComponentCategory) -> Vec<(Entity, &dyn Component)> {
        let mut found: Vec<(Entity, &dyn Component)> = self
            .tables
            .values()
            .filter(|table| table.category == category)
            .flat_map(|table| table.entries.iter().map(|(entity, c)| (*entity, &**c)))
            .collect();
        sort_erased(&mut found);
        found
    }

    /// Every flushed component carrying all flags in `tags`.
    #[must_use]
    pub fn components_with_tags(&self, tags: ComponentTags) -> Vec<(Entity, &dyn Component)> {
        let mut found: Vec<(Entity, &dyn Component)> = self
            .tables
            .values()
            .flat_map(|table| table.entries.iter().map(|(entity, c)| (*entity, &**c)))
            .filter(|(_, component)| component.has_tags(tags))
            .collect();
        sort_erased(&mut found);
        found
    }

    /// Type names of every flushed component on `entity`, sorted.
    #[must_use]
    pub fn entity_component_names(&self, entity: Entity) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .tables
            .values()
            .filter(|table| table.entries.contains_key(&entity))
            .map(|table| table.type_name)
            .collect();
        names.sort_unstable();
        names
    }
}

fn sort_erased(found: &mut [(Entity, &dyn Component)]) {
    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.type_name().cmp(b.1.type_name())));
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id())
            .field("entities", &self.entity_count())
            .field("component_types", &self.tables.len())
            .field("pending", &self.queue.len())
            .field("flushes", &self.flushes)
            .finish()
    }
}
