//! Entity handles and slot allocation.
//!
//! An [`Entity`] is an opaque 128-bit handle with no data of its own. It packs
//! a slot index, a generation counter and the identity of the registry that
//! issued it. Components are keyed by the handle inside the registry's
//! per-type tables.
//!
//! Slots are recycled only after an entity retires, and every reuse bumps the
//! slot's generation, so a stale handle can never alias a newer entity. A
//! slot whose generation is exhausted is never reused.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Identity of one registry instance, embedded in every handle it issues.
///
/// Taken from the high half of a random v4 UUID, so two registries in the
/// same process never share handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryId(pub u64);

impl RegistryId {
    /// Generate a fresh random registry identity.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().as_u64_pair().0)
    }
}

/// A unique entity handle.
///
/// Entities are pure identifiers. Handles compare and order by registry, then
/// slot index, then generation, which gives component tables a stable
/// iteration order within a frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    registry: RegistryId,
    index: u32,
    generation: u32,
}

impl Entity {
    /// Slot index reserved for handles issued after the allocator ran out of
    /// slots. No slot ever exists at this index.
    const EXHAUSTED_INDEX: u32 = u32::MAX;

    pub(crate) const fn new(registry: RegistryId, index: u32, generation: u32) -> Self {
        Self {
            registry,
            index,
            generation,
        }
    }

    /// Slot index. Recycled once the entity retires.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// The registry that issued this handle.
    #[must_use]
    pub const fn registry(self) -> RegistryId {
        self.registry
    }

    /// Packs the handle into its 128-bit representation:
    /// `registry << 64 | generation << 32 | index`.
    #[must_use]
    pub const fn to_bits(self) -> u128 {
        ((self.registry.0 as u128) << 64) | ((self.generation as u128) << 32) | self.index as u128
    }

    /// Rebuilds a handle from [`Entity::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u128) -> Self {
        Self {
            registry: RegistryId((bits >> 64) as u64),
            generation: (bits >> 32) as u32,
            index: bits as u32,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// One allocator slot.
#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Issues and retires entity handles for a single registry.
///
/// Retired slot indices go onto a free list and are handed out again with
/// the next generation.
#[derive(Debug)]
pub struct EntityAllocator {
    registry: RegistryId,
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
}

impl EntityAllocator {
    /// Creates an allocator stamping handles with `registry`.
    #[must_use]
    pub fn new(registry: RegistryId) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            free: Vec::new(),
            alive: 0,
        }
    }

    /// Allocates a fresh live handle.
    ///
    /// Once every slot index is in use the allocator hands out
    /// a handle at a reserved index that is never alive.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            self.alive += 1;
            return Entity::new(self.registry, index, slot.generation);
        }
        let index = match u32::try_from(self.slots.len()) {
            Ok(index) if index < Entity::EXHAUSTED_INDEX => index,
            _ => {
                warn!(slots = self.slots.len(), "entity slots exhausted; handle will never be alive");
                return Entity::new(self.registry, Entity::EXHAUSTED_INDEX, u32::MAX);
            }
        };
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        self.alive += 1;
        Entity::new(self.registry, index, 0)
    }

    /// Returns `true` if `entity` was issued here and has not retired.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        entity.registry == self.registry
            && self
                .slots
                .get(entity.index as usize)
                .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Retires `entity`, freeing its slot for reuse under a new generation.
    ///
    /// Returns `false` for unknown or already retired handles.
    pub fn retire(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        self.alive -= 1;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free.push(entity.index);
            }
            None => warn!(%entity, "slot generation exhausted; slot retired permanently"),
        }
        true
    }

    /// Returns every live handle in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.alive
                .then(|| Entity::new(self.registry, index as u32, slot.generation))
        })
    }

    /// Number of live entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.alive
    }

    /// The registry identity stamped into issued handles.
    #[must_use]
    pub fn registry(&self) -> RegistryId {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_unique_handles() {
        let mut alloc = EntityAllocator::new(RegistryId(7));
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.index(), 0);
        assert_eq!(e2.index(), 1);
        assert_eq!(e3.index(), 2);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_retired_slot_reused_with_new_generation() {
        let mut alloc = EntityAllocator::new(RegistryId(7));
        let old = alloc.allocate();
        assert!(alloc.retire(old));
        let new = alloc.allocate();
        assert_eq!(new.index(), old.index());
        assert_eq!(new.generation(), old.generation() + 1);
        assert!(!alloc.is_alive(old));
        assert!(alloc.is_alive(new));
    }

    #[test]
    fn test_double_retire_is_rejected() {
        let mut alloc = EntityAllocator::new(RegistryId(7));
        let e = alloc.allocate();
        assert!(alloc.retire(e));
        assert!(!alloc.retire(e));
        assert_eq!(alloc.count(), 0);
    }

    #[test]
    fn test_foreign_handle_is_not_alive() {
        let mut a = EntityAllocator::new(RegistryId(1));
        let b = EntityAllocator::new(RegistryId(2));
        let e = a.allocate();
        assert!(a.is_alive(e));
        assert!(!b.is_alive(e));
    }

    #[test]
    fn test_bits_roundtrip_preserves_all_fields() {
        let e = Entity::new(RegistryId(0xdead_beef_0000_0001), 42, 9);
        let bits = e.to_bits();
        assert_eq!(bits as u32, 42);
        assert_eq!(Entity::from_bits(bits), e);
    }

    #[test]
    fn test_iter_skips_retired() {
        let mut alloc = EntityAllocator::new(RegistryId(3));
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        alloc.retire(b);
        let live: Vec<_> = alloc.iter().collect();
        assert_eq!(live, vec![a, c]);
    }

    #[test]
    fn test_exhausted_generation_retires_slot_for_good() {
        let mut alloc = EntityAllocator::new(RegistryId(7));
        let first = alloc.allocate();
        alloc.slots[first.index() as usize].generation = u32::MAX;
        let last = Entity::new(RegistryId(7), first.index(), u32::MAX);
        assert!(alloc.is_alive(last));

        assert!(alloc.retire(last));
        assert!(!alloc.is_alive(last));
        assert_eq!(alloc.count(), 0);

        let next = alloc.allocate();
        assert_ne!(next.index(), first.index());
        assert_eq!(next.generation(), 0);
        assert!(!alloc.is_alive(last));
    }

    #[test]
    fn test_exhausted_index_is_never_alive() {
        let alloc = EntityAllocator::new(RegistryId(7));
        let handle = Entity::new(RegistryId(7), Entity::EXHAUSTED_INDEX, u32::MAX);
        assert!(!alloc.is_alive(handle));
    }

    #[test]
    fn test_random_registry_ids_differ() {
        assert_ne!(RegistryId::random(), RegistryId::random());
    }
}
