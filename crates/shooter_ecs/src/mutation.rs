//! The deferred mutation queue.
//!
//! Every structural change to the registry (attach, detach, destroy) is
//! recorded here during a frame and applied in FIFO order by
//! [`Registry::process_pending_operations`](crate::Registry::process_pending_operations).

use std::collections::VecDeque;
use std::fmt;

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;

/// A single pending structural change.
pub(crate) enum Mutation {
    Attach {
        entity: Entity,
        type_id: ComponentTypeId,
        component: Box<dyn Component>,
    },
    Detach {
        entity: Entity,
        type_id: ComponentTypeId,
        type_name: &'static str,
    },
    Destroy {
        entity: Entity,
    },
}

impl Mutation {
    pub(crate) fn entity(&self) -> Entity {
        match self {
            Self::Attach { entity, .. } | Self::Detach { entity, .. } | Self::Destroy { entity } => {
                *entity
            }
        }
    }

    /// Short label for log fields.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Attach { .. } => "attach",
            Self::Detach { .. } => "detach",
            Self::Destroy { .. } => "destroy",
        }
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attach {
                entity, component, ..
            } => f
                .debug_struct("Attach")
                .field("entity", entity)
                .field("component", &(**component).type_name())
                .finish(),
            Self::Detach {
                entity, type_name, ..
            } => f
                .debug_struct("Detach")
                .field("entity", entity)
                .field("component", type_name)
                .finish(),
            Self::Destroy { entity } => f.debug_struct("Destroy").field("entity", entity).finish(),
        }
    }
}

/// FIFO queue of [`Mutation`]s.
#[derive(Debug, Default)]
pub(crate) struct MutationQueue {
    pending: VecDeque<Mutation>,
}

impl MutationQueue {
    pub(crate) fn push(&mut self, mutation: Mutation) {
        self.pending.push_back(mutation);
    }

    pub(crate) fn pop_front(&mut self) -> Option<Mutation> {
        self.pending.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    /// Removes the latest pending attach of `type_id` to `entity`, provided
    /// no later detach or destroy for the same pair follows it.
    ///
    /// Used to make a repeated attach before a flush replace the earlier one
    /// instead of attaching twice.
    pub(crate) fn supersede_attach(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<Box<dyn Component>> {
        let position = self.pending.iter().rposition(|m| match m {
            Mutation::Attach {
                entity: e,
                type_id: t,
                ..
            }
            | Mutation::Detach {
                entity: e,
                type_id: t,
                ..
            } => *e == entity && *t == type_id,
            Mutation::Destroy { entity: e } => *e == entity,
        })?;
        if !matches!(self.pending[position], Mutation::Attach { .. }) {
            return None;
        }
        match self.pending.remove(position) {
            Some(Mutation::Attach { component, .. }) => Some(component),
            _ => None,
        }
    }

    /// Number of pending mutations that target `entity`.
    pub(crate) fn count_for(&self, entity: Entity) -> usize {
        self.pending.iter().filter(|m| m.entity() == entity).count()
    }
}
