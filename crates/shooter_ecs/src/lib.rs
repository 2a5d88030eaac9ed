//! # shooter_ecs
//!
//! The entity/component core of the shooter: who exists, what data they
//! carry, and when changes to either become visible.
//!
//! This crate provides:
//!
//! - [`Entity`]: opaque 128-bit generational handles.
//! - [`Component`] trait and [`ComponentBase`]: the shared contract every
//!   component type satisfies (category, tags, owner, lifecycle hooks).
//! - [`Registry`]: per-type component storage behind a deferred mutation
//!   queue, flushed once per frame by
//!   [`Registry::process_pending_operations`].
//! - [`HookContext`]: what a lifecycle hook may touch while it runs.

pub mod component;
pub mod entity;
pub mod hook;
mod mutation;
pub mod registry;

pub use component::{AsAny, Component, ComponentBase, ComponentCategory, ComponentTags, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, RegistryId};
pub use hook::HookContext;
pub use registry::Registry;
