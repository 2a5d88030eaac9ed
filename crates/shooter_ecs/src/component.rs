//! Core [`Component`] trait, classification and shared base state.
//!
//! Every piece of data stored in the registry implements [`Component`]. The
//! trait is object safe: the registry keeps heterogeneous instances as
//! `Box<dyn Component>` in one table per concrete type, keyed by
//! [`ComponentTypeId`], and downcasts on typed lookups.
//!
//! ## Classification
//!
//! - [`ComponentCategory`] is a single, fixed classification per type, used
//!   for bulk queries ("every rendering component").
//! - [`ComponentTags`] is a per-instance set of capability flags that may
//!   change at runtime ("is this renderable right now?").

use std::any::{Any, TypeId};
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::hook::HookContext;

/// Identifies a concrete component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(TypeId);

impl ComponentTypeId {
    /// The identifier for component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self(TypeId::of::<T>())
    }

    /// The identifier of a type-erased instance.
    #[must_use]
    pub fn of_val(component: &dyn Component) -> Self {
        Self(component.as_any().type_id())
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({:?})", self.0)
    }
}

/// Static classification of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentCategory {
    Rendering,
    Gameplay,
    Physics,
    Audio,
    Input,
    Ai,
    Camera,
    Lighting,
    Weapon,
    Spatial,
}

impl ComponentCategory {
    /// All categories, in declaration order.
    pub const ALL: [ComponentCategory; 10] = [
        Self::Rendering,
        Self::Gameplay,
        Self::Physics,
        Self::Audio,
        Self::Input,
        Self::Ai,
        Self::Camera,
        Self::Lighting,
        Self::Weapon,
        Self::Spatial,
    ];

    /// Lowercase name, as used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rendering => "rendering",
            Self::Gameplay => "gameplay",
            Self::Physics => "physics",
            Self::Audio => "audio",
            Self::Input => "input",
            Self::Ai => "ai",
            Self::Camera => "camera",
            Self::Lighting => "lighting",
            Self::Weapon => "weapon",
            Self::Spatial => "spatial",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Runtime capability flags carried by each component instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ComponentTags: u32 {
        const SPATIAL      = 1 << 0;
        const RENDERABLE   = 1 << 1;
        const CAMERA       = 1 << 2;
        const LIGHT        = 1 << 3;
        const COLLIDABLE   = 1 << 4;
        const AUDIBLE      = 1 << 5;
        const CONTROLLABLE = 1 << 6;
        const WEAPON       = 1 << 7;
        const PLAYER       = 1 << 8;
        const ENEMY        = 1 << 9;
    }
}

impl Default for ComponentTags {
    fn default() -> Self {
        Self::empty()
    }
}

/// State every component carries: owner, tags and the enabled flag.
///
/// Concrete components embed one of these and hand it out through
/// [`Component::base`] / [`Component::base_mut`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentBase {
    owner: Option<Entity>,
    tags: ComponentTags,
    enabled: bool,
}

impl ComponentBase {
    /// A detached, enabled base with the given initial tags.
    #[must_use]
    pub fn new(tags: ComponentTags) -> Self {
        Self {
            owner: None,
            tags,
            enabled: true,
        }
    }

    /// The owning entity. `None` until the component is attached.
    #[must_use]
    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    /// Binds the owner at attach time. There is no public setter, so the
    /// owner cannot change while the component sits in a table.
    pub(crate) fn set_owner(&mut self, entity: Entity) {
        self.owner = Some(entity);
    }

    #[must_use]
    pub fn tags(&self) -> ComponentTags {
        self.tags
    }

    pub fn add_tags(&mut self, tags: ComponentTags) {
        self.tags.insert(tags);
    }

    pub fn remove_tags(&mut self, tags: ComponentTags) {
        self.tags.remove(tags);
    }

    /// Returns `true` if every flag in `tags` is set.
    #[must_use]
    pub fn has_tags(&self, tags: ComponentTags) -> bool {
        self.tags.contains(tags)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for ComponentBase {
    fn default() -> Self {
        Self::new(ComponentTags::empty())
    }
}

/// Upcasting helper implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Rust type name of the concrete type.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// The core component trait.
///
/// Lifecycle hooks fire in the order attach, enable, disable, detach, each
/// exactly once per transition. Hooks run while the instance is held outside
/// its table, so they may read and write other components of any type
/// through the [`HookContext`] but will not find themselves there.
///
/// # Examples
///
/// ```rust
/// use shooter_ecs::{Component, ComponentBase, ComponentCategory, ComponentTags};
///
/// #[derive(Debug)]
/// struct Health {
///     base: ComponentBase,
///     current: f32,
/// }
///
/// impl Component for Health {
///     fn category(&self) -> ComponentCategory {
///         ComponentCategory::Gameplay
///     }
///     fn base(&self) -> &ComponentBase {
///         &self.base
///     }
///     fn base_mut(&mut self) -> &mut ComponentBase {
///         &mut self.base
///     }
/// }
/// ```
pub trait Component: AsAny {
    /// Classification of this component's type. Must not vary per instance.
    fn category(&self) -> ComponentCategory;

    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    fn on_attach(&mut self, _ctx: &mut HookContext<'_>) {}

    fn on_enable(&mut self, _ctx: &mut HookContext<'_>) {}

    fn on_disable(&mut self, _ctx: &mut HookContext<'_>) {}

    fn on_detach(&mut self, _ctx: &mut HookContext<'_>) {}

    fn owner(&self) -> Option<Entity> {
        self.base().owner()
    }

    fn tags(&self) -> ComponentTags {
        self.base().tags()
    }

    fn has_tags(&self, tags: ComponentTags) -> bool {
        self.base().has_tags(tags)
    }

    fn add_tags(&mut self, tags: ComponentTags) {
        self.base_mut().add_tags(tags);
    }

    fn remove_tags(&mut self, tags: ComponentTags) {
        self.base_mut().remove_tags(tags);
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }
}
