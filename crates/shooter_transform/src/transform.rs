//! Hierarchical 3D transform component.
//!
//! [`Pose`] is a plain position/rotation/scale value. [`Transform`] is the
//! component: a local [`Pose`], an optional parent entity, the derived list of
//! children, and lazily computed local and world matrices.
//!
//! ## Matrix cache
//!
//! Each node is either Clean (world matrix cached) or Dirty (not cached);
//! new transforms start Dirty. Reading the world matrix of a Dirty node
//! recomputes it from the parent's world matrix, which recursively cleans the
//! ancestor chain. Local changes go through
//! [`TransformExt`](crate::TransformExt), which marks the node and every
//! Clean descendant Dirty. A Dirty node never has a Clean descendant.

use std::cell::Cell;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use shooter_ecs::{Component, ComponentBase, ComponentCategory, ComponentTags, Entity, HookContext, Registry};
use tracing::warn;

use crate::hierarchy;

/// Position, rotation and non-uniform scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Pose {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// `translate(position) * rotate(rotation) * scale(scale)`.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Decomposes an affine matrix back into a pose.
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }

    /// Applies `rotation` on top of the current rotation.
    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = (rotation * self.rotation).normalize();
        self
    }

    #[must_use]
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale *= factor;
        self
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Spatial component with parent/child hierarchy and cached matrices.
///
/// Parent and children are entity handles resolved through the registry, so
/// a node's lifetime is independent of the hierarchy it sits in.
#[derive(Debug)]
pub struct Transform {
    base: ComponentBase,
    local: Pose,
    parent: Option<Entity>,
    children: Vec<Entity>,
    local_matrix: Cell<Option<Mat4>>,
    world_matrix: Cell<Option<Mat4>>,
}

impl Transform {
    /// Identity transform with no parent.
    #[must_use]
    pub fn new() -> Self {
        Self::from_pose(Pose::IDENTITY)
    }

    #[must_use]
    pub fn from_pose(local: Pose) -> Self {
        Self {
            base: ComponentBase::new(ComponentTags::SPATIAL),
            local,
            parent: None,
            children: Vec::new(),
            local_matrix: Cell::new(None),
            world_matrix: Cell::new(None),
        }
    }

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self::from_pose(Pose::from_position(position))
    }

    #[must_use]
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_position(Vec3::new(x, y, z))
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.local.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.local.scale = scale;
        self
    }

    /// Requests `parent` as this node's parent once attached.
    ///
    /// The parent's own `Transform` must already be flushed when this one
    /// attaches; otherwise the request is dropped with a warning and the
    /// node attaches as a root.
    #[must_use]
    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn local(&self) -> Pose {
        self.local
    }

    #[must_use]
    pub fn local_position(&self) -> Vec3 {
        self.local.position
    }

    #[must_use]
    pub fn local_rotation(&self) -> Quat {
        self.local.rotation
    }

    #[must_use]
    pub fn local_scale(&self) -> Vec3 {
        self.local.scale
    }

    #[must_use]
    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// `true` while the world matrix is not cached.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.world_matrix.get().is_none()
    }

    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        if let Some(matrix) = self.local_matrix.get() {
            return matrix;
        }
        let matrix = self.local.to_matrix();
        self.local_matrix.set(Some(matrix));
        matrix
    }

    /// `parent.world_matrix * local_matrix`, or just the local matrix for a
    /// root or a node whose parent has no flushed transform.
    #[must_use]
    pub fn world_matrix(&self, registry: &Registry) -> Mat4 {
        if let Some(matrix) = self.world_matrix.get() {
            return matrix;
        }
        let local = self.local_matrix();
        let matrix = match self.parent.and_then(|p| registry.get_component::<Transform>(p)) {
            Some(parent) => parent.world_matrix(registry) * local,
            None => local,
        };
        self.world_matrix.set(Some(matrix));
        matrix
    }

    #[must_use]
    pub fn world_position(&self, registry: &Registry) -> Vec3 {
        self.world_matrix(registry).w_axis.truncate()
    }

    #[must_use]
    pub fn world_rotation(&self, registry: &Registry) -> Quat {
        Pose::from_matrix(&self.world_matrix(registry)).rotation
    }

    #[must_use]
    pub fn world_scale(&self, registry: &Registry) -> Vec3 {
        Pose::from_matrix(&self.world_matrix(registry)).scale
    }

    /// World-space viewing direction (-Z).
    #[must_use]
    pub fn forward(&self, registry: &Registry) -> Vec3 {
        (self.world_rotation(registry) * Vec3::NEG_Z).normalize_or_zero()
    }

    #[must_use]
    pub fn right(&self, registry: &Registry) -> Vec3 {
        (self.world_rotation(registry) * Vec3::X).normalize_or_zero()
    }

    #[must_use]
    pub fn up(&self, registry: &Registry) -> Vec3 {
        (self.world_rotation(registry) * Vec3::Y).normalize_or_zero()
    }

    /// Mutable local pose. Drops both cached matrices of this node only;
    /// descendants are invalidated by the caller.
    pub(crate) fn local_mut(&mut self) -> &mut Pose {
        self.local_matrix.set(None);
        self.mark_dirty();
        &mut self.local
    }

    pub(crate) fn mark_dirty(&self) {
        self.world_matrix.set(None);
    }

    pub(crate) fn set_parent_link(&mut self, parent: Option<Entity>) {
        self.parent = parent;
        self.mark_dirty();
    }

    pub(crate) fn add_child(&mut self, child: Entity) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: Entity) {
        self.children.retain(|c| *c != child);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Transform {
    fn category(&self) -> ComponentCategory {
        ComponentCategory::Spatial
    }

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    /// Registers with the requested parent, if it has a flushed transform.
    fn on_attach(&mut self, ctx: &mut HookContext<'_>) {
        let entity = ctx.entity();
        self.children.clear();
        self.local_matrix.set(None);
        self.mark_dirty();
        let Some(parent) = self.parent else {
            return;
        };
        if parent == entity {
            warn!(%entity, "transform cannot parent itself; attached as root");
            self.parent = None;
            return;
        }
        match ctx.get_mut::<Transform>(parent) {
            Some(parent_transform) => parent_transform.add_child(entity),
            None => {
                warn!(%entity, %parent, "parent has no flushed transform; attached as root");
                self.parent = None;
            }
        }
    }

    /// Unlinks from the parent and orphans every child.
    fn on_detach(&mut self, ctx: &mut HookContext<'_>) {
        let entity = ctx.entity();
        if let Some(parent) = self.parent.take()
            && let Some(parent_transform) = ctx.get_mut::<Transform>(parent)
        {
            parent_transform.remove_child(entity);
        }
        for child in std::mem::take(&mut self.children) {
            if let Some(child_transform) = ctx.get_mut::<Transform>(child) {
                child_transform.set_parent_link(None);
            }
            hierarchy::invalidate_subtree(ctx.registry(), child);
        }
    }
}
