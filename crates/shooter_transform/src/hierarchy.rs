//! Hierarchy and local-state operations on [`Transform`]s held by a
//! [`Registry`].
//!
//! Anything that changes a node's local pose or parent lives here, because
//! it must also reach the node's descendants (dirty propagation) or other
//! nodes (children lists), which only the registry can resolve.
//!
//! Reparenting requires the new parent's `Transform` to be flushed. A parent
//! whose transform is still pending is rejected with
//! [`HierarchyError::ParentNotFlushed`]; flush first, then reparent.

use std::collections::VecDeque;

use glam::{Mat3, Mat4, Quat, Vec3};
use shooter_ecs::{Entity, Registry};
use thiserror::Error;
use tracing::{debug, warn};

use crate::transform::Transform;

/// Why a hierarchy change was refused. Never fatal: the hierarchy is left
/// exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("entity {0} has no flushed transform")]
    MissingTransform(Entity),
    /// The parent's transform is pending, removed, or was never attached.
    #[error("parent {0} has no flushed transform")]
    ParentNotFlushed(Entity),
    #[error("entity {0} cannot be its own parent")]
    SelfParent(Entity),
    #[error("parenting {child} under {parent} would create a cycle")]
    Cycle { child: Entity, parent: Entity },
}

/// Marks `root` Dirty along with every Clean descendant.
///
/// Stops descending at nodes that are already Dirty, since their subtrees
/// are Dirty too.
pub(crate) fn invalidate_subtree(registry: &Registry, root: Entity) {
    let Some(node) = registry.get_component::<Transform>(root) else {
        return;
    };
    node.mark_dirty();
    let mut stack: Vec<Entity> = node.children().to_vec();
    while let Some(entity) = stack.pop() {
        let Some(node) = registry.get_component::<Transform>(entity) else {
            continue;
        };
        if node.is_dirty() {
            continue;
        }
        node.mark_dirty();
        stack.extend_from_slice(node.children());
    }
}

fn modify_local(
    registry: &mut Registry,
    entity: Entity,
    op: &'static str,
    change: impl FnOnce(&mut Transform),
) -> bool {
    let Some(transform) = registry.get_component_mut::<Transform>(entity) else {
        warn!(%entity, op, "entity has no flushed transform; change ignored");
        return false;
    };
    change(transform);
    invalidate_subtree(registry, entity);
    true
}

fn parent_world_matrix(registry: &Registry, entity: Entity) -> Mat4 {
    registry
        .get_component::<Transform>(entity)
        .and_then(Transform::parent)
        .and_then(|parent| registry.get_component::<Transform>(parent))
        .map_or(Mat4::IDENTITY, |parent| parent.world_matrix(registry))
}

fn reparent(registry: &mut Registry, child: Entity, parent: Option<Entity>) -> Result<(), HierarchyError> {
    let old_parent = registry
        .get_component::<Transform>(child)
        .ok_or(HierarchyError::MissingTransform(child))?
        .parent();
    if old_parent == parent {
        return Ok(());
    }
    if let Some(parent) = parent {
        if parent == child {
            return Err(HierarchyError::SelfParent(child));
        }
        if !registry.has_component::<Transform>(parent) {
            return Err(HierarchyError::ParentNotFlushed(parent));
        }
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(HierarchyError::Cycle { child, parent });
            }
            cursor = registry.get_component::<Transform>(node).and_then(Transform::parent);
        }
    }

    if let Some(old) = old_parent
        && let Some(old_transform) = registry.get_component_mut::<Transform>(old)
    {
        old_transform.remove_child(child);
    }
    if let Some(new) = parent
        && let Some(new_transform) = registry.get_component_mut::<Transform>(new)
    {
        new_transform.add_child(child);
    }
    if let Some(child_transform) = registry.get_component_mut::<Transform>(child) {
        child_transform.set_parent_link(parent);
    }
    invalidate_subtree(registry, child);
    Ok(())
}

/// Transform operations that need the whole registry.
///
/// Setters return `false` (and log a warning) when the entity has no
/// flushed `Transform`; getters return `None`.
pub trait TransformExt {
    fn set_local_position(&mut self, entity: Entity, position: Vec3) -> bool;
    fn set_local_rotation(&mut self, entity: Entity, rotation: Quat) -> bool;
    fn set_local_scale(&mut self, entity: Entity, scale: Vec3) -> bool;

    /// Moves by `delta` in the parent's space.
    fn translate(&mut self, entity: Entity, delta: Vec3) -> bool;

    /// Applies `rotation` on top of the current local rotation.
    fn rotate(&mut self, entity: Entity, rotation: Quat) -> bool;

    /// Sets the local position so that the world position becomes
    /// `position`.
    fn set_world_position(&mut self, entity: Entity, position: Vec3) -> bool;

    /// Turns the node so its forward (-Z) axis points at `target`. Fails if
    /// `target` coincides with the node's position or lies along `up`.
    fn look_at(&mut self, entity: Entity, target: Vec3, up: Vec3) -> bool;

    /// Reassigns the parent, updating both parents' children immediately.
    fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> Result<(), HierarchyError>;

    fn parent_of(&self, entity: Entity) -> Option<Entity>;
    fn children_of(&self, entity: Entity) -> Vec<Entity>;

    /// Every descendant in depth-first pre-order.
    fn descendants_of(&self, entity: Entity) -> Vec<Entity>;

    /// Every flushed transform without a parent.
    fn root_transforms(&self) -> Vec<Entity>;

    fn world_matrix(&self, entity: Entity) -> Option<Mat4>;
    fn world_position(&self, entity: Entity) -> Option<Vec3>;
    fn world_rotation(&self, entity: Entity) -> Option<Quat>;
    fn world_scale(&self, entity: Entity) -> Option<Vec3>;

    /// Queues destruction of `entity` and its whole subtree, parents first.
    fn destroy_recursive(&mut self, entity: Entity);
}

impl TransformExt for Registry {
    fn set_local_position(&mut self, entity: Entity, position: Vec3) -> bool {
        modify_local(self, entity, "set_local_position", |t| t.local_mut().position = position)
    }

    fn set_local_rotation(&mut self, entity: Entity, rotation: Quat) -> bool {
        modify_local(self, entity, "set_local_rotation", |t| {
            t.local_mut().rotation = rotation.normalize();
        })
    }

    fn set_local_scale(&mut self, entity: Entity, scale: Vec3) -> bool {
        modify_local(self, entity, "set_local_scale", |t| t.local_mut().scale = scale)
    }

    fn translate(&mut self, entity: Entity, delta: Vec3) -> bool {
        modify_local(self, entity, "translate", |t| t.local_mut().position += delta)
    }

    fn rotate(&mut self, entity: Entity, rotation: Quat) -> bool {
        modify_local(self, entity, "rotate", |t| {
            let local = t.local_mut();
            *local = local.rotated(rotation);
        })
    }

    fn set_world_position(&mut self, entity: Entity, position: Vec3) -> bool {
        let local = parent_world_matrix(self, entity)
            .inverse()
            .transform_point3(position);
        modify_local(self, entity, "set_world_position", |t| t.local_mut().position = local)
    }

    fn look_at(&mut self, entity: Entity, target: Vec3, up: Vec3) -> bool {
        let Some(eye) = TransformExt::world_position(self, entity) else {
            warn!(%entity, "look_at on entity without flushed transform ignored");
            return false;
        };
        let back = (eye - target).normalize_or_zero();
        let right = up.cross(back).normalize_or_zero();
        if back == Vec3::ZERO || right == Vec3::ZERO {
            debug!(%entity, "look_at target degenerate; rotation unchanged");
            return false;
        }
        let world_rotation = Quat::from_mat3(&Mat3::from_cols(right, back.cross(right), back));
        let (_, parent_rotation, _) = parent_world_matrix(self, entity).to_scale_rotation_translation();
        let local = (parent_rotation.inverse() * world_rotation).normalize();
        modify_local(self, entity, "look_at", |t| t.local_mut().rotation = local)
    }

    fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> Result<(), HierarchyError> {
        let result = reparent(self, child, parent);
        match &result {
            Ok(()) => debug!(%child, parent = ?parent, "reparented"),
            Err(error) => warn!(%child, %error, "reparent rejected"),
        }
        result
    }

    fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.get_component::<Transform>(entity)?.parent()
    }

    fn children_of(&self, entity: Entity) -> Vec<Entity> {
        self.get_component::<Transform>(entity)
            .map(|t| t.children().to_vec())
            .unwrap_or_default()
    }

    fn descendants_of(&self, entity: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack: Vec<Entity> = self.children_of(entity).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children_of(node).into_iter().rev());
        }
        out
    }

    fn root_transforms(&self) -> Vec<Entity> {
        self.components::<Transform>()
            .filter(|(_, t)| t.parent().is_none())
            .map(|(entity, _)| entity)
            .collect()
    }

    fn world_matrix(&self, entity: Entity) -> Option<Mat4> {
        Some(self.get_component::<Transform>(entity)?.world_matrix(self))
    }

    fn world_position(&self, entity: Entity) -> Option<Vec3> {
        Some(self.get_component::<Transform>(entity)?.world_position(self))
    }

    fn world_rotation(&self, entity: Entity) -> Option<Quat> {
        Some(self.get_component::<Transform>(entity)?.world_rotation(self))
    }

    fn world_scale(&self, entity: Entity) -> Option<Vec3> {
        Some(self.get_component::<Transform>(entity)?.world_scale(self))
    }

    fn destroy_recursive(&mut self, entity: Entity) {
        let mut queue = VecDeque::from([entity]);
        while let Some(node) = queue.pop_front() {
            queue.extend(self.children_of(node));
            self.destroy_entity(node);
        }
    }
}
