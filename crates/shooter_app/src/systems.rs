//! Systems driven by the frame loop, and the demo scene built from them.

use shooter_ecs::{Component, ComponentBase, ComponentCategory, ComponentTags, Entity, Registry};
use shooter_transform::{Quat, Transform, TransformExt, Vec3};
use tracing::{debug, info};

use crate::config::FrameConfig;

/// A unit of per-frame game logic.
///
/// Systems run after the frame's flush, so every read sees that frame's
/// snapshot. Structural changes they request land at the next flush.
pub trait System {
    fn name(&self) -> &'static str;
    fn update(&mut self, registry: &mut Registry, dt: f32);
}

/// Constant angular velocity applied by [`Spinner`].
#[derive(Debug)]
pub struct Spin {
    base: ComponentBase,
    pub axis: Vec3,
    /// Radians per second.
    pub speed: f32,
}

impl Spin {
    #[must_use]
    pub fn new(axis: Vec3, speed: f32) -> Self {
        Self {
            base: ComponentBase::new(ComponentTags::CONTROLLABLE),
            axis: axis.try_normalize().unwrap_or(Vec3::Y),
            speed,
        }
    }
}

impl Component for Spin {
    fn category(&self) -> ComponentCategory {
        ComponentCategory::Gameplay
    }

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

struct Spawned {
    root: Entity,
    leaf: Entity,
    born: u64,
}

/// Keeps `spawn_count` transform chains alive, replacing each one after
/// `lifetime_frames`.
pub struct Spawner {
    spawn_count: usize,
    depth: usize,
    lifetime: u64,
    frame: u64,
    live: Vec<Spawned>,
}

impl Spawner {
    #[must_use]
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            spawn_count: config.spawn_count,
            depth: config.hierarchy_depth.max(1),
            lifetime: config.lifetime_frames,
            frame: 0,
            live: Vec::new(),
        }
    }

    /// Leaves of the chains spawned so far.
    pub fn leaves(&self) -> impl Iterator<Item = Entity> + '_ {
        self.live.iter().map(|s| s.leaf)
    }

    /// Enqueues a spinning root with `depth - 1` descendants, each offset one
    /// unit along +X from its parent. Attaches are enqueued parent first, so
    /// every child finds its parent flushed when it attaches.
    fn spawn_chain(&self, registry: &mut Registry, slot: usize) -> Spawned {
        let root = registry.create_entity();
        registry.add_component(root, Transform::from_xyz(0.0, 0.0, -(slot as f32) * 4.0));
        registry.add_component(root, Spin::new(Vec3::Y, 1.0 + slot as f32 * 0.5));

        let mut parent = root;
        for _ in 1..self.depth {
            let node = registry.create_entity();
            registry.add_component(node, Transform::from_xyz(1.0, 0.0, 0.0).with_parent(parent));
            parent = node;
        }
        Spawned {
            root,
            leaf: parent,
            born: self.frame,
        }
    }
}

impl System for Spawner {
    fn name(&self) -> &'static str {
        "spawner"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        self.frame += 1;

        if self.lifetime > 0 {
            let frame = self.frame;
            let lifetime = self.lifetime;
            self.live.retain(|spawned| {
                if frame - spawned.born < lifetime {
                    return true;
                }
                debug!(root = %spawned.root, "despawning hierarchy");
                registry.destroy_recursive(spawned.root);
                false
            });
        }

        for slot in self.live.len()..self.spawn_count {
            let spawned = self.spawn_chain(registry, slot);
            debug!(root = %spawned.root, leaf = %spawned.leaf, "spawned hierarchy");
            self.live.push(spawned);
        }
    }
}

/// Rotates every entity carrying an enabled [`Spin`].
#[derive(Debug, Default)]
pub struct Spinner;

impl System for Spinner {
    fn name(&self) -> &'static str {
        "spinner"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let turns: Vec<(Entity, Quat)> = registry
            .components::<Spin>()
            .filter(|(_, spin)| spin.is_enabled())
            .map(|(entity, spin)| (entity, Quat::from_axis_angle(spin.axis, spin.speed * dt)))
            .collect();
        for (entity, turn) in turns {
            registry.rotate(entity, turn);
        }
    }
}

/// Logs registry counts and one leaf's world position every `interval`
/// frames.
#[derive(Debug)]
pub struct Reporter {
    interval: u64,
    frame: u64,
}

impl Reporter {
    #[must_use]
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            frame: 0,
        }
    }

    /// A flushed transform with a parent and no children, if any.
    fn find_leaf(registry: &Registry) -> Option<Entity> {
        registry
            .components::<Transform>()
            .find(|(_, t)| t.parent().is_some() && t.children().is_empty())
            .map(|(entity, _)| entity)
    }
}

impl System for Reporter {
    fn name(&self) -> &'static str {
        "reporter"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        self.frame += 1;
        if self.frame % self.interval != 0 {
            return;
        }
        let leaf = Self::find_leaf(registry);
        let leaf_position = leaf.and_then(|e| registry.world_position(e));
        info!(
            frame = self.frame,
            entities = registry.entity_count(),
            transforms = registry.component_count::<Transform>(),
            spatial = registry.components_in_category(ComponentCategory::Spatial).len(),
            pending = registry.pending_count(),
            leaf = ?leaf,
            leaf_position = ?leaf_position,
            "registry report"
        );
    }
}
