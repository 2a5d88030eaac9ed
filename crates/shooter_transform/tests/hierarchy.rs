use shooter_ecs::{Component, ComponentTags, Entity, Registry};
use shooter_transform::{HierarchyError, Quat, Transform, TransformExt, Vec3};

fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1e-4
}

fn spawn(registry: &mut Registry, transform: Transform) -> Entity {
    let entity = registry.create_entity();
    registry.add_component(entity, transform);
    entity
}

fn transform(registry: &Registry, entity: Entity) -> &Transform {
    registry.get_component::<Transform>(entity).unwrap()
}

/// root -> mid (1,0,0) -> leaf (0,1,0), each flushed before its child.
fn three_level_chain(registry: &mut Registry) -> (Entity, Entity, Entity) {
    let root = spawn(registry, Transform::new());
    registry.process_pending_operations();
    let mid = spawn(registry, Transform::from_xyz(1.0, 0.0, 0.0).with_parent(root));
    registry.process_pending_operations();
    let leaf = spawn(registry, Transform::from_xyz(0.0, 1.0, 0.0).with_parent(mid));
    registry.process_pending_operations();
    (root, mid, leaf)
}

#[test]
fn test_world_position_composes_through_chain() {
    let mut registry = Registry::new();
    let (_, mid, leaf) = three_level_chain(&mut registry);

    assert!(approx(registry.world_position(leaf).unwrap(), Vec3::new(1.0, 1.0, 0.0)));

    registry.set_local_position(mid, Vec3::new(2.0, 0.0, 0.0));
    assert!(transform(&registry, leaf).is_dirty());
    assert!(approx(registry.world_position(leaf).unwrap(), Vec3::new(2.0, 1.0, 0.0)));
}

#[test]
fn test_rotated_parent_rotates_child_offset() {
    let mut registry = Registry::new();
    let (root, _, leaf) = three_level_chain(&mut registry);

    registry.set_local_rotation(root, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
    // mid at (0,1,0), leaf offset (0,1,0) rotated to (-1,0,0)
    assert!(approx(registry.world_position(leaf).unwrap(), Vec3::new(-1.0, 1.0, 0.0)));
}

#[test]
fn test_dirty_never_has_clean_descendant() {
    let mut registry = Registry::new();
    let (root, mid, leaf) = three_level_chain(&mut registry);

    let _ = registry.world_matrix(leaf);
    for e in [root, mid, leaf] {
        assert!(!transform(&registry, e).is_dirty());
    }

    registry.translate(root, Vec3::Z);
    for e in [root, mid, leaf] {
        assert!(transform(&registry, e).is_dirty());
    }

    // Reading mid cleans the ancestor chain only.
    let _ = registry.world_matrix(mid);
    assert!(!transform(&registry, root).is_dirty());
    assert!(!transform(&registry, mid).is_dirty());
    assert!(transform(&registry, leaf).is_dirty());
}

#[test]
fn test_parent_and_children_stay_symmetric() {
    let mut registry = Registry::new();
    let (root, mid, leaf) = three_level_chain(&mut registry);

    assert_eq!(registry.children_of(root), vec![mid]);
    assert_eq!(registry.parent_of(mid), Some(root));
    assert_eq!(registry.children_of(mid), vec![leaf]);

    registry.set_parent(leaf, Some(root)).unwrap();
    assert_eq!(registry.children_of(root), vec![mid, leaf]);
    assert!(registry.children_of(mid).is_empty());
    assert_eq!(transform(&registry, leaf).parent(), Some(root));
    assert!(approx(registry.world_position(leaf).unwrap(), Vec3::new(0.0, 1.0, 0.0)));
}

#[test]
fn test_parent_attached_earlier_in_same_flush_links() {
    let mut registry = Registry::new();
    let parent = spawn(&mut registry, Transform::from_xyz(5.0, 0.0, 0.0));
    let child = spawn(&mut registry, Transform::from_xyz(1.0, 0.0, 0.0).with_parent(parent));
    registry.process_pending_operations();

    assert_eq!(registry.parent_of(child), Some(parent));
    assert!(approx(registry.world_position(child).unwrap(), Vec3::new(6.0, 0.0, 0.0)));
}

#[test]
fn test_parent_attached_later_in_same_flush_leaves_root() {
    let mut registry = Registry::new();
    let parent = registry.create_entity();
    let child = spawn(&mut registry, Transform::from_xyz(1.0, 0.0, 0.0).with_parent(parent));
    registry.add_component(parent, Transform::from_xyz(5.0, 0.0, 0.0));
    registry.process_pending_operations();

    assert_eq!(registry.parent_of(child), None);
    assert!(registry.children_of(parent).is_empty());
    assert!(approx(registry.world_position(child).unwrap(), Vec3::new(1.0, 0.0, 0.0)));
}

#[test]
fn test_reparent_onto_pending_transform_is_rejected() {
    let mut registry = Registry::new();
    let child = spawn(&mut registry, Transform::new());
    registry.process_pending_operations();
    let parent = spawn(&mut registry, Transform::new());

    let err = registry.set_parent(child, Some(parent)).unwrap_err();
    assert_eq!(err, HierarchyError::ParentNotFlushed(parent));
    assert_eq!(registry.parent_of(child), None);
}

#[test]
fn test_cycle_is_rejected_and_hierarchy_unchanged() {
    let mut registry = Registry::new();
    let (root, mid, leaf) = three_level_chain(&mut registry);

    let err = registry.set_parent(root, Some(leaf)).unwrap_err();
    assert_eq!(err, HierarchyError::Cycle { child: root, parent: leaf });
    assert_eq!(registry.descendants_of(root), vec![mid, leaf]);
    assert_eq!(registry.parent_of(root), None);
}

#[test]
fn test_destroying_parent_orphans_children() {
    let mut registry = Registry::new();
    let (root, mid, leaf) = three_level_chain(&mut registry);
    let _ = registry.world_matrix(leaf);

    registry.destroy_entity(mid);
    registry.process_pending_operations();

    assert!(!registry.is_alive(mid));
    assert!(registry.children_of(root).is_empty());
    assert_eq!(registry.parent_of(leaf), None);
    assert!(transform(&registry, leaf).is_dirty());
    assert!(approx(registry.world_position(leaf).unwrap(), Vec3::new(0.0, 1.0, 0.0)));
}

#[test]
fn test_removing_transform_orphans_children() {
    let mut registry = Registry::new();
    let (_, mid, leaf) = three_level_chain(&mut registry);

    registry.remove_component::<Transform>(mid);
    registry.process_pending_operations();

    assert!(registry.is_alive(mid));
    assert_eq!(registry.parent_of(leaf), None);
}

#[test]
fn test_destroy_recursive_removes_subtree() {
    let mut registry = Registry::new();
    let (root, mid, leaf) = three_level_chain(&mut registry);
    let other = spawn(&mut registry, Transform::new());
    registry.process_pending_operations();

    registry.destroy_recursive(mid);
    assert!(registry.is_alive(leaf));
    registry.process_pending_operations();

    assert!(!registry.is_alive(mid));
    assert!(!registry.is_alive(leaf));
    assert!(registry.is_alive(root));
    assert!(registry.is_alive(other));
    assert!(registry.children_of(root).is_empty());
}

#[test]
fn test_thousand_transforms_after_one_flush() {
    let mut registry = Registry::new();
    let entities: Vec<Entity> = (0..1000)
        .map(|i| spawn(&mut registry, Transform::from_xyz(i as f32, 0.0, 0.0)))
        .collect();
    assert_eq!(registry.component_count::<Transform>(), 0);

    registry.process_pending_operations();
    assert_eq!(registry.component_count::<Transform>(), 1000);
    assert_eq!(registry.components_with_tags(ComponentTags::SPATIAL).len(), 1000);
    for (i, e) in entities.iter().enumerate() {
        assert!(approx(registry.world_position(*e).unwrap(), Vec3::new(i as f32, 0.0, 0.0)));
        assert_eq!(transform(&registry, *e).owner(), Some(*e));
    }
}

#[test]
fn test_look_at_in_child_space() {
    let mut registry = Registry::new();
    let parent = spawn(
        &mut registry,
        Transform::new().with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
    );
    registry.process_pending_operations();
    let eye = spawn(&mut registry, Transform::new().with_parent(parent));
    registry.process_pending_operations();

    assert!(registry.look_at(eye, Vec3::new(0.0, 0.0, -10.0), Vec3::Y));
    let forward = transform(&registry, eye).forward(&registry);
    assert!(approx(forward, Vec3::NEG_Z));
}

#[test]
fn test_world_scale_multiplies_down_chain() {
    let mut registry = Registry::new();
    let (root, mid, leaf) = three_level_chain(&mut registry);
    registry.set_local_scale(root, Vec3::splat(2.0));
    registry.set_local_scale(mid, Vec3::splat(3.0));

    assert!(approx(registry.world_scale(leaf).unwrap(), Vec3::splat(6.0)));
    // mid offset (1,0,0)*2, leaf offset (0,1,0)*6
    assert!(approx(registry.world_position(leaf).unwrap(), Vec3::new(2.0, 6.0, 0.0)));
}
