//! Transform and NodeArena tests
//!
//! Tests for:
//! - Transform TRS operations and matrix decomposition
//! - Euler angle round-trip conversions
//! - look_at orientation
//! - NodeArena parenting, live world matrices and cached updates

use glam::{Affine3A, EulerRot, Quat, Vec3};
use arbor::scene::{NodeArena, NodeGraph, Transform};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

// ============================================================================
// Transform Unit Tests
// ============================================================================

#[test]
fn transform_default_is_identity() {
    let t = Transform::new();
    assert_eq!(t.position, Vec3::ZERO);
    assert_eq!(t.rotation, Quat::IDENTITY);
    assert_eq!(t.scale, Vec3::ONE);
    assert_eq!(t.matrix(), Affine3A::IDENTITY);
}

#[test]
fn transform_matrix_is_scale_rotate_translate() {
    let t = Transform::from_xyz(1.0, 2.0, 3.0)
        .with_rotation(Quat::from_rotation_z(FRAC_PI_2))
        .with_scale(Vec3::splat(2.0));

    // +X scaled to 2, rotated onto +Y, then translated
    let p = t.matrix().transform_point3(Vec3::X);
    assert!(vec3_approx(p, Vec3::new(1.0, 4.0, 3.0)));
}

#[test]
fn transform_from_matrix_decomposes() {
    let original = Transform::from_xyz(-4.0, 0.5, 9.0)
        .with_rotation(Quat::from_rotation_x(FRAC_PI_4))
        .with_scale(Vec3::new(1.0, 2.0, 3.0));
    let decomposed = Transform::from_matrix(&original.matrix());

    assert!(vec3_approx(decomposed.position, original.position));
    assert!(vec3_approx(decomposed.scale, original.scale));
    assert!(decomposed.rotation.angle_between(original.rotation) < 1e-4);
}

#[test]
fn transform_euler_round_trip() {
    let mut t = Transform::new();
    t.set_rotation_euler(0.3, -0.2, 0.1);
    assert!(vec3_approx(t.rotation_euler(), Vec3::new(0.3, -0.2, 0.1)));

    t.set_rotation_euler_with_order(FRAC_PI_2, 0.0, 0.0, EulerRot::YXZ);
    let forward = t.rotation * Vec3::NEG_Z;
    assert!(vec3_approx(forward, Vec3::new(-1.0, 0.0, 0.0)));
}

#[test]
fn transform_look_at_faces_target() {
    let mut t = Transform::from_xyz(0.0, 0.0, 5.0);
    t.look_at(Vec3::ZERO, Vec3::Y);
    assert!(vec3_approx(t.rotation * Vec3::NEG_Z, Vec3::NEG_Z));

    t.look_at(Vec3::new(10.0, 0.0, 5.0), Vec3::Y);
    assert!(vec3_approx(t.rotation * Vec3::NEG_Z, Vec3::X));
}

#[test]
fn transform_look_at_degenerate_keeps_rotation() {
    let mut t = Transform::from_xyz(0.0, 0.0, 0.0).with_rotation(Quat::from_rotation_y(0.5));
    t.look_at(Vec3::ZERO, Vec3::Y);
    assert_eq!(t.rotation, Quat::from_rotation_y(0.5));

    t.look_at(Vec3::new(0.0, 3.0, 0.0), Vec3::Y);
    assert_eq!(t.rotation, Quat::from_rotation_y(0.5));
}

// ============================================================================
// NodeArena
// ============================================================================

#[test]
fn arena_nodes_start_at_root() {
    let mut arena = NodeArena::new();
    let a = arena.create_node();
    let b = arena.create_node();
    assert_eq!(arena.root_nodes(), &[a, b]);
    assert_eq!(arena.parent(a), None);
}

#[test]
fn arena_reparent_updates_roots_and_children() {
    let mut arena = NodeArena::new();
    let parent = arena.create_node();
    let child = arena.create_node();

    arena.set_parent(child, Some(parent));
    assert_eq!(arena.root_nodes(), &[parent]);
    assert_eq!(arena.get(parent).unwrap().children(), &[child]);
    assert_eq!(arena.parent(child), Some(parent));

    arena.set_parent(child, None);
    assert_eq!(arena.root_nodes(), &[parent, child]);
    assert!(arena.get(parent).unwrap().children().is_empty());
}

#[test]
fn arena_world_matrix_is_live() {
    let mut arena = NodeArena::new();
    let parent = arena.create_node();
    let child = arena.create_node();
    arena.set_parent(child, Some(parent));
    arena.set_transform(child, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE);

    arena.set_transform(
        parent,
        Vec3::new(2.0, 0.0, 0.0),
        Quat::from_rotation_z(FRAC_PI_2),
        Vec3::ONE,
    );
    let world: Vec3 = arena.world_matrix(child).unwrap().translation.into();
    assert!(vec3_approx(world, Vec3::new(1.0, 0.0, 0.0)));
}

#[test]
fn arena_update_refreshes_cached_matrices() {
    let mut arena = NodeArena::new();
    let parent = arena.create_node();
    let child = arena.create_node();
    arena.set_parent(child, Some(parent));
    arena.set_transform(parent, Vec3::new(0.0, 0.0, 3.0), Quat::IDENTITY, Vec3::ONE);
    arena.set_transform(child, Vec3::X, Quat::IDENTITY, Vec3::ONE);

    arena.update();
    let cached: Vec3 = arena.get(child).unwrap().world_matrix().translation.into();
    assert!(vec3_approx(cached, Vec3::new(1.0, 0.0, 3.0)));

    // Only the parent changes; the child's cache follows
    arena.set_transform(parent, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
    arena.update();
    let cached: Vec3 = arena.get(child).unwrap().world_matrix().translation.into();
    assert!(vec3_approx(cached, Vec3::X));
}

#[test]
fn arena_destroy_releases_children_to_root() {
    let mut arena = NodeArena::new();
    let parent = arena.create_node();
    let child = arena.create_node();
    arena.set_parent(child, Some(parent));

    arena.destroy_node(parent);
    assert_eq!(arena.len(), 1);
    assert_eq!(arena.root_nodes(), &[child]);
    assert_eq!(arena.parent(child), None);
    assert!(arena.world_matrix(parent).is_none());
}
