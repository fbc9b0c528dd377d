//! Scene registry tests
//!
//! Tests for:
//! - Entity creation, explicit ids and lookup
//! - Component bookkeeping
//! - Settings
//! - Attribute replication scope and persistence round trips

use anyhow::Context;
use arbor::attribute::ReplicationScope;
use arbor::entity::{ComponentType, EntityId, EntityReference};
use arbor::errors::SceneError;
use arbor::scene::{AttachmentState, Mesh, NodeArena, PlaceableData, Scene, Transform};
use arbor::settings::SceneSettings;
use glam::{Quat, Vec3};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn entity_ids_are_sequential_and_skip_taken() {
    let mut scene = Scene::new();
    let explicit = scene.create_entity_with_id(2, "explicit").unwrap();

    let a = scene.create_entity("a");
    let b = scene.create_entity("b");
    assert_eq!(a.get(), 1);
    assert_eq!(b.get(), 3);
    assert_eq!(explicit.get(), 2);
    assert_eq!(scene.entities().map(|e| e.id.get()).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn explicit_ids_are_validated() {
    let mut scene = Scene::new();
    assert_eq!(
        scene.create_entity_with_id(0, "zero"),
        Err(SceneError::InvalidEntityId)
    );
    let id = scene.create_entity_with_id(7, "seven").unwrap();
    assert_eq!(
        scene.create_entity_with_id(7, "again"),
        Err(SceneError::EntityExists(id))
    );
}

#[test]
fn lookup_by_id_and_name() {
    let mut scene = Scene::new();
    let first = scene.create_entity("Lamp");
    let _second = scene.create_entity("Lamp");
    let other = scene.create_entity("Table");

    assert_eq!(scene.lookup(&EntityReference::Id(other)), Some(other));
    assert_eq!(scene.lookup(&EntityReference::from("Lamp")), Some(first));
    assert_eq!(scene.lookup(&EntityReference::from("Chair")), None);
    assert_eq!(scene.lookup(&EntityReference::None), None);
    assert_eq!(scene.lookup(&EntityId::new(40).unwrap().into()), None);
}

#[test]
fn component_bookkeeping() {
    let mut scene = Scene::new();
    let id = scene.create_entity("thing");

    scene.add_placeable(id).unwrap();
    scene.add_mesh(id, Mesh::new("thing.mesh")).unwrap();
    let entity = scene.entity(id).unwrap();
    assert!(entity.has_component(ComponentType::Placeable));
    assert!(entity.has_component(ComponentType::Mesh));

    assert_eq!(
        scene.add_placeable(id),
        Err(SceneError::ComponentExists {
            entity: id,
            component: ComponentType::Placeable
        })
    );

    let missing = EntityId::new(99).unwrap();
    assert_eq!(scene.add_placeable(missing), Err(SceneError::EntityNotFound(missing)));

    assert!(scene.remove_placeable(id));
    assert!(!scene.remove_placeable(id));
    assert!(scene.placeable(id).is_none());
    assert_eq!(
        scene.set_visible(id, false, ReplicationScope::Default),
        Err(SceneError::MissingComponent {
            entity: id,
            component: ComponentType::Placeable
        })
    );
}

#[test]
fn removing_entity_releases_graph_nodes() {
    let mut scene = Scene::new();
    let id = scene.create_entity("");
    scene.add_placeable(id).unwrap();
    assert_eq!(scene.graph().len(), 1);

    assert!(scene.remove_entity(id));
    assert!(!scene.remove_entity(id));
    assert!(scene.graph().is_empty());
    assert!(!scene.contains_entity(id));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_control_ids_and_scale_clamp() {
    init_logger();
    let settings = SceneSettings::from_json(r#"{ "min_scale": 0.01, "first_entity_id": 100 }"#).unwrap();
    let mut scene = Scene::with_settings(NodeArena::new(), settings);

    let id = scene.create_entity("");
    assert_eq!(id.get(), 100);
    scene
        .add_placeable_with(
            id,
            PlaceableData {
                transform: Transform::IDENTITY.with_scale(Vec3::new(0.0, 1.0, -2.0)),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        scene.placeable(id).unwrap().transform().scale,
        Vec3::new(0.01, 1.0, 0.01)
    );
}

#[test]
fn invalid_settings_are_sanitized() {
    init_logger();
    let scene = Scene::with_settings(
        NodeArena::new(),
        SceneSettings {
            min_scale: -1.0,
            first_entity_id: 0,
            ..Default::default()
        },
    );
    assert_eq!(scene.settings(), &SceneSettings::default());
    assert!(matches!(
        SceneSettings::from_json("{ not json"),
        Err(SceneError::Settings(_))
    ));
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn setters_record_replication_scope() {
    let mut scene = Scene::new();
    let id = scene.create_entity("");
    scene.add_placeable(id).unwrap();

    scene
        .set_transform(id, Transform::from_xyz(1.0, 0.0, 0.0), ReplicationScope::ReplicateAuthoritative)
        .unwrap();
    scene
        .set_parent_bone(id, "Hand", ReplicationScope::LocalOnly)
        .unwrap();

    let p = scene.placeable(id).unwrap();
    assert_eq!(p.transform_attribute().scope(), ReplicationScope::ReplicateAuthoritative);
    assert_eq!(p.parent_bone_attribute().scope(), ReplicationScope::LocalOnly);
    assert_eq!(p.parent_ref_attribute().scope(), ReplicationScope::Default);
    assert!(p.transform_attribute().metadata().interpolated);
    // Changed flags are consumed by the scene
    assert!(!p.transform_attribute().value_changed());
}

#[test]
fn visibility_is_forwarded_to_node() {
    let mut scene = Scene::new();
    let id = scene.create_entity("");
    scene.add_placeable(id).unwrap();
    scene
        .set_visible(id, false, ReplicationScope::Default)
        .unwrap();

    let node = scene.placeable(id).unwrap().node();
    assert!(!scene.graph().get(node).unwrap().visible);
}

#[test]
fn placeable_data_round_trips_through_json() -> anyhow::Result<()> {
    init_logger();
    let mut scene = Scene::new();
    let parent = scene.create_entity("Avatar");
    scene.add_placeable(parent)?;
    let id = scene.create_entity("");
    scene
        .add_placeable_with(
            id,
            PlaceableData {
                transform: Transform::from_xyz(1.0, 2.0, 3.0)
                    .with_rotation(Quat::from_xyzw(0.0, 0.6, 0.0, 0.8))
                    .with_scale(Vec3::splat(2.0)),
                parent_ref: EntityReference::from("Avatar"),
                parent_bone: String::new(),
                visible: false,
                selection_layer: 4,
                draw_debug: true,
            },
        )?;
    assert_eq!(scene.attachment_state(id), Some(AttachmentState::AttachedToPlaceable));

    let data = scene.placeable_data(id).context("placeable data")?;
    let json = serde_json::to_string(&data)?;
    let restored: PlaceableData = serde_json::from_str(&json)?;
    assert_eq!(restored, data);

    let copy = scene.create_entity("");
    scene.add_placeable(copy)?;
    scene
        .apply_placeable_data(copy, restored, ReplicationScope::Disconnected)?;
    assert_eq!(scene.placeable_data(copy).unwrap(), data);
    assert_eq!(scene.attachment_state(copy), Some(AttachmentState::AttachedToPlaceable));
    assert_eq!(scene.children(parent), vec![id, copy]);
    Ok(())
}

#[test]
fn apply_rejects_non_finite_data_atomically() {
    let mut scene = Scene::new();
    let id = scene.create_entity("");
    scene.add_placeable(id).unwrap();
    let before = scene.placeable_data(id).unwrap();

    let bad = PlaceableData {
        transform: Transform::IDENTITY.with_scale(Vec3::new(1.0, f32::NAN, 1.0)),
        visible: false,
        ..Default::default()
    };
    assert!(matches!(
        scene.apply_placeable_data(id, bad, ReplicationScope::Default),
        Err(SceneError::InvalidTransform(_))
    ));
    assert_eq!(scene.placeable_data(id).unwrap(), before);
}
