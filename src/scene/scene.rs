use std::collections::BTreeMap;

use glam::{Affine3A, Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::attribute::ReplicationScope;
use crate::entity::{ComponentType, Entity, EntityId, EntityReference};
use crate::errors::{Result, SceneError};
use crate::scene::NodeHandle;
use crate::scene::bone_bridge::{BoneAttachment, BoneAttachmentBridge, BoneKey};
use crate::scene::graph::{NodeArena, NodeGraph};
use crate::scene::placeable::{AttachmentState, Placeable, PlaceableData};
use crate::scene::skeleton::{BoneSource, Mesh, Skeleton};
use crate::scene::subscriptions::{Subscriptions, Trigger};
use crate::scene::transform::Transform;
use crate::scene::wrapper::PlaceableMut;
use crate::settings::SceneSettings;

/// Entity registry and transform hierarchy.
///
/// The scene owns every entity, its placeable and mesh components, the
/// bone attachment bridge and the node graph collaborator `G`. All mutation
/// goes through the scene so that attachment resolution runs synchronously
/// before each call returns:
///
/// - Creating an entity or adding a component wakes placeables waiting on it
/// - Changing `parentRef`/`parentBone` re-resolves the placeable at once
/// - Removing a placeable, mesh or entity re-resolves everything attached to it
///
/// Parent links are stored as [`EntityId`]s and looked up on demand; no
/// component ever holds a reference to another.
pub struct Scene<G: NodeGraph = NodeArena> {
    pub(crate) settings: SceneSettings,
    pub(crate) graph: G,

    pub(crate) entities: BTreeMap<EntityId, Entity>,
    next_id: u32,

    // ==== Components ====
    pub(crate) placeables: FxHashMap<EntityId, Placeable>,
    pub(crate) meshes: FxHashMap<EntityId, Mesh>,

    pub(crate) bones: BoneAttachmentBridge,
    pub(crate) subscriptions: Subscriptions,
}

impl Scene<NodeArena> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_graph(NodeArena::new())
    }
}

impl Default for Scene<NodeArena> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: NodeGraph> Scene<G> {
    pub fn with_graph(graph: G) -> Self {
        Self::with_settings(graph, SceneSettings::default())
    }

    pub fn with_settings(graph: G, mut settings: SceneSettings) -> Self {
        settings.sanitize();
        Self {
            next_id: settings.first_entity_id,
            settings,
            graph,
            entities: BTreeMap::new(),
            placeables: FxHashMap::default(),
            meshes: FxHashMap::default(),
            bones: BoneAttachmentBridge::new(),
            subscriptions: Subscriptions::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    /// The node graph collaborator.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &G {
        &self.graph
    }

    // ========================================================================
    // Entity registry
    // ========================================================================

    /// Creates an entity with the next free id.
    pub fn create_entity(&mut self, name: &str) -> EntityId {
        let id = loop {
            let candidate = EntityId::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(id) = candidate
                && !self.entities.contains_key(&id)
            {
                break id;
            }
        };
        self.insert_entity(id, name);
        id
    }

    /// Creates an entity with an externally assigned id (e.g. replicated).
    pub fn create_entity_with_id(&mut self, raw: u32, name: &str) -> Result<EntityId> {
        let id = EntityId::new(raw).ok_or(SceneError::InvalidEntityId)?;
        if self.entities.contains_key(&id) {
            return Err(SceneError::EntityExists(id));
        }
        self.insert_entity(id, name);
        Ok(id)
    }

    fn insert_entity(&mut self, id: EntityId, name: &str) {
        self.entities.insert(id, Entity::new(id, name));
        log::debug!("Created entity {id} '{name}'");

        self.notify(&Trigger::EntityCreated(EntityReference::Id(id)));
        if !name.is_empty() {
            self.notify(&Trigger::EntityCreated(EntityReference::Name(name.to_string())));
        }
    }

    /// Destroys an entity and its components.
    ///
    /// Placeables attached to it re-resolve and, still referencing the
    /// destroyed entity, wait for it to be created again.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if self.entities.remove(&id).is_none() {
            return false;
        }
        self.destroy_mesh(id);
        self.destroy_placeable(id);
        log::debug!("Removed entity {id}");
        true
    }

    #[inline]
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    #[inline]
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Resolves a reference to a live entity. Names match the lowest id.
    #[must_use]
    pub fn lookup(&self, reference: &EntityReference) -> Option<EntityId> {
        match reference {
            EntityReference::None => None,
            EntityReference::Id(id) => self.entities.contains_key(id).then_some(*id),
            EntityReference::Name(_) => self
                .entities
                .values()
                .find(|e| reference.refers_to(e))
                .map(|e| e.id),
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn add_placeable(&mut self, id: EntityId) -> Result<()> {
        self.add_placeable_with(id, PlaceableData::default())
    }

    /// Adds a placeable initialised from persisted data and resolves it.
    pub fn add_placeable_with(&mut self, id: EntityId, mut data: PlaceableData) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))?;
        if entity.has_component(ComponentType::Placeable) {
            return Err(SceneError::ComponentExists {
                entity: id,
                component: ComponentType::Placeable,
            });
        }
        data.transform = validate_transform(id, data.transform, self.settings.min_scale)?;
        entity.components.push(ComponentType::Placeable);

        let node = self.graph.create_node();
        let t = data.transform;
        self.graph.set_transform(node, t.position, t.rotation, t.scale);
        self.graph.set_visible(node, data.visible);
        self.placeables.insert(id, Placeable::new(node, data));

        self.resolve(id);
        self.notify(&Trigger::ComponentAdded(id, ComponentType::Placeable));
        Ok(())
    }

    /// Destroys the placeable of `id`; its children re-resolve.
    pub fn remove_placeable(&mut self, id: EntityId) -> bool {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.components.retain(|c| *c != ComponentType::Placeable);
        }
        self.destroy_placeable(id)
    }

    fn destroy_placeable(&mut self, id: EntityId) -> bool {
        self.detach(id);
        let Some(placeable) = self.placeables.remove(&id) else {
            return false;
        };
        self.graph.destroy_node(placeable.node);

        for child in placeable.children {
            if let Some(c) = self.placeables.get_mut(&child) {
                c.state = AttachmentState::Unresolved;
                c.parent = None;
            }
            self.resolve(child);
        }

        // Proxies of this entity's bones lose their world offset
        self.push_subtree_bone_poses(id);
        true
    }

    pub fn add_mesh(&mut self, id: EntityId, mesh: Mesh) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))?;
        if entity.has_component(ComponentType::Mesh) {
            return Err(SceneError::ComponentExists {
                entity: id,
                component: ComponentType::Mesh,
            });
        }
        entity.components.push(ComponentType::Mesh);
        self.meshes.insert(id, mesh);

        self.notify(&Trigger::ComponentAdded(id, ComponentType::Mesh));
        Ok(())
    }

    /// Destroys the mesh of `id`; placeables attached to its bones re-resolve.
    pub fn remove_mesh(&mut self, id: EntityId) -> Option<Mesh> {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.components.retain(|c| *c != ComponentType::Mesh);
        }
        self.destroy_mesh(id)
    }

    fn destroy_mesh(&mut self, id: EntityId) -> Option<Mesh> {
        let mesh = self.meshes.remove(&id)?;
        self.mesh_changed(id);
        Some(mesh)
    }

    /// Replaces the skeleton of the mesh on `id` (e.g. after the asset loaded).
    pub fn set_skeleton(&mut self, id: EntityId, skeleton: Option<Skeleton>) -> Result<()> {
        let mesh = self
            .meshes
            .get_mut(&id)
            .ok_or(SceneError::MissingComponent {
                entity: id,
                component: ComponentType::Mesh,
            })?;
        mesh.replace_skeleton(skeleton);
        mesh.update_pose();
        self.mesh_changed(id);
        Ok(())
    }

    fn mesh_changed(&mut self, id: EntityId) {
        for child in self.bones.attached_to_entity(id) {
            self.resolve(child);
        }
        self.notify(&Trigger::MeshChanged(id));
    }

    #[inline]
    #[must_use]
    pub fn mesh(&self, id: EntityId) -> Option<&Mesh> {
        self.meshes.get(&id)
    }

    /// Sets the local pose of `bone` on the mesh of `id`.
    ///
    /// The edit applies with the next [`Scene::update`]. Skeletons are only
    /// replaced through [`Scene::set_skeleton`].
    pub fn set_bone_transform(&mut self, id: EntityId, bone: &str, local: Transform) -> Result<()> {
        if !local.is_finite() {
            log::error!("Rejected non-finite pose for bone '{bone}' of entity {id}: {local:?}");
            return Err(SceneError::InvalidTransform(format!(
                "entity {id} bone '{bone}': {local:?}"
            )));
        }
        let mesh = self
            .meshes
            .get_mut(&id)
            .ok_or(SceneError::MissingComponent {
                entity: id,
                component: ComponentType::Mesh,
            })?;
        if mesh.set_bone_transform(bone, local) {
            Ok(())
        } else {
            Err(SceneError::BoneNotFound {
                entity: id,
                bone: bone.to_string(),
            })
        }
    }

    #[inline]
    #[must_use]
    pub fn placeable(&self, id: EntityId) -> Option<&Placeable> {
        self.placeables.get(&id)
    }

    /// Chainable mutation wrapper, `None` if `id` has no placeable.
    pub fn placeable_mut(&mut self, id: EntityId) -> Option<PlaceableMut<'_, G>> {
        if self.placeables.contains_key(&id) {
            Some(PlaceableMut::new(self, id))
        } else {
            None
        }
    }

    /// Attachment state of the placeable on `id`.
    #[must_use]
    pub fn attachment_state(&self, id: EntityId) -> Option<AttachmentState> {
        self.placeables.get(&id).map(Placeable::state)
    }

    /// Events the placeable on `id` is waiting for.
    #[must_use]
    pub fn pending_triggers(&self, id: EntityId) -> &[Trigger] {
        self.subscriptions.triggers_of(id)
    }

    fn placeable_entry(&mut self, id: EntityId) -> Result<&mut Placeable> {
        self.placeables
            .get_mut(&id)
            .ok_or(SceneError::MissingComponent {
                entity: id,
                component: ComponentType::Placeable,
            })
    }

    // ========================================================================
    // Attribute setters
    // ========================================================================

    /// Sets the local transform.
    ///
    /// Non-finite input is rejected and the previous transform kept; scale
    /// axes are clamped to `settings.min_scale`.
    pub fn set_transform(
        &mut self,
        id: EntityId,
        transform: Transform,
        scope: ReplicationScope,
    ) -> Result<()> {
        let min_scale = self.settings.min_scale;
        let placeable = self.placeable_entry(id)?;
        let transform = validate_transform(id, transform, min_scale)?;
        if placeable.transform.set(transform, scope) {
            self.attributes_changed(id);
        }
        Ok(())
    }

    pub fn set_parent_ref(
        &mut self,
        id: EntityId,
        parent: EntityReference,
        scope: ReplicationScope,
    ) -> Result<()> {
        if self.placeable_entry(id)?.parent_ref.set(parent, scope) {
            self.attributes_changed(id);
        }
        Ok(())
    }

    pub fn set_parent_bone(&mut self, id: EntityId, bone: &str, scope: ReplicationScope) -> Result<()> {
        if self
            .placeable_entry(id)?
            .parent_bone
            .set(bone.to_string(), scope)
        {
            self.attributes_changed(id);
        }
        Ok(())
    }

    pub fn set_visible(&mut self, id: EntityId, visible: bool, scope: ReplicationScope) -> Result<()> {
        if self.placeable_entry(id)?.visible.set(visible, scope) {
            self.attributes_changed(id);
        }
        Ok(())
    }

    pub fn set_selection_layer(&mut self, id: EntityId, layer: u32, scope: ReplicationScope) -> Result<()> {
        if self.placeable_entry(id)?.selection_layer.set(layer, scope) {
            self.attributes_changed(id);
        }
        Ok(())
    }

    pub fn set_draw_debug(&mut self, id: EntityId, draw: bool, scope: ReplicationScope) -> Result<()> {
        if self.placeable_entry(id)?.draw_debug.set(draw, scope) {
            self.attributes_changed(id);
        }
        Ok(())
    }

    /// Snapshot of the persisted attributes.
    #[must_use]
    pub fn placeable_data(&self, id: EntityId) -> Option<PlaceableData> {
        self.placeables.get(&id).map(Placeable::to_data)
    }

    /// Applies persisted/replicated attributes in one step.
    ///
    /// Resolution runs at most once, after all attributes were written. A
    /// non-finite transform rejects the whole update.
    pub fn apply_placeable_data(
        &mut self,
        id: EntityId,
        data: PlaceableData,
        scope: ReplicationScope,
    ) -> Result<()> {
        let min_scale = self.settings.min_scale;
        let placeable = self.placeable_entry(id)?;
        let transform = validate_transform(id, data.transform, min_scale)?;

        let mut changed = placeable.transform.set(transform, scope);
        changed |= placeable.parent_ref.set(data.parent_ref, scope);
        changed |= placeable.parent_bone.set(data.parent_bone, scope);
        changed |= placeable.visible.set(data.visible, scope);
        changed |= placeable.selection_layer.set(data.selection_layer, scope);
        changed |= placeable.draw_debug.set(data.draw_debug, scope);

        if changed {
            self.attributes_changed(id);
        }
        Ok(())
    }

    /// Consumes the changed flags of the placeable on `id`.
    fn attributes_changed(&mut self, id: EntityId) {
        let Some(placeable) = self.placeables.get_mut(&id) else {
            return;
        };
        let node = placeable.node;
        let transform = placeable
            .transform
            .value_changed()
            .then(|| *placeable.transform.get());
        let visible = placeable
            .visible
            .value_changed()
            .then(|| *placeable.visible.get());
        let reparent = placeable.parent_ref.value_changed() || placeable.parent_bone.value_changed();
        placeable.clear_changed();

        if let Some(t) = transform {
            self.graph.set_transform(node, t.position, t.rotation, t.scale);
        }
        if let Some(v) = visible {
            self.graph.set_visible(node, v);
        }
        if reparent {
            self.resolve(id);
        } else if transform.is_some() {
            self.push_subtree_bone_poses(id);
        }
    }

    // ========================================================================
    // Parenting
    // ========================================================================

    /// Re-parents the placeable on `id` under `target` (optionally a bone).
    ///
    /// With `preserve_world`, the local transform is rewritten first so the
    /// world transform is unchanged by the move. A target lacking the
    /// required component is an error and leaves the current parenting as is.
    pub fn set_parent(
        &mut self,
        id: EntityId,
        target: EntityReference,
        bone: &str,
        preserve_world: bool,
    ) -> Result<()> {
        if !self.placeables.contains_key(&id) {
            log::error!("set_parent: entity {id} has no placeable");
            return Err(SceneError::MissingComponent {
                entity: id,
                component: ComponentType::Placeable,
            });
        }

        let parent_world = self.prospective_parent_world(id, &target, bone)?;

        if preserve_world {
            let world = self.local_to_world(id).unwrap_or(Affine3A::IDENTITY);
            let parent_inv = invert(parent_world, id)?;
            let local = Transform::from_matrix(&(parent_inv * world));
            let min_scale = self.settings.min_scale;
            let local = validate_transform(id, local, min_scale)?;
            self.placeable_entry(id)?
                .transform
                .set(local, ReplicationScope::Default);
        }

        let placeable = self.placeable_entry(id)?;
        placeable.parent_ref.set(target, ReplicationScope::Default);
        placeable
            .parent_bone
            .set(bone.to_string(), ReplicationScope::Default);
        self.attributes_changed(id);
        Ok(())
    }

    /// World transform the placeable on `id` will be composed with once
    /// parented to (`target`, `bone`).
    fn prospective_parent_world(
        &mut self,
        id: EntityId,
        target: &EntityReference,
        bone: &str,
    ) -> Result<Affine3A> {
        if target.is_empty() {
            return Ok(Affine3A::IDENTITY);
        }
        let Some(target_id) = self.lookup(target) else {
            log::error!("set_parent: entity {id} cannot be parented to missing entity '{target}'");
            return Err(SceneError::UnresolvedReference(target.to_string()));
        };
        if target_id == id || self.chain_contains(target_id, id) {
            // Resolution will fall back to the scene root
            return Ok(Affine3A::IDENTITY);
        }

        if !bone.is_empty() {
            let owner_world = self.owner_world(target_id);
            let Some(mesh) = self.meshes.get_mut(&target_id) else {
                log::error!("set_parent: entity {target_id} has no mesh to attach entity {id} to");
                return Err(SceneError::MissingComponent {
                    entity: target_id,
                    component: ComponentType::Mesh,
                });
            };
            if let Some(bone_id) = mesh.find_bone(bone) {
                mesh.update_pose();
                let model = mesh.bone_model_matrix(bone_id).unwrap_or(Affine3A::IDENTITY);
                // Existing proxies must show the same pose the new local is computed against
                self.push_subtree_bone_poses(target_id);
                // Proxies carry the TRS decomposition of the bone's world pose
                return Ok(Transform::from_matrix(&(owner_world * model)).matrix());
            }
        }

        match self.placeables.get(&target_id) {
            Some(_) => Ok(self.owner_world(target_id)),
            None => {
                log::error!("set_parent: entity {target_id} has no placeable to parent entity {id} to");
                Err(SceneError::MissingComponent {
                    entity: target_id,
                    component: ComponentType::Placeable,
                })
            }
        }
    }

    // ========================================================================
    // Transform queries
    // ========================================================================

    /// Local transform matrix of `id`, rebuilt from the `transform` attribute.
    #[must_use]
    pub fn local_to_parent(&self, id: EntityId) -> Option<Affine3A> {
        self.placeables.get(&id).map(Placeable::local_to_parent)
    }

    /// World matrix of `id`, composed through the live parent chain.
    ///
    /// For a bone attachment the chain ends at the bone's proxy node, whose
    /// world matrix is read from the node graph. Unresolved placeables
    /// answer as if attached to the scene root.
    #[must_use]
    pub fn local_to_world(&self, id: EntityId) -> Option<Affine3A> {
        let mut current = self.placeables.get(&id)?;
        let mut world = current.local_to_parent();
        let mut steps = 0;

        loop {
            match current.state {
                AttachmentState::AttachedToPlaceable => {
                    let Some(parent) = current.parent.and_then(|p| self.placeables.get(&p)) else {
                        break;
                    };
                    steps += 1;
                    if steps > self.placeables.len() {
                        log::error!("Parent chain of entity {id} does not terminate");
                        break;
                    }
                    world = parent.local_to_parent() * world;
                    current = parent;
                }
                AttachmentState::AttachedToBone => {
                    let proxy_world = current
                        .bone
                        .as_ref()
                        .and_then(|key| self.bones.get(key))
                        .and_then(|record| self.graph.world_matrix(record.proxy()));
                    if let Some(proxy_world) = proxy_world {
                        world = proxy_world * world;
                    }
                    break;
                }
                AttachmentState::AttachedRoot | AttachmentState::Unresolved => break,
            }
        }

        Some(world)
    }

    /// Inverse of [`Scene::local_to_world`].
    pub fn world_to_local(&self, id: EntityId) -> Result<Affine3A> {
        let world = self.local_to_world(id).ok_or(SceneError::MissingComponent {
            entity: id,
            component: ComponentType::Placeable,
        })?;
        invert(world, id)
    }

    /// Inverse of [`Scene::local_to_parent`].
    pub fn parent_to_local(&self, id: EntityId) -> Result<Affine3A> {
        let local = self.local_to_parent(id).ok_or(SceneError::MissingComponent {
            entity: id,
            component: ComponentType::Placeable,
        })?;
        invert(local, id)
    }

    #[must_use]
    pub fn world_position(&self, id: EntityId) -> Option<Vec3> {
        self.local_to_world(id).map(|m| m.translation.into())
    }

    #[must_use]
    pub fn world_orientation(&self, id: EntityId) -> Option<Quat> {
        self.local_to_world(id)
            .map(|m| m.to_scale_rotation_translation().1)
    }

    #[must_use]
    pub fn world_scale(&self, id: EntityId) -> Option<Vec3> {
        self.local_to_world(id)
            .map(|m| m.to_scale_rotation_translation().0)
    }

    // ========================================================================
    // Hierarchy queries
    // ========================================================================

    /// Placeables currently attached under `id`, directly or to its bones.
    #[must_use]
    pub fn children(&self, id: EntityId) -> Vec<EntityId> {
        let mut children: Vec<EntityId> = self
            .placeables
            .get(&id)
            .map(|p| p.children.to_vec())
            .unwrap_or_default();
        children.extend(self.bones.attached_to_entity(id));
        children
    }

    /// Placeables attached to `bone` of `id`.
    #[must_use]
    pub fn bone_attachments(&self, id: EntityId, bone: &str) -> &[EntityId] {
        self.bones
            .get(&BoneKey::new(id, bone))
            .map(BoneAttachment::attached)
            .unwrap_or(&[])
    }

    /// Proxy node mirroring `bone` of `id`, if anything is attached to it.
    #[must_use]
    pub fn bone_proxy(&self, id: EntityId, bone: &str) -> Option<NodeHandle> {
        self.bones
            .get(&BoneKey::new(id, bone))
            .map(BoneAttachment::proxy)
    }

    // ========================================================================
    // Frame update
    // ========================================================================

    /// Runs one frame of the hierarchy.
    ///
    /// 1. Every skeleton recomputes its pose
    /// 2. Bone proxies receive the new poses, outermost owners first so that
    ///    nested bone attachments see their owner's fresh world transform
    /// 3. The node graph refreshes its render caches
    pub fn update(&mut self) {
        for mesh in self.meshes.values_mut() {
            mesh.update_pose();
        }

        let mut owners = self.bones.owners();
        owners.sort_by_cached_key(|&owner| self.depth(owner));
        for owner in owners {
            self.push_bone_poses(owner);
        }

        self.graph.update();
    }
}

fn validate_transform(id: EntityId, transform: Transform, min_scale: f32) -> Result<Transform> {
    if !transform.is_finite() {
        log::error!("Rejected non-finite transform for entity {id}: {transform:?}");
        return Err(SceneError::InvalidTransform(format!(
            "entity {id}: {transform:?}"
        )));
    }
    Ok(transform.clamped(min_scale))
}

fn invert(mat: Affine3A, id: EntityId) -> Result<Affine3A> {
    let det = mat.matrix3.determinant();
    if !det.is_finite() || det.abs() < f32::MIN_POSITIVE {
        return Err(SceneError::SingularMatrix(id));
    }
    let inv = mat.inverse();
    if inv.is_finite() {
        Ok(inv)
    } else {
        Err(SceneError::SingularMatrix(id))
    }
}
