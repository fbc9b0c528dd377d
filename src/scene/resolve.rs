//! Attachment resolution.
//!
//! Turns a placeable's (`parentRef`, `parentBone`) pair into a concrete
//! attachment. Resolution is synchronous: it either attaches the placeable
//! (to the scene root, another placeable or a bone proxy) or leaves it
//! [`Unresolved`](AttachmentState::Unresolved) with a subscription on the
//! event that would let it make progress.
//!
//! Order of checks:
//! 1. Detach from whatever the placeable was attached to.
//! 2. Empty reference or self-reference: scene root.
//! 3. Missing target entity: wait for it to be created.
//! 4. Bone requested: wait for a mesh; attach to the bone if it exists,
//!    otherwise warn, wait for the mesh to change and fall through.
//! 5. Attach under the target's placeable (or wait for one). A parent whose
//!    chain already contains the placeable is refused in favour of the root.

use std::collections::VecDeque;

use glam::Affine3A;
use rustc_hash::FxHashSet;

use crate::entity::{ComponentType, EntityId};
use crate::scene::bone_bridge::BoneKey;
use crate::scene::graph::NodeGraph;
use crate::scene::placeable::AttachmentState;
use crate::scene::scene::Scene;
use crate::scene::skeleton::{BoneId, BoneSource};
use crate::scene::subscriptions::Trigger;

impl<G: NodeGraph> Scene<G> {
    /// Re-resolves the attachment of `id` and refreshes the bone proxies it owns.
    pub(crate) fn resolve(&mut self, id: EntityId) {
        if !self.placeables.contains_key(&id) {
            return;
        }
        self.resolve_attachment(id);
        self.push_subtree_bone_poses(id);
    }

    fn resolve_attachment(&mut self, id: EntityId) {
        self.detach(id);

        let Some(placeable) = self.placeables.get(&id) else {
            return;
        };
        let parent_ref = placeable.parent_ref.get().clone();
        let bone = placeable.parent_bone.get().clone();

        if parent_ref.is_empty() {
            self.attach_root(id);
            return;
        }

        let Some(target) = self.lookup(&parent_ref) else {
            log::debug!("Entity {id}: parent '{parent_ref}' does not exist yet, waiting");
            self.subscriptions
                .subscribe(id, Trigger::EntityCreated(parent_ref));
            return;
        };

        if target == id {
            log::debug!("Entity {id} references itself as parent, attaching to scene root");
            self.attach_root(id);
            return;
        }

        if !bone.is_empty() {
            let Some(mesh) = self.meshes.get(&target) else {
                log::debug!("Entity {id}: waiting for a mesh on entity {target} to attach to bone '{bone}'");
                self.subscriptions
                    .subscribe(id, Trigger::ComponentAdded(target, ComponentType::Mesh));
                return;
            };

            if let Some(bone_id) = mesh.find_bone(&bone) {
                if self.chain_contains(target, id) {
                    log::warn!(
                        "Entity {id}: attaching to bone '{bone}' of entity {target} would create a cycle, attaching to scene root"
                    );
                    self.attach_root(id);
                } else {
                    self.attach_bone(id, target, &bone, bone_id);
                }
                return;
            }

            if self.settings.warn_on_missing_bone {
                log::warn!(
                    "Entity {id}: bone '{bone}' not found on entity {target}, attaching to its placeable until the mesh changes"
                );
            }
            self.subscriptions.subscribe(id, Trigger::MeshChanged(target));
        }

        self.attach_placeable(id, target);
    }

    /// Removes `id` from its current parent structure and parks its node at
    /// the scene root. Idempotent.
    pub(crate) fn detach(&mut self, id: EntityId) {
        self.subscriptions.cancel_all(id);

        let Some(placeable) = self.placeables.get_mut(&id) else {
            return;
        };
        let state = std::mem::replace(&mut placeable.state, AttachmentState::Unresolved);
        let parent = placeable.parent.take();
        let bone = placeable.bone.take();
        self.graph.set_parent(placeable.node, None);

        match state {
            AttachmentState::AttachedToPlaceable => {
                if let Some(parent) = parent
                    && let Some(parent_placeable) = self.placeables.get_mut(&parent)
                {
                    parent_placeable.children.retain(|c| *c != id);
                }
            }
            AttachmentState::AttachedToBone => {
                if let Some(key) = bone {
                    self.bones.detach(&mut self.graph, &key, id);
                }
            }
            AttachmentState::AttachedRoot | AttachmentState::Unresolved => {}
        }
    }

    fn attach_root(&mut self, id: EntityId) {
        if let Some(placeable) = self.placeables.get_mut(&id) {
            self.graph.set_parent(placeable.node, None);
            placeable.state = AttachmentState::AttachedRoot;
        }
    }

    fn attach_placeable(&mut self, id: EntityId, target: EntityId) {
        let Some(parent_node) = self.placeables.get(&target).map(|p| p.node) else {
            log::debug!("Entity {id}: waiting for a placeable on entity {target}");
            self.subscriptions
                .subscribe(id, Trigger::ComponentAdded(target, ComponentType::Placeable));
            return;
        };

        if self.chain_contains(target, id) {
            log::warn!(
                "Entity {id}: parenting to entity {target} would create a cycle, attaching to scene root"
            );
            self.attach_root(id);
            return;
        }

        let Some(placeable) = self.placeables.get_mut(&id) else {
            return;
        };
        self.graph.set_parent(placeable.node, Some(parent_node));
        placeable.state = AttachmentState::AttachedToPlaceable;
        placeable.parent = Some(target);

        if let Some(parent) = self.placeables.get_mut(&target)
            && !parent.children.contains(&id)
        {
            parent.children.push(id);
        }
    }

    fn attach_bone(&mut self, id: EntityId, target: EntityId, bone: &str, bone_id: BoneId) {
        let Some(node) = self.placeables.get(&id).map(|p| p.node) else {
            return;
        };
        let key = BoneKey::new(target, bone);
        let proxy = self.bones.attach(&mut self.graph, &key, bone_id, id);

        // The proxy must carry the current bone pose before the child is
        // parented under it.
        let owner_world = self.owner_world(target);
        if let Some(mesh) = self.meshes.get_mut(&target) {
            mesh.update_pose();
            self.bones
                .sync_entity(&mut self.graph, target, owner_world, &*mesh);
        }

        self.graph.set_parent(node, Some(proxy));
        if let Some(placeable) = self.placeables.get_mut(&id) {
            placeable.state = AttachmentState::AttachedToBone;
            placeable.parent = Some(target);
            placeable.bone = Some(key);
        }
    }

    /// Whether `needle` is `start` or one of its resolved ancestors.
    ///
    /// A chain longer than the number of placeables means the acyclic
    /// invariant was broken; that is reported as containing `needle` so
    /// callers fall back to the root.
    pub(crate) fn chain_contains(&self, start: EntityId, needle: EntityId) -> bool {
        let mut current = Some(start);
        let mut steps = 0;
        while let Some(entity) = current {
            if entity == needle {
                return true;
            }
            steps += 1;
            if steps > self.placeables.len() {
                log::error!("Parent chain of entity {start} does not terminate");
                return true;
            }
            current = self.placeables.get(&entity).and_then(|p| p.parent);
        }
        false
    }

    /// Number of resolved ancestors of `id`.
    pub(crate) fn depth(&self, id: EntityId) -> usize {
        let mut depth = 0;
        let mut current = self.placeables.get(&id).and_then(|p| p.parent);
        while let Some(entity) = current {
            depth += 1;
            if depth > self.placeables.len() {
                break;
            }
            current = self.placeables.get(&entity).and_then(|p| p.parent);
        }
        depth
    }

    /// World transform bone poses of `owner` are composed with.
    pub(crate) fn owner_world(&self, owner: EntityId) -> Affine3A {
        self.local_to_world(owner).unwrap_or(Affine3A::IDENTITY)
    }

    /// Skeleton-updated hook for one entity.
    pub(crate) fn push_bone_poses(&mut self, owner: EntityId) {
        if !self.meshes.contains_key(&owner) {
            return;
        }
        let owner_world = self.owner_world(owner);
        if let Some(mesh) = self.meshes.get(&owner) {
            self.bones
                .sync_entity(&mut self.graph, owner, owner_world, mesh);
        }
    }

    /// Refreshes the bone proxies of every mesh owner in the subtree of
    /// `root`, including placeables hanging off its bones.
    ///
    /// Breadth-first, so an owner is always synced before owners nested
    /// below it compose with its proxies.
    pub(crate) fn push_subtree_bone_poses(&mut self, root: EntityId) {
        let mut queue = VecDeque::from([root]);
        let mut visited = FxHashSet::default();
        while let Some(entity) = queue.pop_front() {
            if !visited.insert(entity) {
                continue;
            }
            self.push_bone_poses(entity);
            if let Some(placeable) = self.placeables.get(&entity) {
                queue.extend(placeable.children.iter().copied());
            }
            queue.extend(self.bones.attached_to_entity(entity));
        }
    }

    /// Delivers an event to its waiters, which re-resolve immediately.
    pub(crate) fn notify(&mut self, trigger: &Trigger) {
        for waiter in self.subscriptions.take(trigger) {
            self.resolve(waiter);
        }
    }
}
