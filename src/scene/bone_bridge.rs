//! Bone attachment bridge.
//!
//! The node graph cannot parent a node to a bone, so every (entity, bone)
//! pair that has attachments gets one shared proxy node under the scene root.
//! Whenever the owning skeleton recomputes its pose, the proxy receives the
//! bone's world transform and the attached placeable nodes, being children
//! of the proxy, follow it.
//!
//! Records are created on the first attachment to a bone and destroyed
//! (together with their proxy) when the last attachment leaves.

use glam::Affine3A;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::entity::EntityId;
use crate::scene::NodeHandle;
use crate::scene::graph::NodeGraph;
use crate::scene::skeleton::{BoneId, BoneSource};
use crate::scene::transform::Transform;

/// Identifies one bone of one entity's skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoneKey {
    pub entity: EntityId,
    pub bone: String,
}

impl BoneKey {
    #[must_use]
    pub fn new(entity: EntityId, bone: &str) -> Self {
        Self {
            entity,
            bone: bone.to_string(),
        }
    }
}

/// Shared proxy node and attachment list of one bone.
#[derive(Debug, Clone)]
pub struct BoneAttachment {
    pub(crate) proxy: NodeHandle,
    pub(crate) bone: BoneId,
    pub(crate) attached: SmallVec<[EntityId; 4]>,
}

impl BoneAttachment {
    #[inline]
    #[must_use]
    pub fn proxy(&self) -> NodeHandle {
        self.proxy
    }

    #[inline]
    #[must_use]
    pub fn attached(&self) -> &[EntityId] {
        &self.attached
    }
}

#[derive(Debug, Default)]
pub struct BoneAttachmentBridge {
    records: FxHashMap<BoneKey, BoneAttachment>,
}

impl BoneAttachmentBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &BoneKey) -> Option<&BoneAttachment> {
        self.records.get(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds `child` to the record of `key`, creating the record and its
    /// proxy node on first use. Returns the proxy node.
    pub fn attach<G: NodeGraph>(
        &mut self,
        graph: &mut G,
        key: &BoneKey,
        bone: BoneId,
        child: EntityId,
    ) -> NodeHandle {
        let record = self.records.entry(key.clone()).or_insert_with(|| {
            log::debug!("Creating proxy for bone '{}' of entity {}", key.bone, key.entity);
            BoneAttachment {
                proxy: graph.create_node(),
                bone,
                attached: SmallVec::new(),
            }
        });
        // The skeleton may have been replaced since the record was created
        record.bone = bone;
        if !record.attached.contains(&child) {
            record.attached.push(child);
        }
        record.proxy
    }

    /// Removes `child` from the record of `key`.
    ///
    /// The record and its proxy node are destroyed once the list is empty.
    /// Returns whether `child` was attached.
    pub fn detach<G: NodeGraph>(&mut self, graph: &mut G, key: &BoneKey, child: EntityId) -> bool {
        let Some(record) = self.records.get_mut(key) else {
            return false;
        };
        let Some(i) = record.attached.iter().position(|&e| e == child) else {
            return false;
        };
        record.attached.remove(i);

        if record.attached.is_empty() {
            log::debug!("Destroying proxy for bone '{}' of entity {}", key.bone, key.entity);
            let proxy = record.proxy;
            self.records.remove(key);
            graph.destroy_node(proxy);
        }
        true
    }

    /// Skeleton-updated hook: refreshes every proxy of `owner`'s bones.
    pub fn sync_entity<G: NodeGraph, B: BoneSource + ?Sized>(
        &self,
        graph: &mut G,
        owner: EntityId,
        owner_world: Affine3A,
        source: &B,
    ) {
        for (key, record) in &self.records {
            if key.entity == owner {
                Self::write_proxy(graph, record, owner_world, source);
            }
        }
    }

    fn write_proxy<G: NodeGraph, B: BoneSource + ?Sized>(
        graph: &mut G,
        record: &BoneAttachment,
        owner_world: Affine3A,
        source: &B,
    ) {
        let Some(model) = source.bone_model_matrix(record.bone) else {
            return;
        };
        let pose = Transform::from_matrix(&(owner_world * model));
        graph.set_transform(record.proxy, pose.position, pose.rotation, pose.scale);
    }

    /// Entities that own at least one bone record, without duplicates.
    #[must_use]
    pub fn owners(&self) -> Vec<EntityId> {
        let mut owners: Vec<EntityId> = self.records.keys().map(|k| k.entity).collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    /// Every placeable attached to any bone of `owner`.
    #[must_use]
    pub fn attached_to_entity(&self, owner: EntityId) -> Vec<EntityId> {
        let mut attached: Vec<EntityId> = self
            .records
            .iter()
            .filter(|(key, _)| key.entity == owner)
            .flat_map(|(_, record)| record.attached.iter().copied())
            .collect();
        attached.sort_unstable();
        attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::graph::NodeArena;
    use crate::scene::skeleton::{Bone, Mesh, Skeleton};
    use glam::Vec3;

    fn id(raw: u32) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    fn hand_mesh() -> Mesh {
        Mesh::new("hand.mesh").with_skeleton(Skeleton::new(
            "Rig",
            vec![Bone::new("Hand", None, Transform::from_xyz(0.0, 2.0, 0.0))],
        ))
    }

    #[test]
    fn record_is_shared_and_destroyed_when_empty() {
        let mut graph = NodeArena::new();
        let mut bridge = BoneAttachmentBridge::new();
        let key = BoneKey::new(id(1), "Hand");

        let p1 = bridge.attach(&mut graph, &key, BoneId(0), id(2));
        let p2 = bridge.attach(&mut graph, &key, BoneId(0), id(3));
        assert_eq!(p1, p2);
        assert_eq!(bridge.get(&key).unwrap().attached(), &[id(2), id(3)]);
        assert_eq!(graph.len(), 1);

        assert!(bridge.detach(&mut graph, &key, id(2)));
        assert!(!bridge.detach(&mut graph, &key, id(2)));
        assert_eq!(bridge.len(), 1);

        assert!(bridge.detach(&mut graph, &key, id(3)));
        assert!(bridge.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn sync_composes_owner_world() {
        let mut graph = NodeArena::new();
        let mut bridge = BoneAttachmentBridge::new();
        let key = BoneKey::new(id(1), "Hand");
        let mesh = hand_mesh();
        let bone = mesh.find_bone("Hand").unwrap();

        let proxy = bridge.attach(&mut graph, &key, bone, id(2));
        let owner_world = Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0));
        bridge.sync_entity(&mut graph, id(1), owner_world, &mesh);

        let world: Vec3 = graph.world_matrix(proxy).unwrap().translation.into();
        assert!((world - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn owners_are_deduplicated() {
        let mut graph = NodeArena::new();
        let mut bridge = BoneAttachmentBridge::new();
        bridge.attach(&mut graph, &BoneKey::new(id(1), "Hand"), BoneId(0), id(5));
        bridge.attach(&mut graph, &BoneKey::new(id(1), "Head"), BoneId(1), id(6));
        bridge.attach(&mut graph, &BoneKey::new(id(4), "Hand"), BoneId(0), id(7));

        assert_eq!(bridge.owners(), vec![id(1), id(4)]);
        assert_eq!(bridge.attached_to_entity(id(1)), vec![id(5), id(6)]);
    }
}
