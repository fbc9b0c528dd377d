//! The placeable component: an entity's node in the transform hierarchy.
//!
//! A [`Placeable`] stores six persisted attributes plus runtime attachment
//! state. The attachment state is owned by the [`Scene`](crate::scene::Scene),
//! which resolves `parentRef`/`parentBone` into one of the
//! [`AttachmentState`] variants whenever they change.

use glam::Affine3A;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::attribute::{Attribute, AttributeMetadata};
use crate::entity::{EntityId, EntityReference};
use crate::scene::NodeHandle;
use crate::scene::bone_bridge::BoneKey;
use crate::scene::transform::Transform;

/// Where a placeable currently hangs in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentState {
    /// Waiting for the referenced entity, component or bone to appear.
    ///
    /// The scene node is parked under the scene root meanwhile.
    Unresolved,
    /// Child of the scene root.
    AttachedRoot,
    /// Child of another entity's placeable.
    AttachedToPlaceable,
    /// Child of a bone proxy node of another entity's skeleton.
    AttachedToBone,
}

pub(crate) const TRANSFORM: AttributeMetadata = AttributeMetadata::new("transform").interpolated();
pub(crate) const PARENT_REF: AttributeMetadata = AttributeMetadata::new("parentRef");
pub(crate) const PARENT_BONE: AttributeMetadata = AttributeMetadata::new("parentBone");
pub(crate) const VISIBLE: AttributeMetadata = AttributeMetadata::new("visible");
pub(crate) const SELECTION_LAYER: AttributeMetadata = AttributeMetadata::new("selectionLayer");
pub(crate) const DRAW_DEBUG: AttributeMetadata = AttributeMetadata::new("drawDebug");

/// Persisted / replicated form of a placeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceableData {
    pub transform: Transform,
    pub parent_ref: EntityReference,
    pub parent_bone: String,
    pub visible: bool,
    pub selection_layer: u32,
    pub draw_debug: bool,
}

impl Default for PlaceableData {
    fn default() -> Self {
        Self {
            transform: Transform::IDENTITY,
            parent_ref: EntityReference::None,
            parent_bone: String::new(),
            visible: true,
            selection_layer: 1,
            draw_debug: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Placeable {
    // === Attributes ===
    pub(crate) transform: Attribute<Transform>,
    pub(crate) parent_ref: Attribute<EntityReference>,
    pub(crate) parent_bone: Attribute<String>,
    pub(crate) visible: Attribute<bool>,
    pub(crate) selection_layer: Attribute<u32>,
    pub(crate) draw_debug: Attribute<bool>,

    // === Runtime state (not persisted) ===
    pub(crate) node: NodeHandle,
    pub(crate) state: AttachmentState,
    /// Entity this placeable resolved under (placeable or bone owner).
    pub(crate) parent: Option<EntityId>,
    pub(crate) bone: Option<BoneKey>,
    /// Placeables attached directly to this one.
    pub(crate) children: SmallVec<[EntityId; 4]>,
}

impl Placeable {
    pub(crate) fn new(node: NodeHandle, data: PlaceableData) -> Self {
        Self {
            transform: Attribute::new(data.transform, TRANSFORM),
            parent_ref: Attribute::new(data.parent_ref, PARENT_REF),
            parent_bone: Attribute::new(data.parent_bone, PARENT_BONE),
            visible: Attribute::new(data.visible, VISIBLE),
            selection_layer: Attribute::new(data.selection_layer, SELECTION_LAYER),
            draw_debug: Attribute::new(data.draw_debug, DRAW_DEBUG),
            node,
            state: AttachmentState::Unresolved,
            parent: None,
            bone: None,
            children: SmallVec::new(),
        }
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        self.transform.get()
    }

    #[inline]
    #[must_use]
    pub fn parent_ref(&self) -> &EntityReference {
        self.parent_ref.get()
    }

    #[inline]
    #[must_use]
    pub fn parent_bone(&self) -> &str {
        self.parent_bone.get()
    }

    #[inline]
    #[must_use]
    pub fn visible(&self) -> bool {
        *self.visible.get()
    }

    #[inline]
    #[must_use]
    pub fn selection_layer(&self) -> u32 {
        *self.selection_layer.get()
    }

    #[inline]
    #[must_use]
    pub fn draw_debug(&self) -> bool {
        *self.draw_debug.get()
    }

    /// The attribute slots, for metadata and replication-scope inspection.
    #[must_use]
    pub fn transform_attribute(&self) -> &Attribute<Transform> {
        &self.transform
    }

    #[must_use]
    pub fn parent_ref_attribute(&self) -> &Attribute<EntityReference> {
        &self.parent_ref
    }

    #[must_use]
    pub fn parent_bone_attribute(&self) -> &Attribute<String> {
        &self.parent_bone
    }

    // ========================================================================
    // Runtime state
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn state(&self) -> AttachmentState {
        self.state
    }

    /// Scene node backing this placeable in the node graph.
    #[inline]
    #[must_use]
    pub fn node(&self) -> NodeHandle {
        self.node
    }

    /// Entity this placeable is currently attached under, if any.
    #[inline]
    #[must_use]
    pub fn resolved_parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Bone this placeable is attached to, if any.
    #[inline]
    #[must_use]
    pub fn attached_bone(&self) -> Option<&BoneKey> {
        self.bone.as_ref()
    }

    /// Local transform as a matrix, rebuilt on every call.
    #[inline]
    #[must_use]
    pub fn local_to_parent(&self) -> Affine3A {
        self.transform.get().matrix()
    }

    #[must_use]
    pub fn to_data(&self) -> PlaceableData {
        PlaceableData {
            transform: *self.transform.get(),
            parent_ref: self.parent_ref.get().clone(),
            parent_bone: self.parent_bone.get().clone(),
            visible: *self.visible.get(),
            selection_layer: *self.selection_layer.get(),
            draw_debug: *self.draw_debug.get(),
        }
    }

    pub(crate) fn clear_changed(&mut self) {
        self.transform.clear_changed();
        self.parent_ref.clear_changed();
        self.parent_bone.clear_changed();
        self.visible.clear_changed();
        self.selection_layer.clear_changed();
        self.draw_debug.clear_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uses_attribute_names_in_json() {
        let data = PlaceableData {
            parent_ref: EntityReference::from("7"),
            parent_bone: "Hand".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["parentRef"], "7");
        assert_eq!(json["parentBone"], "Hand");
        assert_eq!(json["selectionLayer"], 1);
        assert_eq!(json["drawDebug"], false);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let data: PlaceableData = serde_json::from_str(r#"{ "parentRef": "Avatar" }"#).unwrap();
        assert_eq!(data.parent_ref, EntityReference::Name("Avatar".to_string()));
        assert!(data.visible);
        assert_eq!(data.transform, Transform::IDENTITY);
    }

    #[test]
    fn transform_attribute_is_interpolated() {
        assert!(TRANSFORM.interpolated);
        assert!(!PARENT_REF.interpolated);
        assert_eq!(PARENT_BONE.name, "parentBone");
    }
}
