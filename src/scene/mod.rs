//! Spatial hierarchy module
//!
//! Places entities in a transform hierarchy:
//! - Transform: local TRS value type
//! - Placeable: an entity's node in the hierarchy, with attachment state
//! - Scene: entity registry and attachment resolution
//! - BoneAttachmentBridge: proxy nodes that let placeables follow bones
//! - NodeGraph / NodeArena: the rendering node graph collaborator
//! - Skeleton / Mesh: bone poses placeables can attach to

pub mod bone_bridge;
pub mod graph;
pub mod node;
pub mod placeable;
mod resolve;
pub mod scene;
pub mod skeleton;
pub mod subscriptions;
pub mod transform;
pub mod wrapper;

pub use bone_bridge::{BoneAttachment, BoneAttachmentBridge, BoneKey};
pub use graph::{NodeArena, NodeGraph};
pub use node::Node;
pub use placeable::{AttachmentState, Placeable, PlaceableData};
pub use scene::Scene;
pub use skeleton::{Bone, BoneId, BoneSource, Mesh, Skeleton};
pub use subscriptions::Trigger;
pub use transform::Transform;
pub use wrapper::PlaceableMut;

use slotmap::new_key_type;

new_key_type! {
    /// Handle of a node in a [`NodeArena`].
    pub struct NodeHandle;
}
