#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod attribute;
pub mod entity;
pub mod errors;
pub mod scene;
pub mod settings;

pub use attribute::{Attribute, AttributeMetadata, ReplicationScope};
pub use entity::{ComponentType, Entity, EntityId, EntityReference};
pub use errors::{Result, SceneError};
pub use scene::{
    AttachmentState, Bone, BoneSource, Mesh, NodeArena, NodeGraph, NodeHandle, Placeable,
    PlaceableData, PlaceableMut, Scene, Skeleton, Transform,
};
pub use settings::SceneSettings;
