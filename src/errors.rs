//! Error Types
//!
//! This module defines the error types used throughout the scene hierarchy.
//!
//! # Overview
//!
//! Most hierarchy conditions are *not* errors: a missing parent or bone
//! leaves the placeable waiting (or attached to a fallback) and is only
//! logged. [`SceneError`] is reserved for requests the scene refuses:
//! - Registry misuse (invalid or duplicate entity ids)
//! - Missing capabilities (e.g. parenting to an entity without a placeable)
//! - Invalid numeric input (non-finite transforms)
//! - Singular matrices when inverting a transform
//!
//! # Usage
//!
//! ```rust,ignore
//! use arbor::errors::{SceneError, Result};
//!
//! fn reparent(scene: &mut Scene, child: EntityId, parent: EntityId) -> Result<()> {
//!     scene.set_parent(child, parent.into(), "", true)
//! }
//! ```

use thiserror::Error;

use crate::entity::{ComponentType, EntityId};

/// The error type for scene and hierarchy operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// Entity id 0 is reserved.
    #[error("Entity id 0 is reserved and cannot be used")]
    InvalidEntityId,

    /// An entity with this id already exists.
    #[error("Entity {0} already exists")]
    EntityExists(EntityId),

    /// The addressed entity does not exist.
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// An entity reference could not be resolved to a live entity.
    #[error("Entity reference '{0}' does not resolve to an entity")]
    UnresolvedReference(String),

    // ========================================================================
    // Component Errors
    // ========================================================================
    /// The entity lacks a component the operation requires.
    #[error("Entity {entity} has no {component} component")]
    MissingComponent {
        /// Entity that was queried
        entity: EntityId,
        /// The required component
        component: ComponentType,
    },

    /// The entity already carries a component of this type.
    #[error("Entity {entity} already has a {component} component")]
    ComponentExists {
        /// Entity that was modified
        entity: EntityId,
        /// The duplicated component
        component: ComponentType,
    },

    /// The entity's skeleton has no bone with this name.
    #[error("Entity {entity} has no bone named '{bone}'")]
    BoneNotFound { entity: EntityId, bone: String },

    // ========================================================================
    // Numeric Errors
    // ========================================================================
    /// A transform contained NaN or infinite components.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// A world/parent matrix could not be inverted.
    #[error("Transform of entity {0} is singular and cannot be inverted")]
    SingularMatrix(EntityId),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Scene settings could not be parsed.
    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        SceneError::Settings(err.to_string())
    }
}

/// Alias for `Result<T, SceneError>`.
pub type Result<T> = std::result::Result<T, SceneError>;
