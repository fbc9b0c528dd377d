//! Chainable placeable operation wrapper.
//!
//! [`PlaceableMut`] borrows a [`Scene`] mutably and provides a fluent API
//! for editing one placeable without threading `Result`s through every call.
//!
//! All methods write through the scene's validated setters and silently
//! no-op when the value is rejected (e.g. a non-finite position), so the
//! previous transform stays in place.
//!
//! # Example
//!
//! ```rust,ignore
//! scene.placeable_mut(id)?
//!     .set_position(Vec3::new(0.0, 3.0, 0.0))
//!     .set_uniform_scale(2.0)
//!     .look_at(Vec3::ZERO)
//!     .set_visible(false);
//! ```
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::must_use_candidate)]
use glam::{Quat, Vec3};

use crate::attribute::ReplicationScope;
use crate::entity::EntityId;
use crate::scene::graph::NodeGraph;
use crate::scene::scene::Scene;
use crate::scene::transform::Transform;

/// Temporary mutable borrow of a placeable for chainable operations.
pub struct PlaceableMut<'a, G: NodeGraph> {
    scene: &'a mut Scene<G>,
    entity: EntityId,
}

impl<'a, G: NodeGraph> PlaceableMut<'a, G> {
    #[inline]
    pub(crate) fn new(scene: &'a mut Scene<G>, entity: EntityId) -> Self {
        Self { scene, entity }
    }

    #[inline]
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Current local transform.
    pub fn transform(&self) -> Transform {
        self.scene
            .placeable(self.entity)
            .map(|p| *p.transform())
            .unwrap_or_default()
    }

    fn edit(self, f: impl FnOnce(&mut Transform)) -> Self {
        let mut t = self.transform();
        f(&mut t);
        if let Err(err) = self
            .scene
            .set_transform(self.entity, t, ReplicationScope::Default)
        {
            log::debug!("Ignored transform edit on entity {}: {err}", self.entity);
        }
        self
    }

    // -- Transform setters (chainable) --

    /// Sets the local position.
    #[inline]
    pub fn set_position(self, position: Vec3) -> Self {
        self.edit(|t| t.position = position)
    }

    #[inline]
    pub fn set_rotation(self, rotation: Quat) -> Self {
        self.edit(|t| t.rotation = rotation)
    }

    /// Sets rotation from Euler angles (XYZ order, radians).
    #[inline]
    pub fn set_rotation_euler(self, x: f32, y: f32, z: f32) -> Self {
        self.edit(|t| t.set_rotation_euler(x, y, z))
    }

    /// Sets non-uniform scale.
    #[inline]
    pub fn set_scale(self, scale: Vec3) -> Self {
        self.edit(|t| t.scale = scale)
    }

    #[inline]
    pub fn set_uniform_scale(self, s: f32) -> Self {
        self.set_scale(Vec3::splat(s))
    }

    /// Moves the placeable by `offset` in parent space.
    #[inline]
    pub fn translate(self, offset: Vec3) -> Self {
        self.edit(|t| t.position += offset)
    }

    /// Orients the placeable to face `target` (parent space), Y up.
    #[inline]
    pub fn look_at(self, target: Vec3) -> Self {
        self.edit(|t| t.look_at(target, Vec3::Y))
    }

    // -- Other attributes --

    #[inline]
    pub fn set_visible(self, visible: bool) -> Self {
        if let Err(err) = self
            .scene
            .set_visible(self.entity, visible, ReplicationScope::Default)
        {
            log::debug!("Ignored visibility edit on entity {}: {err}", self.entity);
        }
        self
    }

    #[inline]
    pub fn set_draw_debug(self, draw: bool) -> Self {
        if let Err(err) = self
            .scene
            .set_draw_debug(self.entity, draw, ReplicationScope::Default)
        {
            log::debug!("Ignored draw-debug edit on entity {}: {err}", self.entity);
        }
        self
    }
}
