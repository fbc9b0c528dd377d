use glam::{Affine3A, Quat, Vec3};

use crate::scene::NodeHandle;

/// A bare transform node of the default [`NodeArena`](crate::scene::graph::NodeArena).
///
/// # Design Principles
///
/// - Only keeps data that must be traversed every frame (hierarchy and TRS)
/// - `local_matrix`/`world_matrix` are render caches refreshed by
///   [`NodeArena::update`](crate::scene::graph::NodeArena::update); the live
///   queries never read them
///
/// # Hierarchy
///
/// - `parent`: Optional handle to parent node (None for scene-root nodes)
/// - `children`: List of child node handles
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) scale: Vec3,

    pub visible: bool,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,

    // Shadow state for the cache dirty check
    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    force_update: bool,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,
            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            force_update: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Local TRS matrix computed from the current values.
    #[inline]
    #[must_use]
    pub fn local_trs(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Cached world matrix from the last [`NodeArena::update`](crate::scene::graph::NodeArena::update).
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    /// Refreshes the cached local matrix if the TRS changed.
    ///
    /// Returns whether the cache changed.
    pub(crate) fn update_local_matrix(&mut self) -> bool {
        let changed = self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale
            || self.force_update;

        if changed {
            self.local_matrix = self.local_trs();
            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
            self.force_update = false;
        }

        changed
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.force_update = true;
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
