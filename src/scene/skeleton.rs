use glam::Affine3A;
use uuid::Uuid;

use crate::scene::transform::Transform;

/// Index of a bone within its skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneId(pub usize);

/// What the hierarchy needs from a mesh/skeleton component.
///
/// Bone poses are expressed in the mesh's model space; the caller composes
/// them with the owning entity's world transform.
pub trait BoneSource {
    /// Looks up a bone by name.
    fn find_bone(&self, name: &str) -> Option<BoneId>;

    /// Model-space pose of `bone` as of the last pose update.
    fn bone_model_matrix(&self, bone: BoneId) -> Option<Affine3A>;

    /// Recomputes all bone poses immediately.
    fn update_pose(&mut self);
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone; must precede this bone in the skeleton.
    pub parent: Option<usize>,
    /// Pose relative to the parent bone (or the mesh for root bones).
    pub local: Transform,
    pub(crate) model: Affine3A,
}

impl Bone {
    #[must_use]
    pub fn new(name: &str, parent: Option<usize>, local: Transform) -> Self {
        Self {
            name: name.to_string(),
            parent,
            local,
            model: local.matrix(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    pub id: Uuid,
    pub name: String,

    // Ordered so that every parent precedes its children
    bones: Vec<Bone>,
}

impl Skeleton {
    #[must_use]
    pub fn new(name: &str, mut bones: Vec<Bone>) -> Self {
        for i in 0..bones.len() {
            if let Some(p) = bones[i].parent
                && p >= i
            {
                log::warn!(
                    "Skeleton '{name}': bone '{}' lists parent {p} that does not precede it; treating it as a root bone",
                    bones[i].name
                );
                bones[i].parent = None;
            }
        }

        let mut skeleton = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bones,
        };
        skeleton.compute_pose();
        skeleton
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Sets the local pose of a bone. Takes effect on the next pose update.
    ///
    /// Non-finite poses are refused and leave the bone untouched.
    pub fn set_bone_transform(&mut self, index: usize, local: Transform) -> bool {
        if !local.is_finite() {
            log::warn!("Skeleton '{}': ignoring non-finite pose for bone {index}", self.name);
            return false;
        }
        match self.bones.get_mut(index) {
            Some(bone) => {
                bone.local = local;
                true
            }
            None => false,
        }
    }

    /// Recomputes the model-space matrix of every bone.
    pub fn compute_pose(&mut self) {
        for i in 0..self.bones.len() {
            let local = self.bones[i].local.matrix();
            let model = match self.bones[i].parent {
                Some(p) => self.bones[p].model * local,
                None => local,
            };
            self.bones[i].model = model;
        }
    }

    #[inline]
    #[must_use]
    pub fn model_matrix(&self, index: usize) -> Option<Affine3A> {
        self.bones.get(index).map(|b| b.model)
    }
}

/// Mesh component: an asset reference plus the skeleton once it has loaded.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub asset: String,
    skeleton: Option<Skeleton>,
}

impl Mesh {
    #[must_use]
    pub fn new(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            skeleton: None,
        }
    }

    #[must_use]
    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeleton = Some(skeleton);
        self
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    #[inline]
    pub fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        self.skeleton.as_mut()
    }

    /// Replaces the skeleton, returning the previous one.
    pub(crate) fn replace_skeleton(&mut self, skeleton: Option<Skeleton>) -> Option<Skeleton> {
        std::mem::replace(&mut self.skeleton, skeleton)
    }

    /// Sets a bone's local pose by name. Returns `false` if there is no such bone.
    pub fn set_bone_transform(&mut self, bone: &str, local: Transform) -> bool {
        let Some(skeleton) = self.skeleton.as_mut() else {
            return false;
        };
        match skeleton.bone_index(bone) {
            Some(i) => skeleton.set_bone_transform(i, local),
            None => false,
        }
    }
}

impl BoneSource for Mesh {
    fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.skeleton.as_ref()?.bone_index(name).map(BoneId)
    }

    fn bone_model_matrix(&self, bone: BoneId) -> Option<Affine3A> {
        self.skeleton.as_ref()?.model_matrix(bone.0)
    }

    fn update_pose(&mut self) {
        if let Some(skeleton) = self.skeleton.as_mut() {
            skeleton.compute_pose();
        }
    }
}
