//! Read-only skeleton adapter.
//!
//! A [`Skeleton`] is owned by an external asset cache and shared into actor
//! visuals via `Arc`; this crate never mutates one. Besides the bone
//! hierarchy it carries the per-skeleton clip catalog and the collision
//! height used for camera/UI targeting.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::sequence::SequenceCatalog;

/// Local bone transform relative to the parent bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl BoneTransform {
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Linear blend; rotation uses slerp.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

/// A single bone. Parents always precede children in the skeleton's bone
/// list, so a single forward pass can flatten local to world transforms.
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    /// Reference (bind) pose, relative to the parent.
    pub local: BoneTransform,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            local: BoneTransform::identity(),
        }
    }

    pub fn with_local(mut self, local: BoneTransform) -> Self {
        self.local = local;
        self
    }
}

/// Bone hierarchy plus named attachment points and the per-skeleton set of
/// animation clips.
pub struct Skeleton {
    name: String,
    bones: Vec<Bone>,
    by_name: HashMap<String, usize>,
    collision_height: f32,
    anims: SequenceCatalog,
}

impl Skeleton {
    pub fn new(
        name: impl Into<String>,
        bones: Vec<Bone>,
        collision_height: f32,
        anims: SequenceCatalog,
    ) -> Arc<Self> {
        debug_assert!(bones
            .iter()
            .enumerate()
            .all(|(i, b)| b.parent.map_or(true, |p| p < i)));

        let by_name = bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        Arc::new(Self {
            name: name.into(),
            bones,
            by_name,
            collision_height,
            anims,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collision_height(&self) -> f32 {
        self.collision_height
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Looks up a bone (or attachment point) by name.
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn anims(&self) -> &SequenceCatalog {
        &self.anims
    }

    /// Reference-pose local transforms, in bone order.
    pub(crate) fn reference_locals(&self) -> impl Iterator<Item = BoneTransform> + '_ {
        self.bones.iter().map(|b| b.local)
    }
}
