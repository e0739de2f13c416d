//! # Character Animation
//!
//! Weapon-aware skeletal animation state and attachment layer for humanoid
//! actors in a real-time action RPG.
//!
//! ## Features
//!
//! - **Layered state machine**: weapon state x body state x walk mode x
//!   combo progress drive clip selection
//! - **Clip resolution**: weapon-specific variants with generic fallback,
//!   overlay skeletons with time-bounded activation
//! - **Runtime pose**: idempotent playback control, combo chaining, per-bone
//!   transform cache recomputed each tick
//! - **Attachments**: head, weapons, ammunition, carried items and spell
//!   emitters bound to named bones and kept in sync with the pose
//! - **Persistence**: binary save/load of the whole visual record
//!
//! ## Architecture
//!
//! The owning actor calls [`MdlVisual::update_animation`] once per
//! simulation tick; the visual asks the [`AnimationSolver`] to advance
//! overlays and the [`Pose`] to advance playback, then pushes the actor root
//! transform and the fresh bone matrices into every attached part. Asset
//! loading, scripting, physics and rendering stay outside, reached only
//! through the traits in [`host`].
//!
//! ## Example
//!
//! ```ignore
//! use character_animation::{Anim, MdlVisual, WalkBit, WeaponState};
//!
//! let mut visual = MdlVisual::new();
//! visual.set_visual(Some(skeleton));
//! visual.start_anim_and_get(&actor, Anim::Move, WeaponState::NoWeapon, WalkBit::empty());
//! visual.update_animation(&mut actor, 0);
//! ```
//!
//! [`MdlVisual::update_animation`]: visual::MdlVisual::update_animation
//! [`AnimationSolver`]: solver::AnimationSolver
//! [`Pose`]: pose::Pose

/// Error types for the persistence surface
pub mod error;
/// Collaborator traits toward the owning game
pub mod host;
/// Runtime skeletal instance and playback control
pub mod pose;
/// Animation clips and the per-skeleton catalog
pub mod sequence;
/// Read-only skeleton adapter
pub mod skeleton;
/// Clip resolution policy and overlay stack
pub mod solver;
/// Weapon, body and locomotion state enumerations
pub mod state;
/// Per-actor visual orchestration
pub mod visual;

pub use error::VisualError;
pub use host::{Actor, AssetResolver, Interactive, ItemTraits};
pub use pose::Pose;
pub use sequence::{EventKind, SeqEvent, Sequence, SequenceCatalog};
pub use skeleton::{Bone, BoneTransform, Skeleton};
pub use solver::{AnimationSolver, Overlay};
pub use state::{body_state_for, Anim, BodyFlags, BodyState, FightModeTag, WalkBit, WeaponState};
pub use visual::{Attachment, Emitter, MdlVisual, PartHandle};
