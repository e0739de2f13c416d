//! Collaborator interfaces consumed by the animation core.
//!
//! These traits are the seams toward the owning game: the actor and its
//! world, interactive objects, and the external asset cache. The crate only
//! calls through them and never implements them itself.

use std::sync::Arc;

use crate::skeleton::Skeleton;
use crate::state::{BodyFlags, WalkBit};

/// Flags of an equipped item that matter for weapon attachment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemTraits {
    /// Melee weapon needs both hands (longsword slot when sheathed).
    pub two_handed: bool,
    /// Ranged weapon is a crossbow (crossbow slot when sheathed).
    pub crossbow: bool,
}

/// An interactive world object (lever, bench, anvil, ...).
///
/// The scheme name keys the interaction clip family, e.g. scheme `BENCH`
/// resolves `T_BENCH_STAND_2_S0` for entering.
pub trait Interactive {
    fn scheme(&self) -> &str;
}

/// Accessors of the owning actor, passed into the per-tick entry point.
///
/// Also the sink for sound/fx events replayed from clips; events are only
/// delivered while the actor is within listener range.
pub trait Actor {
    /// Monotonically increasing world tick counter, in milliseconds.
    fn tick_count(&self) -> u64;

    /// Whether any listener is close enough to hear this actor.
    fn is_in_listener_range(&self) -> bool;

    fn walk_mode(&self) -> WalkBit;

    fn body_flags(&self) -> BodyFlags;

    /// The interactive object the actor is currently using, if any.
    fn interactive(&self) -> Option<&dyn Interactive>;

    /// Currently equipped melee weapon.
    fn melee_weapon(&self) -> Option<ItemTraits>;

    /// Currently equipped ranged weapon.
    fn ranged_weapon(&self) -> Option<ItemTraits>;

    fn play_sound(&mut self, name: &str);

    fn spawn_fx(&mut self, name: &str);
}

/// Re-resolves asset names to live references on load.
///
/// The save record stores skeleton names only; the external asset cache owns
/// the actual skeletons for the whole session.
pub trait AssetResolver {
    fn skeleton(&self, name: &str) -> Option<Arc<Skeleton>>;
}
