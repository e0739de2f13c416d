//! Animation resolution policy.
//!
//! The solver turns abstract requests (action, weapon state, walk mode) into
//! concrete clips from the bound skeleton's catalog, and manages the stack
//! of overlay skeletons layered on top of it. It holds no playback state of
//! its own; that lives in [`crate::pose::Pose`].
//!
//! ## Clip naming contract
//!
//! Resolution is name-scheme driven. Weapon-specific variants carry the
//! weapon infix (`S_1HRUNL`), the generic variant drops it (`S_RUNL`); the
//! most specific existing clip wins, and ties between equally specific
//! candidates fall back to catalog declaration order. Interaction clips key
//! off the object's scheme name (`T_BENCH_STAND_2_S0`), weapon draw/sheathe
//! transitions off the pair of states (`T_RUN_2_1H`, `T_1H_2_MOVE`).

use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::VisualError;
use crate::host::{AssetResolver, Interactive};
use crate::pose::Pose;
use crate::sequence::Sequence;
use crate::skeleton::Skeleton;
use crate::state::{Anim, BodyState, WalkBit, WeaponState};

/// A secondary partial-body animation source with a time-bounded activation.
pub struct Overlay {
    skeleton: Arc<Skeleton>,
    /// Expiry tick; 0 keeps the overlay until explicit removal.
    until: u64,
}

impl Overlay {
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn until(&self) -> u64 {
        self.until
    }
}

/// Resolves abstract animation requests against the bound skeleton and its
/// overlay stack.
#[derive(Default)]
pub struct AnimationSolver {
    skeleton: Option<Arc<Skeleton>>,
    overlays: Vec<Overlay>,
}

#[derive(Serialize, Deserialize)]
struct SolverState {
    overlays: Vec<(String, u64)>,
}

impl AnimationSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebinds the base skeleton. Overlays belong to the previous skeleton
    /// and are dropped.
    pub fn set_skeleton(&mut self, skeleton: Option<Arc<Skeleton>>) {
        self.skeleton = skeleton;
        self.overlays.clear();
    }

    pub fn skeleton(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }

    // ========================================================================
    // Overlays
    // ========================================================================

    /// Pushes an overlay skeleton; `until` is the expiry tick, 0 for no
    /// expiry. Re-adding an already present overlay refreshes its timing and
    /// moves it to the top of the stack.
    pub fn add_overlay(&mut self, skeleton: Arc<Skeleton>, until: u64) {
        self.del_overlay_by_name(skeleton.name());
        tracing::debug!(target: "anim", overlay = skeleton.name(), until, "add overlay");
        self.overlays.push(Overlay { skeleton, until });
    }

    pub fn del_overlay_by_name(&mut self, name: &str) {
        self.overlays.retain(|o| o.skeleton.name() != name);
    }

    pub fn del_overlay(&mut self, skeleton: &Skeleton) {
        self.del_overlay_by_name(skeleton.name());
    }

    pub fn has_overlay(&self, skeleton: &Skeleton) -> bool {
        self.overlays
            .iter()
            .any(|o| o.skeleton.name() == skeleton.name())
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// Expires overlays whose window has passed. Untimed overlays persist.
    pub fn update(&mut self, now: u64) {
        self.overlays.retain(|o| {
            let keep = o.until == 0 || o.until > now;
            if !keep {
                tracing::debug!(target: "anim", overlay = o.skeleton.name(), "overlay expired");
            }
            keep
        });
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Exact-name lookup; overlays are searched newest-first before the base
    /// skeleton's catalog.
    pub fn solve_frm(&self, name: &str) -> Option<Arc<Sequence>> {
        for ov in self.overlays.iter().rev() {
            if let Some(sq) = ov.skeleton.anims().get(name) {
                return Some(sq);
            }
        }
        self.skeleton.as_ref()?.anims().get(name)
    }

    /// Resolves an abstract action for the given weapon/locomotion context.
    ///
    /// Returns `None` when nothing matches, meaning "retain the current
    /// animation, no state change".
    pub fn solve_anim(
        &self,
        a: Anim,
        st: WeaponState,
        wlk: WalkBit,
        pose: &Pose,
    ) -> Option<Arc<Sequence>> {
        // moving melee attack gets its own clip when the catalog has one
        if a == Anim::Attack && st.is_melee() && pose.body_state() == BodyState::Run {
            let name = format!("T_{}ATTACKMOVE", st.name_tag());
            if let Some(sq) = self.solve_frm(&name) {
                return Some(sq);
            }
        }

        let tag = st.name_tag();
        if !tag.is_empty() {
            if let Some(name) = clip_name(tag, a, wlk) {
                if let Some(sq) = self.solve_frm(&name) {
                    return Some(sq);
                }
            }
        }
        let name = clip_name("", a, wlk)?;
        self.solve_frm(&name)
    }

    /// Resolves interaction clips for an interactive object.
    pub fn solve_anim_interaction(
        &self,
        mob: &dyn Interactive,
        a: Anim,
        _pose: &Pose,
    ) -> Option<Arc<Sequence>> {
        let s = mob.scheme();
        let name = match a {
            Anim::InteractIn => format!("T_{s}_STAND_2_S0"),
            Anim::InteractOut => format!("T_{s}_S0_2_STAND"),
            Anim::InteractToStand => format!("T_{s}_S1_2_S0"),
            Anim::InteractFromStand => format!("T_{s}_S0_2_S1"),
            _ => return None,
        };
        self.solve_frm(&name)
    }

    /// Resolves the draw/sheathe transition clip between two weapon states.
    ///
    /// `run` selects the moving variant of the transition.
    pub fn solve_weapon_switch(
        &self,
        next: WeaponState,
        cur: WeaponState,
        run: bool,
    ) -> Option<Arc<Sequence>> {
        let base = if run { "MOVE" } else { "RUN" };
        let nt = next.name_tag();
        let ct = cur.name_tag();
        match (ct.is_empty(), nt.is_empty()) {
            (true, true) => None,
            // draw
            (true, false) => self.solve_frm(&format!("T_{base}_2_{nt}")),
            // sheathe
            (false, true) => self.solve_frm(&format!("T_{ct}_2_{base}")),
            // direct switch, falling back to sheathing the current weapon
            (false, false) => self
                .solve_frm(&format!("T_{ct}_2_{nt}"))
                .or_else(|| self.solve_frm(&format!("T_{ct}_2_{base}"))),
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Writes the overlay list (names and expiry ticks).
    pub fn save<W: Write>(&self, w: &mut W) -> Result<(), VisualError> {
        let state = SolverState {
            overlays: self
                .overlays
                .iter()
                .map(|o| (o.skeleton.name().to_owned(), o.until))
                .collect(),
        };
        bincode::serialize_into(&mut *w, &state)?;
        Ok(())
    }

    /// Restores the overlay list, re-resolving skeleton names through the
    /// external asset cache. Names the cache no longer knows are dropped.
    pub fn load<R: Read>(
        &mut self,
        r: &mut R,
        assets: &dyn AssetResolver,
    ) -> Result<(), VisualError> {
        let state: SolverState = bincode::deserialize_from(&mut *r)?;
        self.overlays.clear();
        for (name, until) in state.overlays {
            match assets.skeleton(&name) {
                Some(sk) => self.overlays.push(Overlay { skeleton: sk, until }),
                None => {
                    tracing::warn!(target: "anim", overlay = %name, "overlay skeleton not found on load");
                }
            }
        }
        Ok(())
    }
}

/// Clip name for an action under the given weapon infix.
///
/// `None` means the action has no clip on this path: it is either handled by
/// a dedicated resolver (interactions, rotations route through the same
/// scheme but are allowed here for the rotation layer) or is no animation at
/// all.
fn clip_name(tag: &str, a: Anim, wlk: WalkBit) -> Option<String> {
    let walk = wlk.contains(WalkBit::WALK);
    let swim = wlk.contains(WalkBit::SWIM);
    let name = match a {
        Anim::NoAnim => return None,
        Anim::Idle => {
            if swim {
                "S_SWIM".to_owned()
            } else {
                format!("S_{tag}RUN")
            }
        }
        Anim::MagNoMana => "T_CASTFAIL".to_owned(),
        Anim::DeadA => "T_DEAD".to_owned(),
        Anim::DeadB => "T_DEADB".to_owned(),
        Anim::UnconsciousA => "S_WOUNDED".to_owned(),
        Anim::UnconsciousB => "S_WOUNDEDB".to_owned(),
        Anim::Fallen => "S_FALLEN".to_owned(),
        Anim::Move => {
            if swim {
                "S_SWIMF".to_owned()
            } else if walk {
                format!("S_{tag}WALKL")
            } else {
                format!("S_{tag}RUNL")
            }
        }
        Anim::MoveLeft => {
            if walk {
                format!("T_{tag}WALKSTRAFEL")
            } else {
                format!("T_{tag}RUNSTRAFEL")
            }
        }
        Anim::MoveRight => {
            if walk {
                format!("T_{tag}WALKSTRAFER")
            } else {
                format!("T_{tag}RUNSTRAFER")
            }
        }
        Anim::MoveBack => format!("T_{tag}JUMPB"),
        Anim::RotLeft => {
            if walk {
                format!("T_{tag}WALKTURNL")
            } else {
                format!("T_{tag}RUNTURNL")
            }
        }
        Anim::RotRight => {
            if walk {
                format!("T_{tag}WALKTURNR")
            } else {
                format!("T_{tag}RUNTURNR")
            }
        }
        Anim::Jump => "S_JUMP".to_owned(),
        Anim::JumpUp => "T_JUMPUP".to_owned(),
        Anim::JumpUpLow => "T_JUMPUPLOW".to_owned(),
        Anim::JumpUpMid => "T_JUMPUPMID".to_owned(),
        Anim::JumpHang => "S_HANG".to_owned(),
        Anim::Fall => "S_FALLDN".to_owned(),
        Anim::FallDeep => "S_FALL".to_owned(),
        Anim::SlideA => "S_SLIDE".to_owned(),
        Anim::SlideB => "S_SLIDEB".to_owned(),
        Anim::InteractIn
        | Anim::InteractOut
        | Anim::InteractToStand
        | Anim::InteractFromStand => return None,
        Anim::Attack => format!("S_{tag}ATTACK"),
        Anim::AttackLeft => format!("T_{tag}ATTACKL"),
        Anim::AttackRight => format!("T_{tag}ATTACKR"),
        Anim::AttackFinish => format!("T_{tag}SFINISH"),
        Anim::AttackBlock => format!("T_{tag}PARADE_0"),
        Anim::StumbleA => "T_STUMBLE".to_owned(),
        Anim::StumbleB => "T_STUMBLEB".to_owned(),
        Anim::AimBow => format!("S_{tag}AIM"),
    };
    Some(name)
}
