//! Weapon, body and locomotion state for humanoid actors.
//!
//! Every enumeration here is a closed tagged union: transitions and the
//! body-state derivation are total functions, so every combination has a
//! defined outcome.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ============================================================================
// Weapon state
// ============================================================================

/// Which weapon class currently governs combat animation and attachment.
///
/// Exactly one state is active per actor at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponState {
    #[default]
    NoWeapon,
    Fist,
    OneHanded,
    TwoHanded,
    Bow,
    Crossbow,
    Mage,
}

impl WeaponState {
    /// Melee classes are the only ones eligible for attack combos.
    pub fn is_melee(self) -> bool {
        matches!(
            self,
            WeaponState::Fist | WeaponState::OneHanded | WeaponState::TwoHanded
        )
    }

    /// Clip-name infix used by weapon-specific animation variants.
    ///
    /// Empty for [`WeaponState::NoWeapon`]; the generic clip name is the
    /// fallback for every state.
    pub(crate) fn name_tag(self) -> &'static str {
        match self {
            WeaponState::NoWeapon => "",
            WeaponState::Fist => "FIST",
            WeaponState::OneHanded => "1H",
            WeaponState::TwoHanded => "2H",
            WeaponState::Bow => "BOW",
            WeaponState::Crossbow => "CBOW",
            WeaponState::Mage => "MAG",
        }
    }
}

/// External fight-mode enumeration, as handed over by the scripting layer.
///
/// [`FightModeTag::Last`] is the reserved invalid tag; mapping it is always a
/// no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FightModeTag {
    Last,
    None,
    Fist,
    OneHanded,
    TwoHanded,
    Bow,
    Crossbow,
    Mage,
}

impl FightModeTag {
    /// Maps the external tag onto the internal weapon state.
    ///
    /// Returns `None` only for the reserved [`FightModeTag::Last`] value.
    pub fn to_weapon_state(self) -> Option<WeaponState> {
        match self {
            FightModeTag::Last => None,
            FightModeTag::None => Some(WeaponState::NoWeapon),
            FightModeTag::Fist => Some(WeaponState::Fist),
            FightModeTag::OneHanded => Some(WeaponState::OneHanded),
            FightModeTag::TwoHanded => Some(WeaponState::TwoHanded),
            FightModeTag::Bow => Some(WeaponState::Bow),
            FightModeTag::Crossbow => Some(WeaponState::Crossbow),
            FightModeTag::Mage => Some(WeaponState::Mage),
        }
    }
}

// ============================================================================
// Body state
// ============================================================================

/// Coarse locomotion/combat posture used to select blend behavior.
///
/// Derived from the requested action, never stored independently of the pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyState {
    #[default]
    None,
    Stand,
    MobInteract,
    Dead,
    Unconscious,
    Walk,
    Run,
    Jump,
    Climb,
    Fall,
    Swim,
    Parade,
    AimNear,
    Casting,
}

impl BodyState {
    /// Terminal states stop every other playing layer and always restart.
    pub fn is_terminal(self) -> bool {
        matches!(self, BodyState::Dead | BodyState::Unconscious)
    }
}

bitflags! {
    /// Extra bits combined with the body state, used for gating gestures.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BodyFlags: u8 {
        /// Hands are free; dialog gestures are allowed.
        const FREE_HANDS = 0b0000_0001;
    }
}

bitflags! {
    /// Locomotion modifier flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WalkBit: u8 {
        /// Walk instead of run.
        const WALK = 0b0000_0001;
        /// Swimming; overrides the derived body state unconditionally.
        const SWIM = 0b0000_0010;
    }
}

// ============================================================================
// Abstract actions
// ============================================================================

/// Abstract animation intent, resolved to a concrete clip by the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anim {
    NoAnim,
    Idle,
    MagNoMana,
    DeadA,
    DeadB,
    UnconsciousA,
    UnconsciousB,
    Fallen,
    Move,
    MoveLeft,
    MoveRight,
    MoveBack,
    RotLeft,
    RotRight,
    Jump,
    JumpUp,
    JumpUpLow,
    JumpUpMid,
    JumpHang,
    Fall,
    FallDeep,
    SlideA,
    SlideB,
    InteractIn,
    InteractOut,
    InteractToStand,
    InteractFromStand,
    Attack,
    AttackLeft,
    AttackRight,
    AttackFinish,
    AttackBlock,
    StumbleA,
    StumbleB,
    AimBow,
}

impl Anim {
    /// Death and unconsciousness: forced restart plus stop-all, even when the
    /// nominal body state is already active.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Anim::DeadA | Anim::DeadB | Anim::UnconsciousA | Anim::UnconsciousB
        )
    }

    /// Actions that bypass the start idempotence check.
    pub fn forces_restart(self) -> bool {
        self.is_terminal() || matches!(self, Anim::StumbleA | Anim::StumbleB | Anim::JumpHang)
    }

    /// Interaction actions route through the interactive-object resolver.
    pub fn is_interaction(self) -> bool {
        matches!(
            self,
            Anim::InteractIn | Anim::InteractOut | Anim::InteractToStand | Anim::InteractFromStand
        )
    }

    pub fn is_rotation(self) -> bool {
        matches!(self, Anim::RotLeft | Anim::RotRight)
    }
}

/// Derives the body state for an abstract action.
///
/// Total over [`Anim`]; returns `None` only for the rotation actions, which
/// never transition the body state (they go through the dedicated rotation
/// path instead of `start_anim`). The swim override and the run-aware attack
/// rule are applied by the caller, which knows the current pose.
pub fn body_state_for(a: Anim, wlk: WalkBit) -> Option<BodyState> {
    let bs = match a {
        Anim::NoAnim | Anim::Fallen => BodyState::None,
        Anim::Idle | Anim::MagNoMana => BodyState::Stand,
        Anim::DeadA | Anim::DeadB => BodyState::Dead,
        Anim::UnconsciousA | Anim::UnconsciousB => BodyState::Unconscious,
        Anim::Move | Anim::MoveLeft | Anim::MoveRight | Anim::MoveBack => {
            if wlk.contains(WalkBit::WALK) {
                BodyState::Walk
            } else {
                BodyState::Run
            }
        }
        Anim::RotLeft | Anim::RotRight => return None,
        Anim::Jump | Anim::JumpUp => BodyState::Jump,
        Anim::JumpUpLow | Anim::JumpUpMid | Anim::JumpHang => BodyState::Climb,
        Anim::Fall | Anim::FallDeep => BodyState::Fall,
        Anim::SlideA | Anim::SlideB => BodyState::None,
        Anim::InteractIn | Anim::InteractOut | Anim::InteractToStand | Anim::InteractFromStand => {
            BodyState::MobInteract
        }
        // attack keeps Run only if the pose is already running; callers patch
        // that in from the live pose
        Anim::Attack | Anim::AttackLeft | Anim::AttackRight | Anim::AttackFinish => BodyState::None,
        Anim::AttackBlock => BodyState::Parade,
        Anim::StumbleA | Anim::StumbleB => BodyState::Parade,
        Anim::AimBow => BodyState::AimNear,
    };
    Some(bs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fight_mode_mapping() {
        assert_eq!(FightModeTag::Last.to_weapon_state(), None);
        assert_eq!(FightModeTag::None.to_weapon_state(), Some(WeaponState::NoWeapon));
        assert_eq!(FightModeTag::Bow.to_weapon_state(), Some(WeaponState::Bow));
        assert_eq!(FightModeTag::Mage.to_weapon_state(), Some(WeaponState::Mage));
    }

    #[test]
    fn test_body_state_table() {
        assert_eq!(body_state_for(Anim::Idle, WalkBit::empty()), Some(BodyState::Stand));
        assert_eq!(body_state_for(Anim::MagNoMana, WalkBit::empty()), Some(BodyState::Stand));
        assert_eq!(body_state_for(Anim::DeadB, WalkBit::empty()), Some(BodyState::Dead));
        assert_eq!(
            body_state_for(Anim::UnconsciousA, WalkBit::empty()),
            Some(BodyState::Unconscious)
        );
        assert_eq!(body_state_for(Anim::Move, WalkBit::empty()), Some(BodyState::Run));
        assert_eq!(body_state_for(Anim::Move, WalkBit::WALK), Some(BodyState::Walk));
        assert_eq!(body_state_for(Anim::MoveBack, WalkBit::WALK), Some(BodyState::Walk));
        assert_eq!(body_state_for(Anim::JumpUp, WalkBit::empty()), Some(BodyState::Jump));
        assert_eq!(body_state_for(Anim::JumpHang, WalkBit::empty()), Some(BodyState::Climb));
        assert_eq!(body_state_for(Anim::FallDeep, WalkBit::empty()), Some(BodyState::Fall));
        assert_eq!(body_state_for(Anim::SlideB, WalkBit::empty()), Some(BodyState::None));
        assert_eq!(
            body_state_for(Anim::InteractIn, WalkBit::empty()),
            Some(BodyState::MobInteract)
        );
        assert_eq!(body_state_for(Anim::AttackBlock, WalkBit::empty()), Some(BodyState::Parade));
        assert_eq!(body_state_for(Anim::StumbleA, WalkBit::empty()), Some(BodyState::Parade));
        assert_eq!(body_state_for(Anim::AimBow, WalkBit::empty()), Some(BodyState::AimNear));
        assert_eq!(body_state_for(Anim::RotLeft, WalkBit::empty()), None);
        assert_eq!(body_state_for(Anim::RotRight, WalkBit::WALK), None);
    }

    #[test]
    fn test_restart_classes() {
        assert!(Anim::DeadA.forces_restart());
        assert!(Anim::UnconsciousB.forces_restart());
        assert!(Anim::StumbleB.forces_restart());
        assert!(Anim::JumpHang.forces_restart());
        assert!(!Anim::JumpHang.is_terminal());
        assert!(!Anim::Move.forces_restart());
    }

    #[test]
    fn test_melee_classes() {
        assert!(WeaponState::Fist.is_melee());
        assert!(WeaponState::OneHanded.is_melee());
        assert!(WeaponState::TwoHanded.is_melee());
        assert!(!WeaponState::Bow.is_melee());
        assert!(!WeaponState::NoWeapon.is_melee());
    }
}
