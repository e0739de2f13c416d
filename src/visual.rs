//! Per-actor visual orchestration.
//!
//! [`MdlVisual`] owns the pose, the solver, the weapon-state machine and the
//! set of renderable parts bound to named bones. The owning actor drives it
//! once per simulation tick through [`MdlVisual::update_animation`], which
//! advances overlays and playback and pushes the resulting bone matrices
//! into every attached part.

use std::io::{Read, Write};
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use rand::Rng;

use crate::error::VisualError;
use crate::host::{Actor, AssetResolver};
use crate::pose::Pose;
use crate::sequence::Sequence;
use crate::skeleton::Skeleton;
use crate::solver::AnimationSolver;
use crate::state::{body_state_for, Anim, BodyFlags, BodyState, FightModeTag, WalkBit, WeaponState};

/// Number of dialog gesture clips (`T_DIALOGGESTURE_01` ...).
const DIALOG_GESTURE_COUNT: u32 = 11;

/// Opaque handle of a renderable part, owned by the host renderer. This
/// crate only moves its transform around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartHandle(pub u64);

/// A renderable mesh bound to a named bone on the active skeleton.
#[derive(Default)]
pub struct Attachment {
    part: Option<PartHandle>,
    bone: Option<String>,
    node: Option<usize>,
    mtx: Mat4,
}

impl Attachment {
    pub fn part(&self) -> Option<PartHandle> {
        self.part
    }

    pub fn bone(&self) -> Option<&str> {
        self.bone.as_deref()
    }

    /// World transform computed from the actor root and the bound bone.
    pub fn transform(&self) -> Mat4 {
        self.mtx
    }

    fn set_part(&mut self, part: Option<PartHandle>) {
        self.part = part;
    }

    fn set_attach_point(&mut self, skeleton: Option<&Arc<Skeleton>>, bone: Option<&str>) {
        self.bone = bone.map(str::to_owned);
        self.rebind(skeleton);
    }

    /// Re-resolves the stored bone name against a (re)bound skeleton.
    fn rebind(&mut self, skeleton: Option<&Arc<Skeleton>>) {
        self.node = match (&self.bone, skeleton) {
            (Some(b), Some(sk)) => sk.find_node(b),
            _ => None,
        };
    }

    fn sync(&mut self, pose: &Pose, pos: &Mat4) {
        self.mtx = match self.node {
            Some(n) => *pos * pose.bone(n),
            None => *pos,
        };
    }
}

/// A particle emitter bound to an attach point; only simulates while active.
#[derive(Default)]
pub struct Emitter {
    attach: Attachment,
    active: bool,
}

impl Emitter {
    pub fn part(&self) -> Option<PartHandle> {
        self.attach.part()
    }

    pub fn bone(&self) -> Option<&str> {
        self.attach.bone()
    }

    pub fn transform(&self) -> Mat4 {
        self.attach.transform()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Animated, weapon-aware visual state of one humanoid actor.
#[derive(Component, Default)]
pub struct MdlVisual {
    pos: Mat4,
    skeleton: Option<Arc<Skeleton>>,
    solver: AnimationSolver,
    pose: Pose,
    fight_mode: WeaponState,

    head: Attachment,
    view: Attachment,
    sword: Attachment,
    bow: Attachment,
    ammunition: Attachment,
    state_item: Attachment,
    pfx: Emitter,
    items: Vec<Attachment>,
}

impl MdlVisual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn solver(&self) -> &AnimationSolver {
        &self.solver
    }

    pub fn fight_mode(&self) -> WeaponState {
        self.fight_mode
    }

    pub fn skeleton(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }

    // ========================================================================
    // Root transform
    // ========================================================================

    pub fn set_pos_xyz(&mut self, x: f32, y: f32, z: f32) {
        let mut m = self.pos;
        m.w_axis.x = x;
        m.w_axis.y = y;
        m.w_axis.z = z;
        self.set_pos(m);
    }

    pub fn set_pos(&mut self, m: Mat4) {
        self.pos = m;
        self.sync_attachments();
    }

    pub fn position(&self) -> Mat4 {
        self.pos
    }

    // ========================================================================
    // Skeleton and parts
    // ========================================================================

    /// Rebinds the skeleton on the solver and the pose and re-resolves every
    /// attach point against it.
    pub fn set_visual(&mut self, skeleton: Option<Arc<Skeleton>>) {
        self.skeleton = skeleton.clone();
        self.solver.set_skeleton(skeleton.clone());
        self.pose.set_skeleton(skeleton);

        let sk = self.skeleton.as_ref();
        self.head.rebind(sk);
        self.view.rebind(sk);
        self.sword.rebind(sk);
        self.bow.rebind(sk);
        self.ammunition.rebind(sk);
        self.state_item.rebind(sk);
        self.pfx.attach.rebind(sk);
        for i in &mut self.items {
            i.rebind(sk);
        }
        self.sync_attachments();
    }

    pub fn set_visual_body(&mut self, head: Option<PartHandle>, body: Option<PartHandle>) {
        self.head.set_part(head);
        self.head
            .set_attach_point(self.skeleton.as_ref(), Some("BIP01 HEAD"));
        self.view.set_part(body);
        self.view.set_attach_point(self.skeleton.as_ref(), None);
        self.sync_attachments();
    }

    pub fn set_armour(&mut self, body: Option<PartHandle>) {
        self.view.set_part(body);
        self.view.set_attach_point(self.skeleton.as_ref(), None);
        self.sync_attachments();
    }

    pub fn set_sword(&mut self, sword: Option<PartHandle>) {
        self.sword.set_part(sword);
        self.sync_attachments();
    }

    pub fn set_range_weapon(&mut self, bow: Option<PartHandle>) {
        self.bow.set_part(bow);
        self.sync_attachments();
    }

    pub fn set_ammo_item(&mut self, ammo: Option<PartHandle>, bone: &str) {
        self.ammunition.set_part(ammo);
        self.ammunition
            .set_attach_point(self.skeleton.as_ref(), Some(bone));
        self.sync_attachments();
    }

    pub fn set_magic_weapon(&mut self, spell: Option<PartHandle>) {
        self.pfx.attach.set_part(spell);
        self.sync_attachments();
    }

    pub fn set_state_item(&mut self, item: Option<PartHandle>, bone: &str) {
        self.state_item.set_part(item);
        self.state_item
            .set_attach_point(self.skeleton.as_ref(), Some(bone));
        self.sync_attachments();
    }

    /// Binds an inventory visual to a named bone. No-op without a bone; a
    /// second item on an occupied bone replaces the prior occupant.
    pub fn set_slot_item(&mut self, item: PartHandle, bone: Option<&str>) {
        let Some(bone) = bone else {
            return;
        };
        if let Some(slot) = self
            .items
            .iter_mut()
            .find(|i| i.bone() == Some(bone))
        {
            slot.set_part(Some(item));
        } else {
            let mut slot = Attachment::default();
            slot.set_part(Some(item));
            slot.set_attach_point(self.skeleton.as_ref(), Some(bone));
            self.items.push(slot);
        }
        self.sync_attachments();
    }

    /// Removes slot items bound to `bone`, or every slot item when `bone` is
    /// `None`. Removal is swap-with-last; remaining order is unspecified.
    pub fn clear_slot_item(&mut self, bone: Option<&str>) {
        let mut i = 0;
        while i < self.items.len() {
            if bone.map_or(true, |b| self.items[i].bone() == Some(b)) {
                self.items.swap_remove(i);
            } else {
                i += 1;
            }
        }
        self.sync_attachments();
    }

    pub fn slot_items(&self) -> &[Attachment] {
        &self.items
    }

    pub fn head(&self) -> &Attachment {
        &self.head
    }

    pub fn body(&self) -> &Attachment {
        &self.view
    }

    pub fn sword(&self) -> &Attachment {
        &self.sword
    }

    pub fn range_weapon(&self) -> &Attachment {
        &self.bow
    }

    pub fn ammunition(&self) -> &Attachment {
        &self.ammunition
    }

    pub fn state_item(&self) -> &Attachment {
        &self.state_item
    }

    pub fn magic_weapon(&self) -> &Emitter {
        &self.pfx
    }

    // ========================================================================
    // Overlays
    // ========================================================================

    pub fn has_overlay(&self, sk: &Skeleton) -> bool {
        self.solver.has_overlay(sk)
    }

    pub fn add_overlay(&mut self, sk: Arc<Skeleton>, until: u64) {
        self.solver.add_overlay(sk, until);
    }

    pub fn del_overlay_by_name(&mut self, name: &str) {
        self.solver.del_overlay_by_name(name);
    }

    pub fn del_overlay(&mut self, sk: &Skeleton) {
        self.solver.del_overlay(sk);
    }

    // ========================================================================
    // Weapon-state machine
    // ========================================================================

    /// Maps the external fight-mode tag onto the weapon state. The reserved
    /// tag is a no-op returning `false`.
    pub fn set_fight_mode(&mut self, tag: FightModeTag, actor: &dyn Actor) -> bool {
        match tag.to_weapon_state() {
            Some(f) => self.set_to_fight_mode(f, actor),
            None => false,
        }
    }

    /// Commits a new weapon state; `false` (no-op) when it equals the
    /// current one. Every commit recomputes weapon attachment bones.
    pub fn set_to_fight_mode(&mut self, f: WeaponState, actor: &dyn Actor) -> bool {
        if f == self.fight_mode {
            return false;
        }
        tracing::debug!(target: "anim", from = ?self.fight_mode, to = ?f, "weapon state");
        self.fight_mode = f;
        self.update_weapon_skeleton(actor);
        true
    }

    /// Recomputes the melee/ranged/spell attach bones for the current weapon
    /// state. Sheathed weapons are pre-positioned on their carry slots.
    pub fn update_weapon_skeleton(&mut self, actor: &dyn Actor) {
        let st = self.fight_mode;
        let sk = self.skeleton.clone();
        let sk = sk.as_ref();

        if st == WeaponState::OneHanded || st == WeaponState::TwoHanded {
            self.sword.set_attach_point(sk, Some("ZS_RIGHTHAND"));
        } else {
            let two_handed = actor.melee_weapon().map_or(false, |t| t.two_handed);
            let slot = if two_handed { "ZS_LONGSWORD" } else { "ZS_SWORD" };
            self.sword.set_attach_point(sk, Some(slot));
        }

        if st == WeaponState::Bow {
            self.bow.set_attach_point(sk, Some("ZS_LEFTHAND"));
        } else if st == WeaponState::Crossbow {
            self.bow.set_attach_point(sk, Some("ZS_RIGHTHAND"));
        } else {
            let crossbow = actor.ranged_weapon().map_or(false, |t| t.crossbow);
            let slot = if crossbow { "ZS_CROSSBOW" } else { "ZS_BOW" };
            self.bow.set_attach_point(sk, Some(slot));
        }

        if st == WeaponState::Mage {
            self.pfx.attach.set_attach_point(sk, Some("ZS_RIGHTHAND"));
        }
        self.pfx.active = st == WeaponState::Mage;
        self.sync_attachments();
    }

    // ========================================================================
    // Per-tick update
    // ========================================================================

    /// Per-tick entry point: replays audible sound/fx events, advances
    /// overlays and playback, then recomputes every attached part's
    /// transform from the fresh bone matrices.
    pub fn update_animation(&mut self, actor: &mut dyn Actor, combat_flags: i32) {
        let now = actor.tick_count();

        if actor.is_in_listener_range() {
            self.pose.process_sfx(actor, now);
        }

        self.solver.update(now);
        self.pose.update(&self.solver, combat_flags, now);
        self.sync_attachments();
    }

    fn sync_attachments(&mut self) {
        self.head.sync(&self.pose, &self.pos);
        self.view.sync(&self.pose, &self.pos);
        self.sword.sync(&self.pose, &self.pos);
        self.bow.sync(&self.pose, &self.pos);
        self.ammunition.sync(&self.pose, &self.pos);
        self.state_item.sync(&self.pose, &self.pos);
        self.pfx.attach.sync(&self.pose, &self.pos);
        for i in &mut self.items {
            i.sync(&self.pose, &self.pos);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current world offset of a bone relative to the actor root, or zero
    /// for an unknown bone or unbound skeleton.
    pub fn map_bone(&self, bone: &str) -> Vec3 {
        let Some(sk) = &self.skeleton else {
            return Vec3::ZERO;
        };
        let Some(id) = sk.find_node(bone) else {
            return Vec3::ZERO;
        };
        let m = self.pos * self.pose.bone(id);
        (m.w_axis - self.pos.w_axis).truncate()
    }

    /// Projectile/effect spawn offset: the ammunition bone while aiming a
    /// bow or crossbow, the casting hand while in mage stance, else zero.
    pub fn map_weapon_bone(&self) -> Vec3 {
        match self.fight_mode {
            WeaponState::Bow | WeaponState::Crossbow => self
                .ammunition
                .bone()
                .map(|b| self.map_bone(b))
                .unwrap_or(Vec3::ZERO),
            WeaponState::Mage => self.map_bone("ZS_RIGHTHAND"),
            _ => Vec3::ZERO,
        }
    }

    /// Camera/UI target point above the actor root.
    pub fn display_position(&self) -> Vec3 {
        match &self.skeleton {
            Some(sk) => Vec3::new(0.0, sk.collision_height() * 1.5, 0.0),
            None => Vec3::ZERO,
        }
    }

    pub fn is_standing(&self) -> bool {
        self.pose.is_standing()
    }

    pub fn is_item(&self) -> bool {
        self.pose.is_item()
    }

    pub fn is_anim_exist(&self, name: &str) -> bool {
        self.solver.solve_frm(name).is_some()
    }

    pub fn combo_length(&self) -> u32 {
        self.pose.combo_length()
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Starts a fixed one-off clip by exact name.
    pub fn start_anim_by_name(
        &mut self,
        actor: &dyn Actor,
        name: &str,
        bs: BodyState,
        force: bool,
    ) -> Option<Arc<Sequence>> {
        let sq = self.solver.solve_frm(name)?;
        self.pose
            .start_anim(&self.solver, Some(&sq), bs, force, actor.tick_count())
            .then_some(sq)
    }

    /// Resolves and starts an abstract action for the given weapon/walk
    /// context. Returns the started clip, or `None` for "no change".
    pub fn start_anim_and_get(
        &mut self,
        actor: &dyn Actor,
        a: Anim,
        st: WeaponState,
        wlk: WalkBit,
    ) -> Option<Arc<Sequence>> {
        // rotations go through set_rotation
        debug_assert!(!a.is_rotation());

        if a.is_interaction() {
            let mob = actor.interactive()?;
            let sq = self.solver.solve_anim_interaction(mob, a, &self.pose)?;
            return self
                .pose
                .start_anim(
                    &self.solver,
                    Some(&sq),
                    BodyState::MobInteract,
                    false,
                    actor.tick_count(),
                )
                .then_some(sq);
        }

        let sq = self.solver.solve_anim(a, st, wlk, &self.pose)?;

        if a.is_terminal() {
            self.pose.stop_all_anim();
        }
        let force = a.forces_restart();

        let mut bs = body_state_for(a, wlk)?;
        if matches!(
            a,
            Anim::Attack | Anim::AttackLeft | Anim::AttackRight | Anim::AttackFinish
        ) && self.pose.body_state() == BodyState::Run
        {
            bs = BodyState::Run;
        }
        if wlk.contains(WalkBit::SWIM) {
            bs = BodyState::Swim;
        }

        self.pose
            .start_anim(&self.solver, Some(&sq), bs, force, actor.tick_count())
            .then_some(sq)
    }

    /// Plays the draw/sheathe transition toward `st`. `true` when the state
    /// is already active or the transition clip started.
    pub fn start_weapon_switch_anim(&mut self, actor: &dyn Actor, st: WeaponState) -> bool {
        let run = self.pose.body_state() == BodyState::Run;
        if st == self.fight_mode {
            return true;
        }
        let Some(sq) = self.solver.solve_weapon_switch(st, self.fight_mode, run) else {
            return false;
        };
        let bs = if run { BodyState::Run } else { BodyState::None };
        self.pose
            .start_anim(&self.solver, Some(&sq), bs, false, actor.tick_count())
    }

    /// Chains the next combo step for melee weapon classes, falling back to
    /// a normal start otherwise.
    pub fn continue_combo(
        &mut self,
        actor: &dyn Actor,
        a: Anim,
        st: WeaponState,
        wlk: WalkBit,
    ) -> Option<Arc<Sequence>> {
        if st.is_melee() {
            let sq = self.solver.solve_anim(a, st, wlk, &self.pose);
            if let Some(ret) = self
                .pose
                .continue_combo(&self.solver, sq.as_ref(), actor.tick_count())
            {
                return Some(ret);
            }
        }
        self.start_anim_and_get(actor, a, st, wlk)
    }

    /// Stops a clip by name (or the primary playback) and re-idles when
    /// nothing is left playing.
    pub fn stop_anim(&mut self, actor: &dyn Actor, name: Option<&str>) {
        self.pose.stop_anim(name);
        if !self.pose.has_anim() {
            self.start_anim_and_get(actor, Anim::Idle, self.fight_mode, actor.walk_mode());
        }
    }

    /// Stops only the item-interaction layer, re-idling when nothing is
    /// left.
    pub fn stop_item_state_anim(&mut self, actor: &dyn Actor) {
        self.pose.stop_item_state_anim();
        if !self.pose.has_anim() {
            self.start_anim_and_get(actor, Anim::Idle, self.fight_mode, actor.walk_mode());
        }
    }

    /// Stops locomotion unless the actor is standing or using an
    /// interactive object.
    pub fn stop_walk_anim(&mut self, actor: &dyn Actor) {
        let bs = self.pose.body_state();
        if bs != BodyState::Stand && bs != BodyState::MobInteract {
            self.pose.stop_anim(None);
            self.start_anim_and_get(actor, Anim::Idle, self.fight_mode, actor.walk_mode());
        }
    }

    pub fn set_rotation(&mut self, actor: &dyn Actor, dir: i32) {
        self.pose.set_rotation(
            &self.solver,
            self.fight_mode,
            actor.walk_mode(),
            dir,
            actor.tick_count(),
        );
    }

    /// Hard-cancels current playback (stagger, death interrupts).
    pub fn interrupt(&mut self) {
        self.pose.interrupt();
    }

    /// Starts the item-interaction clip layer for a scheme.
    pub fn start_anim_item(&mut self, actor: &dyn Actor, scheme: &str) -> bool {
        self.pose
            .set_anim_item(&self.solver, scheme, actor.tick_count())
    }

    /// Starts a spell-cast shoot clip for a spell scheme.
    pub fn start_anim_spell(&mut self, actor: &dyn Actor, scheme: &str) -> bool {
        let name = format!("S_{scheme}SHOOT");
        let sq = self.solver.solve_frm(&name);
        self.pose.start_anim(
            &self.solver,
            sq.as_ref(),
            BodyState::Casting,
            true,
            actor.tick_count(),
        )
    }

    /// Plays a random dialog gesture while unarmed with free hands.
    ///
    /// The random source is injected so gesture selection stays
    /// deterministic under test.
    pub fn start_anim_dialog<R: Rng>(&mut self, actor: &dyn Actor, rng: &mut R) -> bool {
        if !actor.body_flags().contains(BodyFlags::FREE_HANDS)
            || self.fight_mode != WeaponState::NoWeapon
        {
            return true;
        }
        let id = rng.gen_range(1..=DIALOG_GESTURE_COUNT);
        let name = format!("T_DIALOGGESTURE_{id:02}");
        let sq = self.solver.solve_frm(&name);
        self.pose.start_anim(
            &self.solver,
            sq.as_ref(),
            BodyState::Stand,
            false,
            actor.tick_count(),
        )
    }

    /// Stops whatever dialog gesture is playing.
    pub fn stop_dlg_anim(&mut self) {
        for i in 1..=DIALOG_GESTURE_COUNT {
            let name = format!("T_DIALOGGESTURE_{i:02}");
            self.pose.stop_anim(Some(&name));
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Writes one visual record: weapon state, skeleton name, then the
    /// opaque solver and pose blocks, in that fixed order.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<(), VisualError> {
        bincode::serialize_into(&mut *w, &self.fight_mode)?;
        let name = self
            .skeleton
            .as_ref()
            .map(|s| s.name().to_owned())
            .unwrap_or_default();
        bincode::serialize_into(&mut *w, &name)?;
        self.solver.save(w)?;
        self.pose.save(w)
    }

    /// Reads a visual record back, re-resolving the skeleton and overlay
    /// names through the external asset cache. Returns the skeleton name so
    /// the owning actor can finish its own rebinding.
    pub fn load<R: Read>(
        &mut self,
        r: &mut R,
        assets: &dyn AssetResolver,
    ) -> Result<String, VisualError> {
        self.fight_mode = bincode::deserialize_from(&mut *r)?;
        let name: String = bincode::deserialize_from(&mut *r)?;

        if name.is_empty() {
            self.set_visual(None);
        } else {
            match assets.skeleton(&name) {
                Some(sk) => self.set_visual(Some(sk)),
                None => {
                    tracing::warn!(target: "anim", skeleton = %name, "skeleton not found on load");
                    self.set_visual(None);
                }
            }
        }

        self.solver.load(r, assets)?;
        self.pose.load(r, &self.solver)?;
        self.sync_attachments();
        Ok(name)
    }
}
