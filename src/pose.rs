//! Runtime skeletal instance.
//!
//! A [`Pose`] owns the playing animation layers of one actor: the primary
//! clip, the item-interaction layer and the rotation layer, plus blend
//! bookkeeping, the combo counter and the per-bone transform cache that is
//! recomputed once per tick.

use std::io::{Read, Write};
use std::sync::Arc;

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::error::VisualError;
use crate::host::Actor;
use crate::sequence::{EventKind, Sequence};
use crate::skeleton::{BoneTransform, Skeleton};
use crate::solver::AnimationSolver;
use crate::state::{Anim, BodyState, WalkBit, WeaponState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LayerKind {
    Primary,
    Item,
    Rotation,
}

struct Layer {
    seq: Arc<Sequence>,
    /// Tick the clip started at.
    start: u64,
    kind: LayerKind,
    /// Absolute tick sound/fx replay has been processed up to.
    sfx_done: u64,
}

/// Mutable per-actor animation state.
///
/// At most one primary sequence plays at a time; overlays augment clip
/// resolution in the solver but never replace the primary here.
#[derive(Default)]
pub struct Pose {
    skeleton: Option<Arc<Skeleton>>,
    layers: Vec<Layer>,
    /// Previous primary clip, frozen at the elapsed time it was replaced at;
    /// source side of the blend-in window.
    prev: Option<(Arc<Sequence>, u64)>,
    body_state: BodyState,
    combo: u16,
    locals: Vec<BoneTransform>,
    trs: Vec<Mat4>,
    last_update: u64,
}

#[derive(Serialize, Deserialize)]
struct LayerState {
    name: String,
    start: u64,
    kind: LayerKind,
    sfx_done: u64,
}

#[derive(Serialize, Deserialize)]
struct PoseState {
    layers: Vec<LayerState>,
    prev: Option<(String, u64)>,
    body_state: BodyState,
    combo: u16,
    last_update: u64,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebinds the skeleton and discards all in-flight playback state.
    pub fn set_skeleton(&mut self, skeleton: Option<Arc<Skeleton>>) {
        self.skeleton = skeleton;
        self.layers.clear();
        self.prev = None;
        self.combo = 0;
        self.body_state = BodyState::None;
        self.locals.clear();
        self.trs.clear();
    }

    fn primary_index(&self) -> Option<usize> {
        self.layers.iter().position(|l| l.kind == LayerKind::Primary)
    }

    /// The active primary sequence, if any.
    pub fn current_sequence(&self) -> Option<&Arc<Sequence>> {
        self.primary_index().map(|i| &self.layers[i].seq)
    }

    /// Tick the primary sequence started at.
    pub fn started_at(&self) -> Option<u64> {
        self.primary_index().map(|i| self.layers[i].start)
    }

    pub fn body_state(&self) -> BodyState {
        self.body_state
    }

    pub fn combo_length(&self) -> u32 {
        u32::from(self.combo)
    }

    pub fn is_standing(&self) -> bool {
        self.body_state == BodyState::Stand
    }

    pub fn is_item(&self) -> bool {
        self.layers.iter().any(|l| l.kind == LayerKind::Item)
    }

    pub fn has_anim(&self) -> bool {
        self.primary_index().is_some()
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Starts `sq` as the primary clip under `bs`.
    ///
    /// Returns `false` without touching playback when the same sequence is
    /// already active under the same body state and `force` is not set; this
    /// is the idempotence guarantee that prevents restart jitter. Terminal
    /// body states stop every other layer first and always restart.
    pub fn start_anim(
        &mut self,
        _solver: &AnimationSolver,
        sq: Option<&Arc<Sequence>>,
        bs: BodyState,
        force: bool,
        now: u64,
    ) -> bool {
        let Some(sq) = sq else {
            return false;
        };

        if !force && self.body_state == bs {
            if let Some(cur) = self.current_sequence() {
                if cur.name == sq.name {
                    return false;
                }
            }
        }

        if bs.is_terminal() {
            self.layers.clear();
        }

        tracing::debug!(target: "anim", clip = %sq.name, state = ?bs, "start");
        if let Some(i) = self.primary_index() {
            let old = self.layers.remove(i);
            self.prev = Some((old.seq, now.saturating_sub(old.start)));
        }
        self.layers.push(Layer {
            seq: sq.clone(),
            start: now,
            kind: LayerKind::Primary,
            sfx_done: now,
        });
        self.body_state = bs;
        self.combo = 0;
        true
    }

    /// Stops a clip by name, or the primary playback when `name` is `None`.
    pub fn stop_anim(&mut self, name: Option<&str>) {
        match name {
            Some(n) => self.layers.retain(|l| l.seq.name != n),
            None => self.layers.retain(|l| l.kind != LayerKind::Primary),
        }
    }

    /// Stops only the item-interaction layer.
    pub fn stop_item_state_anim(&mut self) {
        self.layers.retain(|l| l.kind != LayerKind::Item);
    }

    /// Clears every layer unconditionally.
    pub fn stop_all_anim(&mut self) {
        self.layers.clear();
    }

    /// Hard cancel: discards all in-flight playback state, no completion
    /// event.
    pub fn interrupt(&mut self) {
        tracing::debug!(target: "anim", "interrupt");
        self.layers.clear();
        self.prev = None;
        self.combo = 0;
        self.body_state = BodyState::None;
    }

    /// Advances the combo instead of restarting from the base clip.
    ///
    /// Eligible while the primary clip declares a continuation and is still
    /// present: [`Pose::update`] removes a finished attack unless combat
    /// focus holds it on its last frame, so presence of the layer is the
    /// combo window. The caller restricts this to the melee weapon classes.
    /// Falls through (`None`) otherwise.
    pub fn continue_combo(
        &mut self,
        solver: &AnimationSolver,
        sq: Option<&Arc<Sequence>>,
        now: u64,
    ) -> Option<Arc<Sequence>> {
        sq?;
        let i = self.primary_index()?;
        let chain = self.layers[i].seq.combo_next.clone()?;
        let next = solver.solve_frm(&chain)?;

        self.combo += 1;
        tracing::debug!(target: "anim", clip = %next.name, combo = self.combo, "combo step");
        let l = &mut self.layers[i];
        self.prev = Some((
            std::mem::replace(&mut l.seq, next.clone()),
            now.saturating_sub(l.start),
        ));
        l.start = now;
        l.sfx_done = now;
        Some(next)
    }

    /// Starts the item-interaction clip layer for a scheme, replacing any
    /// running one.
    pub fn set_anim_item(&mut self, solver: &AnimationSolver, scheme: &str, now: u64) -> bool {
        let name = format!("T_{scheme}_STAND_2_S0");
        let Some(sq) = solver.solve_frm(&name) else {
            return false;
        };
        self.stop_item_state_anim();
        self.layers.push(Layer {
            seq: sq,
            start: now,
            kind: LayerKind::Item,
            sfx_done: now,
        });
        true
    }

    /// Drives the dedicated rotation layer. `dir < 0` turns left, `> 0`
    /// right, `0` stops rotating. Never touches the primary clip or the body
    /// state.
    pub fn set_rotation(
        &mut self,
        solver: &AnimationSolver,
        st: WeaponState,
        wlk: WalkBit,
        dir: i32,
        now: u64,
    ) {
        if dir == 0 {
            self.layers.retain(|l| l.kind != LayerKind::Rotation);
            return;
        }
        let a = if dir < 0 { Anim::RotLeft } else { Anim::RotRight };
        let Some(sq) = solver.solve_anim(a, st, wlk, self) else {
            return;
        };
        if self
            .layers
            .iter()
            .any(|l| l.kind == LayerKind::Rotation && l.seq.name == sq.name)
        {
            return;
        }
        self.layers.retain(|l| l.kind != LayerKind::Rotation);
        self.layers.push(Layer {
            seq: sq,
            start: now,
            kind: LayerKind::Rotation,
            sfx_done: now,
        });
    }

    // ========================================================================
    // Per-tick work
    // ========================================================================

    /// Replays embedded sound/fx events for the playback window since the
    /// last call. Callers gate this on listener range.
    pub fn process_sfx(&mut self, actor: &mut dyn Actor, now: u64) {
        for l in &mut self.layers {
            let from = l.sfx_done.saturating_sub(l.start);
            let to = now.saturating_sub(l.start);
            for ev in l.seq.events_between(from, to) {
                match ev.kind {
                    EventKind::Sound | EventKind::SoundGround => actor.play_sound(&ev.name),
                    EventKind::Fx => actor.spawn_fx(&ev.name),
                    // gameplay tags are consumed by the scripting side
                    EventKind::Tag => {}
                }
            }
            l.sfx_done = now;
        }
    }

    /// Advances playback and recomputes the per-bone world transforms.
    ///
    /// Must be called exactly once per tick before reading [`Pose::bone`].
    /// While `combat_flags` is non-zero, a finished attack clip with a combo
    /// continuation is held on its last frame instead of being removed, so
    /// the combo window stays open.
    pub fn update(&mut self, solver: &AnimationSolver, combat_flags: i32, now: u64) {
        self.last_update = now;

        let mut i = 0;
        while i < self.layers.len() {
            let l = &self.layers[i];
            let elapsed = now.saturating_sub(l.start);
            if !l.seq.is_finished(elapsed) {
                i += 1;
                continue;
            }
            if let Some(next) = l.seq.next.as_deref().and_then(|n| solver.solve_frm(n)) {
                let dur = l.seq.duration_ms();
                let l = &mut self.layers[i];
                tracing::trace!(target: "anim", from = %l.seq.name, to = %next.name, "chain");
                l.start += dur;
                l.seq = next;
                i += 1;
            } else if l.kind == LayerKind::Primary
                && l.seq.combo_next.is_some()
                && combat_flags != 0
            {
                i += 1;
            } else {
                let old = self.layers.remove(i);
                if old.kind == LayerKind::Primary {
                    self.prev = Some((old.seq, now.saturating_sub(old.start)));
                }
            }
        }

        self.refresh_bones(now);
    }

    /// Read-only accessor into the per-frame cache. Identity before the
    /// first update or for an out-of-range index.
    pub fn bone(&self, index: usize) -> Mat4 {
        self.trs.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    fn refresh_bones(&mut self, now: u64) {
        let Some(sk) = self.skeleton.clone() else {
            self.trs.clear();
            return;
        };
        let n = sk.bone_count();
        self.locals.clear();
        self.locals.extend(sk.reference_locals());

        // lowest layer number first; stable for equal numbers
        let mut order: Vec<usize> = (0..self.layers.len()).collect();
        order.sort_by_key(|&i| self.layers[i].seq.layer);

        for &li in &order {
            let l = &self.layers[li];
            let elapsed = now.saturating_sub(l.start);
            let blend = if l.kind == LayerKind::Primary && l.seq.blend_in_ms > 0 {
                (elapsed as f32 / l.seq.blend_in_ms as f32).min(1.0)
            } else {
                1.0
            };
            for (ti, node) in l.seq.node_names.iter().enumerate() {
                let Some(bi) = sk.find_node(node) else {
                    continue;
                };
                let target = l.seq.sample(ti, elapsed);
                if blend < 1.0 {
                    let base = self
                        .prev
                        .as_ref()
                        .and_then(|(ps, pe)| {
                            ps.node_names
                                .iter()
                                .position(|nn| nn == node)
                                .map(|pt| ps.sample(pt, *pe))
                        })
                        .unwrap_or(self.locals[bi]);
                    self.locals[bi] = base.lerp(&target, blend);
                } else {
                    self.locals[bi] = target;
                }
            }
        }

        // flatten, parents always precede children
        self.trs.resize(n, Mat4::IDENTITY);
        for i in 0..n {
            let m = self.locals[i].to_matrix();
            self.trs[i] = match sk.bone(i).and_then(|b| b.parent) {
                Some(p) => self.trs[p] * m,
                None => m,
            };
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Writes the opaque pose block: layer clip identities, start ticks,
    /// body state and combo index.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<(), VisualError> {
        let state = PoseState {
            layers: self
                .layers
                .iter()
                .map(|l| LayerState {
                    name: l.seq.name.clone(),
                    start: l.start,
                    kind: l.kind,
                    sfx_done: l.sfx_done,
                })
                .collect(),
            prev: self.prev.as_ref().map(|(s, e)| (s.name.clone(), *e)),
            body_state: self.body_state,
            combo: self.combo,
            last_update: self.last_update,
        };
        bincode::serialize_into(&mut *w, &state)?;
        Ok(())
    }

    /// Restores the pose block, re-resolving clip names through the solver.
    /// Clips the catalog no longer knows are dropped.
    pub fn load<R: Read>(
        &mut self,
        r: &mut R,
        solver: &AnimationSolver,
    ) -> Result<(), VisualError> {
        let state: PoseState = bincode::deserialize_from(&mut *r)?;
        self.layers.clear();
        for ls in state.layers {
            match solver.solve_frm(&ls.name) {
                Some(seq) => self.layers.push(Layer {
                    seq,
                    start: ls.start,
                    kind: ls.kind,
                    sfx_done: ls.sfx_done,
                }),
                None => {
                    tracing::warn!(target: "anim", clip = %ls.name, "clip not found on load");
                }
            }
        }
        self.prev = state
            .prev
            .and_then(|(name, e)| solver.solve_frm(&name).map(|s| (s, e)));
        self.body_state = state.body_state;
        self.combo = state.combo;
        self.last_update = state.last_update;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Interactive, ItemTraits};
    use crate::sequence::{SeqEvent, SequenceCatalog};
    use crate::skeleton::Bone;
    use crate::state::BodyFlags;
    use glam::{Quat, Vec3};

    fn moving_clip(name: &str, frames: u32, looping: bool) -> Sequence {
        let samples = (0..frames)
            .map(|f| {
                BoneTransform::new(Vec3::new(f as f32, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE)
            })
            .collect();
        let sq = Sequence::new(name, 10.0, frames)
            .with_tracks(vec!["BIP01".into()], samples);
        if looping {
            sq.looped()
        } else {
            sq
        }
    }

    fn fixture() -> (Arc<Skeleton>, AnimationSolver, Pose) {
        let mut cat = SequenceCatalog::new();
        cat.insert(moving_clip("S_RUN", 10, true));
        cat.insert(moving_clip("S_RUNL", 10, true));
        cat.insert(
            moving_clip("T_1HATTACKL", 10, false).with_combo_next("T_1HATTACKR"),
        );
        cat.insert(moving_clip("T_1HATTACKR", 10, false));
        cat.insert(moving_clip("T_DEAD", 5, false).with_next("S_DEAD"));
        cat.insert(moving_clip("S_DEAD", 2, true));
        cat.insert(
            Sequence::new("S_STEPPING", 10.0, 10)
                .looped()
                .with_events(vec![SeqEvent::new(2, EventKind::Sound, "WHOOSH")]),
        );
        cat.insert(moving_clip("T_BENCH_STAND_2_S0", 10, false));
        cat.insert(moving_clip("T_RUNTURNL", 10, true));

        let bones = vec![
            Bone::new("BIP01", None),
            Bone::new("BIP01 HEAD", Some(0)).with_local(BoneTransform::new(
                Vec3::new(0.0, 1.0, 0.0),
                Quat::IDENTITY,
                Vec3::ONE,
            )),
        ];
        let sk = Skeleton::new("HUMANS.MDS", bones, 180.0, cat);
        let mut solver = AnimationSolver::new();
        solver.set_skeleton(Some(sk.clone()));
        let mut pose = Pose::new();
        pose.set_skeleton(Some(sk.clone()));
        (sk, solver, pose)
    }

    struct StubActor {
        sounds: Vec<String>,
    }

    impl Actor for StubActor {
        fn tick_count(&self) -> u64 {
            0
        }
        fn is_in_listener_range(&self) -> bool {
            true
        }
        fn walk_mode(&self) -> WalkBit {
            WalkBit::empty()
        }
        fn body_flags(&self) -> BodyFlags {
            BodyFlags::empty()
        }
        fn interactive(&self) -> Option<&dyn Interactive> {
            None
        }
        fn melee_weapon(&self) -> Option<ItemTraits> {
            None
        }
        fn ranged_weapon(&self) -> Option<ItemTraits> {
            None
        }
        fn play_sound(&mut self, name: &str) {
            self.sounds.push(name.to_owned());
        }
        fn spawn_fx(&mut self, _name: &str) {}
    }

    #[test]
    fn test_start_anim_idempotent() {
        let (_sk, solver, mut pose) = fixture();
        let run = solver.solve_frm("S_RUNL");

        assert!(pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 100));
        assert_eq!(pose.started_at(), Some(100));

        // same clip, same body state, no force: no-op
        assert!(!pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 500));
        assert_eq!(pose.started_at(), Some(100));

        // force restarts
        assert!(pose.start_anim(&solver, run.as_ref(), BodyState::Run, true, 500));
        assert_eq!(pose.started_at(), Some(500));

        // different body state class restarts too
        assert!(pose.start_anim(&solver, run.as_ref(), BodyState::Walk, false, 700));
        assert_eq!(pose.started_at(), Some(700));
        assert_eq!(pose.body_state(), BodyState::Walk);
    }

    #[test]
    fn test_start_anim_none_is_noop() {
        let (_sk, solver, mut pose) = fixture();
        assert!(!pose.start_anim(&solver, None, BodyState::Stand, true, 0));
        assert!(!pose.has_anim());
    }

    #[test]
    fn test_terminal_state_clears_layers() {
        let (_sk, solver, mut pose) = fixture();
        let run = solver.solve_frm("S_RUNL");
        pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 0);
        assert!(pose.set_anim_item(&solver, "BENCH", 0));
        assert!(pose.is_item());

        let dead = solver.solve_frm("T_DEAD");
        assert!(pose.start_anim(&solver, dead.as_ref(), BodyState::Dead, true, 50));
        assert_eq!(pose.layers.len(), 1);
        assert_eq!(pose.current_sequence().unwrap().name, "T_DEAD");
        assert_eq!(pose.body_state(), BodyState::Dead);

        // re-death restarts even though the body state is already Dead
        assert!(pose.start_anim(&solver, dead.as_ref(), BodyState::Dead, true, 90));
        assert_eq!(pose.started_at(), Some(90));
    }

    #[test]
    fn test_finished_clip_chains_next() {
        let (_sk, solver, mut pose) = fixture();
        let dead = solver.solve_frm("T_DEAD");
        pose.start_anim(&solver, dead.as_ref(), BodyState::Dead, true, 0);

        // T_DEAD is 500ms at 10 fps/5 frames; after that it chains to S_DEAD
        pose.update(&solver, 0, 600);
        assert_eq!(pose.current_sequence().unwrap().name, "S_DEAD");
        assert_eq!(pose.started_at(), Some(500));
        assert!(pose.has_anim());
    }

    #[test]
    fn test_finished_clip_without_next_is_removed() {
        let (_sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKR");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 0);
        pose.update(&solver, 0, 2000);
        assert!(!pose.has_anim());
    }

    #[test]
    fn test_combat_flags_hold_attack_for_combo() {
        let (_sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKL");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 0);
        pose.update(&solver, 1, 2000);
        // clip is past its end but held open for a continuation
        assert!(pose.has_anim());
        pose.update(&solver, 0, 2001);
        assert!(!pose.has_anim());
    }

    #[test]
    fn test_continue_combo() {
        let (_sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKL");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 0);
        assert_eq!(pose.combo_length(), 0);

        // inside the window: advances to the chained step
        let next = pose.continue_combo(&solver, atk.as_ref(), 400).unwrap();
        assert_eq!(next.name, "T_1HATTACKR");
        assert_eq!(pose.combo_length(), 1);
        assert_eq!(pose.started_at(), Some(400));

        // T_1HATTACKR declares no continuation: falls through
        assert!(pose.continue_combo(&solver, atk.as_ref(), 500).is_none());
    }

    #[test]
    fn test_continue_combo_window_closed() {
        let (_sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKL");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 0);
        // out of combat the finished clip is removed, closing the window
        pose.update(&solver, 0, 1500);
        assert!(pose.continue_combo(&solver, atk.as_ref(), 1500).is_none());
        assert_eq!(pose.combo_length(), 0);
    }

    #[test]
    fn test_combo_continues_from_held_attack() {
        let (_sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKL");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 0);

        // finished at 1200 but held on the last frame while in combat
        pose.update(&solver, 1, 1200);
        assert!(pose.has_anim());

        let next = pose.continue_combo(&solver, atk.as_ref(), 1200).unwrap();
        assert_eq!(next.name, "T_1HATTACKR");
        assert_eq!(pose.combo_length(), 1);
        assert_eq!(pose.started_at(), Some(1200));
    }

    #[test]
    fn test_stop_variants() {
        let (_sk, solver, mut pose) = fixture();
        let run = solver.solve_frm("S_RUNL");
        pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 0);

        pose.stop_anim(Some("S_OTHER"));
        assert!(pose.has_anim());
        pose.stop_anim(Some("S_RUNL"));
        assert!(!pose.has_anim());

        pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 10);
        pose.stop_anim(None);
        assert!(!pose.has_anim());
    }

    #[test]
    fn test_rotation_layer() {
        let (_sk, solver, mut pose) = fixture();
        let run = solver.solve_frm("S_RUNL");
        pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 0);

        pose.set_rotation(&solver, WeaponState::NoWeapon, WalkBit::empty(), -1, 10);
        assert_eq!(pose.layers.len(), 2);
        assert_eq!(pose.body_state(), BodyState::Run);
        // re-requesting the same direction does not restart the layer
        pose.set_rotation(&solver, WeaponState::NoWeapon, WalkBit::empty(), -1, 400);
        let rot = pose
            .layers
            .iter()
            .find(|l| l.kind == LayerKind::Rotation)
            .unwrap();
        assert_eq!(rot.start, 10);

        pose.set_rotation(&solver, WeaponState::NoWeapon, WalkBit::empty(), 0, 500);
        assert_eq!(pose.layers.len(), 1);
        assert!(pose.has_anim());
    }

    #[test]
    fn test_interrupt_discards_everything() {
        let (_sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKL");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 0);
        pose.continue_combo(&solver, atk.as_ref(), 100);
        pose.interrupt();
        assert!(!pose.has_anim());
        assert_eq!(pose.combo_length(), 0);
        assert_eq!(pose.body_state(), BodyState::None);
    }

    #[test]
    fn test_bone_cache_identity_before_update() {
        let (_sk, _solver, pose) = fixture();
        assert_eq!(pose.bone(0), Mat4::IDENTITY);
        assert_eq!(pose.bone(99), Mat4::IDENTITY);
    }

    #[test]
    fn test_update_recomputes_bone_matrices() {
        let (_sk, solver, mut pose) = fixture();
        let run = solver.solve_frm("S_RUNL");
        pose.start_anim(&solver, run.as_ref(), BodyState::Run, false, 0);

        // at 100ms the root track sits at frame 1: x = 1
        pose.update(&solver, 0, 100);
        let root = pose.bone(0);
        assert!((root.w_axis.x - 1.0).abs() < 1e-3);

        // head inherits the root offset plus its own local y
        let head = pose.bone(1);
        assert!((head.w_axis.x - 1.0).abs() < 1e-3);
        assert!((head.w_axis.y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_process_sfx_window() {
        let (_sk, solver, mut pose) = fixture();
        let step = solver.solve_frm("S_STEPPING");
        pose.start_anim(&solver, step.as_ref(), BodyState::Run, false, 0);

        let mut actor = StubActor { sounds: Vec::new() };
        // event fires at 200ms clip-local
        pose.process_sfx(&mut actor, 100);
        assert!(actor.sounds.is_empty());
        pose.process_sfx(&mut actor, 300);
        assert_eq!(actor.sounds, vec!["WHOOSH".to_owned()]);
        // already replayed; the window is exclusive at the lower end
        pose.process_sfx(&mut actor, 900);
        assert_eq!(actor.sounds.len(), 1);
        // next loop iteration fires again at 1200ms
        pose.process_sfx(&mut actor, 1300);
        assert_eq!(actor.sounds.len(), 2);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (sk, solver, mut pose) = fixture();
        let atk = solver.solve_frm("T_1HATTACKL");
        pose.start_anim(&solver, atk.as_ref(), BodyState::None, false, 250);
        pose.continue_combo(&solver, atk.as_ref(), 600);

        let mut buf = Vec::new();
        pose.save(&mut buf).unwrap();

        let mut restored = Pose::new();
        restored.set_skeleton(Some(sk));
        restored.load(&mut buf.as_slice(), &solver).unwrap();

        assert_eq!(
            restored.current_sequence().unwrap().name,
            pose.current_sequence().unwrap().name
        );
        assert_eq!(restored.started_at(), pose.started_at());
        assert_eq!(restored.combo_length(), pose.combo_length());
        assert_eq!(restored.body_state(), pose.body_state());
    }
}
