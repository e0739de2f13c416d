//! Animation clips and the per-skeleton clip catalog.
//!
//! A [`Sequence`] is an immutable clip: keyframed bone tracks at a fixed
//! frame rate, timed sound/fx trigger events and blend/priority metadata.
//! Clips are produced by the external asset loader; this crate only reads
//! them through shared references.

use std::collections::HashMap;
use std::sync::Arc;

use crate::skeleton::BoneTransform;

/// Kind of a timed trigger embedded in a clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Play a sound effect.
    Sound,
    /// Play a surface-dependent sound (footsteps).
    SoundGround,
    /// Spawn a particle effect.
    Fx,
    /// Opaque gameplay tag, forwarded as-is.
    Tag,
}

/// A timed sound/fx trigger.
#[derive(Clone, Debug)]
pub struct SeqEvent {
    /// Frame the event fires on.
    pub frame: u32,
    pub kind: EventKind,
    pub name: String,
}

impl SeqEvent {
    pub fn new(frame: u32, kind: EventKind, name: impl Into<String>) -> Self {
        Self {
            frame,
            kind,
            name: name.into(),
        }
    }

    fn time_ms(&self, fps: f32) -> u64 {
        (f64::from(self.frame) / f64::from(fps) * 1000.0) as u64
    }
}

/// A named, fixed-duration animation clip.
///
/// Bone tracks are stored frame-major: `samples[frame * tracks + track]`,
/// with `node_names[track]` naming the bone each track drives. A clip may
/// drive only a subset of the skeleton (partial-body clips, overlays).
#[derive(Clone, Debug)]
pub struct Sequence {
    pub name: String,
    /// Layer number; higher layers are applied on top of lower ones.
    pub layer: u8,
    pub fps: f32,
    pub num_frames: u32,
    pub looping: bool,
    /// Blend-in window in milliseconds when this clip takes over.
    pub blend_in_ms: u64,
    /// Clip chained into automatically when playback finishes.
    pub next: Option<String>,
    /// Continuation clip for the attack-combo path; never auto-chained.
    pub combo_next: Option<String>,
    pub node_names: Vec<String>,
    pub samples: Vec<BoneTransform>,
    pub events: Vec<SeqEvent>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, fps: f32, num_frames: u32) -> Self {
        Self {
            name: name.into(),
            layer: 0,
            fps,
            num_frames,
            looping: false,
            blend_in_ms: 0,
            next: None,
            combo_next: None,
            node_names: Vec::new(),
            samples: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn looped(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn with_layer(mut self, layer: u8) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_combo_next(mut self, next: impl Into<String>) -> Self {
        self.combo_next = Some(next.into());
        self
    }

    pub fn with_events(mut self, events: Vec<SeqEvent>) -> Self {
        self.events = events;
        self
    }

    /// Installs the bone tracks. `samples` must hold exactly
    /// `num_frames * node_names.len()` entries, frame-major.
    pub fn with_tracks(mut self, node_names: Vec<String>, samples: Vec<BoneTransform>) -> Self {
        debug_assert_eq!(samples.len(), self.num_frames as usize * node_names.len());
        self.node_names = node_names;
        self.samples = samples;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        if self.fps <= 0.0 {
            return 0;
        }
        (f64::from(self.num_frames) / f64::from(self.fps) * 1000.0) as u64
    }

    /// A non-looping clip is finished once the elapsed time covers it.
    pub fn is_finished(&self, elapsed_ms: u64) -> bool {
        !self.looping && elapsed_ms >= self.duration_ms()
    }

    /// Samples one track at the given clip-local time, interpolating between
    /// adjacent frames. Non-looping clips clamp to the last frame.
    pub fn sample(&self, track: usize, time_ms: u64) -> BoneTransform {
        let tracks = self.node_names.len();
        if tracks == 0 || track >= tracks || self.num_frames == 0 || self.fps <= 0.0 {
            return BoneTransform::identity();
        }

        let frames = self.num_frames as f32;
        let mut ft = (time_ms as f32 / 1000.0) * self.fps;
        if self.looping {
            ft %= frames;
        } else {
            ft = ft.min(frames - 1.0);
        }

        let f0 = ft.floor() as u32;
        let f1 = if self.looping {
            (f0 + 1) % self.num_frames
        } else {
            (f0 + 1).min(self.num_frames - 1)
        };

        let a = self.samples[f0 as usize * tracks + track];
        let b = self.samples[f1 as usize * tracks + track];
        a.lerp(&b, ft.fract())
    }

    /// Events firing in the clip-local window `(from_ms, to_ms]`, loop
    /// iterations included.
    pub fn events_between(&self, from_ms: u64, to_ms: u64) -> Vec<&SeqEvent> {
        let mut out = Vec::new();
        let dur = self.duration_ms();
        if self.events.is_empty() || dur == 0 || to_ms <= from_ms {
            return out;
        }
        let last_loop = if self.looping { to_ms / dur } else { 0 };
        for k in 0..=last_loop {
            for ev in &self.events {
                let t = k * dur + ev.time_ms(self.fps);
                if t > from_ms && t <= to_ms {
                    out.push(ev);
                }
            }
        }
        out
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Per-skeleton set of named clips.
///
/// Declaration order is preserved; when two clips share a name, the first
/// declared one wins, which keeps equally specific solver candidates stable
/// and deterministic.
#[derive(Default)]
pub struct SequenceCatalog {
    seqs: Vec<Arc<Sequence>>,
    by_name: HashMap<String, usize>,
}

impl SequenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, seq: Sequence) -> Arc<Sequence> {
        let seq = Arc::new(seq);
        self.seqs.push(seq.clone());
        self.by_name
            .entry(seq.name.clone())
            .or_insert(self.seqs.len() - 1);
        seq
    }

    pub fn get(&self, name: &str) -> Option<Arc<Sequence>> {
        self.by_name.get(name).map(|&i| self.seqs[i].clone())
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.seqs.iter()
    }
}
