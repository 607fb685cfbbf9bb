//! Real-time synthesis: oscillators, envelopes, voices and the mixer.
//!
//! Everything in this module runs (or is written to be runnable) on the
//! audio render thread. The `Mixer` owns all sounding voices, drains a
//! command queue at the top of every callback and then renders sample by
//! sample. No allocation happens on the render path: voice storage is
//! pre-allocated and each voice carries a fixed-size partial table.
//!
//! Control code never touches these types directly; it goes through
//! `SynthBackend`, which the cpal backend implements by sending
//! [`RenderCmd`]s into the mixer's queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use solfa_types::Timbre;

use crate::engine::backend::{VoiceId, VoiceSpec, VoiceTag};

/// Decay floor. Exponential segments aim for this level instead of zero,
/// which a pure exponential never reaches.
pub const ENV_EPSILON: f32 = 0.001;

/// Default linear attack length.
pub const ATTACK_SECS: f64 = 0.012;

/// Shortest attack ever used; anything faster clicks audibly.
pub const MIN_ATTACK_SECS: f64 = 0.005;

/// Hard cap on simultaneously sounding voices.
pub const MAX_VOICES: usize = 32;

/// Fade applied to a stolen voice when the cap is hit.
pub const STEAL_FADE_SECS: f64 = 0.015;

/// Extra pool slots so stolen voices can finish fading while their
/// replacements already sound.
const STEAL_SLACK: usize = 8;

/// Most partials any timbre uses (piano: fundamental + two overtones).
const MAX_PARTIALS: usize = 3;

// ─── Oscillators ────────────────────────────────────────────────────

/// Primitive waveform of a single partial. `Timbre::Piano` is not a wave
/// itself; it expands to a stack of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

/// One cycle of `wave` at `phase` in `[0.0, 1.0)`, range `[-1.0, 1.0]`.
pub fn wave_sample(wave: Wave, phase: f64) -> f32 {
    match wave {
        Wave::Sine => (std::f64::consts::TAU * phase).sin() as f32,
        Wave::Triangle => {
            if phase < 0.5 {
                (4.0 * phase - 1.0) as f32
            } else {
                (3.0 - 4.0 * phase) as f32
            }
        }
        Wave::Sawtooth => (2.0 * phase - 1.0) as f32,
        Wave::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Partial recipe: frequency ratio against the fundamental, waveform,
/// relative gain.
pub fn partials_for(timbre: Timbre) -> &'static [(f64, Wave, f32)] {
    match timbre {
        Timbre::Sine => &[(1.0, Wave::Sine, 1.0)],
        Timbre::Triangle => &[(1.0, Wave::Triangle, 1.0)],
        Timbre::Sawtooth => &[(1.0, Wave::Sawtooth, 1.0)],
        Timbre::Square => &[(1.0, Wave::Square, 1.0)],
        // Warm piano-ish stack: triangle fundamental with two sine overtones,
        // all under one shared envelope.
        Timbre::Piano => &[
            (1.0, Wave::Triangle, 0.5),
            (2.0, Wave::Sine, 0.2),
            (3.0, Wave::Sine, 0.1),
        ],
    }
}

// ─── Envelope ───────────────────────────────────────────────────────

/// Lifecycle of a voice as the envelope sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Linear fade-in toward peak.
    Attacking,
    /// Exponential decay toward the floor; the musical body of the note.
    Sustaining,
    /// Externally triggered fade-out from the current level.
    Releasing,
    /// Finished; the mixer reclaims the slot.
    Retired,
}

/// Attack-then-decay amplitude envelope with an interruptible release.
///
/// The decay multiplies the level by a constant per-sample factor chosen so
/// it lands exactly on [`ENV_EPSILON`] at the end of the nominal duration.
/// `begin_release` restarts the fade from wherever the level currently is,
/// so releasing mid-attack cannot jump the gain.
#[derive(Debug, Clone)]
pub struct Envelope {
    state: VoiceState,
    level: f32,
    peak: f32,
    attack_step: f32,
    attack_left: u64,
    decay_rate: f32,
    decay_left: u64,
    release_rate: f32,
    release_step: f32,
    release_left: u64,
    release_linear: bool,
}

impl Envelope {
    pub fn new(peak: f32, attack_secs: f64, duration_secs: f64, sample_rate: f64) -> Self {
        // Attack never swallows more than half the note.
        let attack = attack_secs
            .max(MIN_ATTACK_SECS)
            .min(duration_secs * 0.5)
            .max(0.0);
        let attack_samples = ((attack * sample_rate) as u64).max(1);
        let decay_samples = (((duration_secs - attack) * sample_rate) as u64).max(1);
        Self {
            state: VoiceState::Attacking,
            level: 0.0,
            peak,
            attack_step: peak / attack_samples as f32,
            attack_left: attack_samples,
            decay_rate: (ENV_EPSILON / peak.max(ENV_EPSILON)).powf(1.0 / decay_samples as f32),
            decay_left: decay_samples,
            release_rate: 1.0,
            release_step: 0.0,
            release_left: 0,
            release_linear: false,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_done(&self) -> bool {
        self.state == VoiceState::Retired
    }

    /// Advance one sample and return the gain to apply to it.
    pub fn next(&mut self) -> f32 {
        match self.state {
            VoiceState::Attacking => {
                self.level += self.attack_step;
                self.attack_left = self.attack_left.saturating_sub(1);
                if self.attack_left == 0 || self.level >= self.peak {
                    self.level = self.peak;
                    self.state = VoiceState::Sustaining;
                }
            }
            VoiceState::Sustaining => {
                self.level *= self.decay_rate;
                self.decay_left -= 1;
                if self.decay_left == 0 || self.level <= ENV_EPSILON {
                    self.state = VoiceState::Retired;
                }
            }
            VoiceState::Releasing => {
                if self.release_linear {
                    self.level = (self.level - self.release_step).max(0.0);
                } else {
                    self.level *= self.release_rate;
                }
                self.release_left = self.release_left.saturating_sub(1);
                if self.release_left == 0 || self.level <= ENV_EPSILON {
                    self.state = VoiceState::Retired;
                }
            }
            VoiceState::Retired => return 0.0,
        }
        self.level
    }

    /// Fade out from the current level over `fade_secs`. Exponential when
    /// the level is above the floor, linear otherwise (an exponential from
    /// near-zero would stall).
    pub fn begin_release(&mut self, fade_secs: f64, sample_rate: f64) {
        if self.state == VoiceState::Retired || self.state == VoiceState::Releasing {
            return;
        }
        let samples = ((fade_secs * sample_rate) as u64).max(1);
        if self.level > ENV_EPSILON {
            self.release_linear = false;
            self.release_rate = (ENV_EPSILON / self.level).powf(1.0 / samples as f32);
        } else {
            self.release_linear = true;
            self.release_step = self.level / samples as f32;
        }
        self.release_left = samples;
        self.state = VoiceState::Releasing;
    }
}

// ─── Voice ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Partial {
    wave: Wave,
    phase: f64,
    phase_inc: f64,
    gain: f32,
}

/// One sounding tone: a partial stack under a shared envelope, scheduled
/// to begin at a specific render frame.
#[derive(Debug, Clone)]
pub struct Voice {
    id: VoiceId,
    tag: VoiceTag,
    start_frame: u64,
    env: Envelope,
    partials: [Partial; MAX_PARTIALS],
    n_partials: usize,
}

impl Voice {
    pub fn new(spec: &VoiceSpec, sample_rate: f64) -> Self {
        let attack = if spec.attack_secs > 0.0 {
            spec.attack_secs
        } else {
            ATTACK_SECS
        };
        let recipe = partials_for(spec.timbre);
        let mut partials = [Partial {
            wave: Wave::Sine,
            phase: 0.0,
            phase_inc: 0.0,
            gain: 0.0,
        }; MAX_PARTIALS];
        for (slot, &(ratio, wave, gain)) in partials.iter_mut().zip(recipe) {
            *slot = Partial {
                wave,
                phase: 0.0,
                phase_inc: spec.freq_hz * ratio / sample_rate,
                gain,
            };
        }
        Self {
            id: spec.id,
            tag: spec.tag,
            start_frame: (spec.start_secs.max(0.0) * sample_rate) as u64,
            env: Envelope::new(spec.gain, attack, spec.duration_secs, sample_rate),
            partials,
            n_partials: recipe.len(),
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn tag(&self) -> VoiceTag {
        self.tag
    }

    pub fn state(&self) -> VoiceState {
        self.env.state()
    }

    pub fn has_started(&self, frame: u64) -> bool {
        frame >= self.start_frame
    }

    fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Render one mono sample at `frame`. Silent until the start frame.
    pub fn sample(&mut self, frame: u64) -> f32 {
        if frame < self.start_frame {
            return 0.0;
        }
        let env = self.env.next();
        if env == 0.0 {
            return 0.0;
        }
        let mut acc = 0.0f32;
        for p in self.partials.iter_mut().take(self.n_partials) {
            acc += p.gain * wave_sample(p.wave, p.phase);
            p.phase = (p.phase + p.phase_inc).fract();
        }
        acc * env
    }

    pub fn begin_release(&mut self, fade_secs: f64, sample_rate: f64) {
        self.env.begin_release(fade_secs, sample_rate);
    }
}

// ─── Mixer ──────────────────────────────────────────────────────────

/// Command from the control thread to the render thread.
#[derive(Debug, Clone)]
pub enum RenderCmd {
    Spawn(VoiceSpec),
    Release { id: VoiceId, fade_secs: f64 },
    StopTag { tag: VoiceTag, fade_secs: f64 },
    StopAll { fade_secs: f64 },
}

/// Sums all voices into the output buffer and advances the frame clock.
///
/// Owned by the cpal callback closure. The clock counter is shared with the
/// control thread, which derives `clock_now` from it.
pub struct Mixer {
    voices: Vec<Voice>,
    rx: Receiver<RenderCmd>,
    clock_frames: Arc<AtomicU64>,
    sample_rate: f64,
    channels: usize,
}

impl Mixer {
    pub fn new(
        sample_rate: f64,
        channels: usize,
        rx: Receiver<RenderCmd>,
        clock_frames: Arc<AtomicU64>,
    ) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES + STEAL_SLACK),
            rx,
            clock_frames,
            sample_rate,
            channels,
        }
    }

    /// Render one interleaved output buffer.
    pub fn process(&mut self, data: &mut [f32]) {
        while let Ok(cmd) = self.rx.try_recv() {
            self.apply(cmd);
        }

        let mut frame = self.clock_frames.load(Ordering::Relaxed);
        for out in data.chunks_mut(self.channels) {
            let mut mix = 0.0f32;
            for voice in self.voices.iter_mut() {
                mix += voice.sample(frame);
            }
            let mix = mix.clamp(-1.0, 1.0);
            for sample in out.iter_mut() {
                *sample = mix;
            }
            frame += 1;
        }
        self.clock_frames.store(frame, Ordering::Relaxed);

        self.voices.retain(|v| v.state() != VoiceState::Retired);
    }

    fn apply(&mut self, cmd: RenderCmd) {
        let now = self.clock_frames.load(Ordering::Relaxed);
        match cmd {
            RenderCmd::Spawn(spec) => {
                if self.voices.len() >= MAX_VOICES {
                    self.steal_oldest();
                }
                if self.voices.len() < self.voices.capacity() {
                    self.voices.push(Voice::new(&spec, self.sample_rate));
                }
            }
            RenderCmd::Release { id, fade_secs } => {
                if let Some(voice) = self.voices.iter_mut().find(|v| v.id() == id) {
                    voice.begin_release(fade_secs, self.sample_rate);
                }
            }
            RenderCmd::StopTag { tag, fade_secs } => {
                // Pending voices vanish outright; sounding ones get a fade.
                self.voices
                    .retain(|v| v.tag() != tag || v.has_started(now));
                let sr = self.sample_rate;
                for voice in self.voices.iter_mut().filter(|v| v.tag() == tag) {
                    voice.begin_release(fade_secs, sr);
                }
            }
            RenderCmd::StopAll { fade_secs } => {
                self.voices.retain(|v| v.has_started(now));
                let sr = self.sample_rate;
                for voice in self.voices.iter_mut() {
                    voice.begin_release(fade_secs, sr);
                }
            }
        }
    }

    /// Fast-fade the oldest voice that isn't already on its way out.
    fn steal_oldest(&mut self) {
        let sr = self.sample_rate;
        if let Some(victim) = self
            .voices
            .iter_mut()
            .filter(|v| v.state() != VoiceState::Releasing)
            .min_by_key(|v| v.start_frame())
        {
            victim.begin_release(STEAL_FADE_SECS, sr);
        }
    }

    #[cfg(test)]
    fn voice_count(&self) -> usize {
        self.voices.len()
    }

    #[cfg(test)]
    fn voice_states(&self) -> Vec<VoiceState> {
        self.voices.iter().map(|v| v.state()).collect()
    }
}
