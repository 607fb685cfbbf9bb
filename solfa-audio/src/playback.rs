//! Look-ahead step scheduling for the per-mode sequence players.
//!
//! Each control-thread tick walks every player forward: ticks whose onset
//! falls inside the lookahead window are scheduled against the engine clock
//! and the player's grid cursor advances. Settings are read live on every
//! scheduled tick, so bpm/subdivision/swing changes land on the very next
//! onset without disturbing ticks already handed to the backend.

use crossbeam_channel::Sender;

use solfa_types::{
    AudioFeedback, Note, PlaybackSettings, PracticeMode, SequenceStep, Subdivision, Timbre, Voicing,
};

use crate::engine::{AudioEngine, SCHEDULE_LOOKAHEAD_SECS, SCHEDULE_MARGIN_SECS};

/// Octave offsets applied by [`Voicing::OctaveSpread`], in semitones.
const OCTAVE_SPREAD_OFFSETS: [i32; 4] = [-24, -12, 0, 12];

/// Scheduling state for one practice mode's sequence player.
///
/// The grid cursor (`next_tick_secs`, `tick_count`) and the sequence cursor
/// (`step_index`, `ticks_into_step`) advance together: a step sounds once
/// per subdivision tick and the sequence moves on after a full bar of
/// ticks.
#[derive(Debug)]
pub(crate) struct PlayerState {
    pub mode: PracticeMode,
    pub settings: PlaybackSettings,
    pub voicing: Voicing,
    pub steps: Vec<SequenceStep>,
    /// Index of the step currently sounding.
    pub step_index: usize,
    /// Subdivision ticks already scheduled for the current step.
    pub ticks_into_step: u32,
    /// Engine-clock time of the next unscheduled grid tick.
    pub next_tick_secs: f64,
    /// Monotonic tick counter since play started; parity drives swing.
    pub tick_count: u64,
}

impl PlayerState {
    pub fn new(mode: PracticeMode) -> Self {
        PlayerState {
            mode,
            settings: PlaybackSettings::default(),
            voicing: mode.default_voicing(),
            steps: Vec::new(),
            step_index: 0,
            ticks_into_step: 0,
            next_tick_secs: 0.0,
            tick_count: 0,
        }
    }

    /// Rewind the sequence and grid cursors ahead of a fresh start.
    pub fn reset_cursor(&mut self) {
        self.step_index = 0;
        self.ticks_into_step = 0;
        self.tick_count = 0;
    }
}

/// Schedule every grid tick of `player` that falls inside the lookahead
/// window, advancing its cursors past what was scheduled.
pub(crate) fn tick_playback(
    player: &mut PlayerState,
    engine: &mut AudioEngine,
    timbre: Timbre,
    feedback_tx: &Sender<AudioFeedback>,
) {
    if !player.settings.playing || player.steps.is_empty() {
        return;
    }

    let now = engine.clock_now();
    let horizon = now + SCHEDULE_LOOKAHEAD_SECS;

    // If scheduling fell behind (device restart, long stall) the grid
    // anchor is in the past. Re-anchor just ahead of the clock rather than
    // burst-playing every missed tick.
    if player.next_tick_secs < now {
        player.next_tick_secs = now + SCHEDULE_MARGIN_SECS;
    }

    while player.next_tick_secs < horizon {
        let interval = player.settings.tick_interval_secs();

        // The sequence may have been swapped for a shorter one since the
        // cursor last moved.
        if player.step_index >= player.steps.len() {
            player.step_index = 0;
            player.ticks_into_step = 0;
        }

        // Swing delays every off-beat eighth by a third of the interval.
        // Only the sounding time shifts; the grid itself stays straight so
        // toggling swing never accumulates drift.
        let swing_delay = if player.settings.swing
            && player.settings.subdivision == Subdivision::Eighth
            && player.tick_count % 2 == 1
        {
            interval / 3.0
        } else {
            0.0
        };
        let sound_at = player.next_tick_secs + swing_delay;

        if player.ticks_into_step == 0 {
            let _ = feedback_tx.send(AudioFeedback::StepBegan {
                mode: player.mode,
                index: player.step_index,
            });
        }

        let step = &player.steps[player.step_index];
        let notes = voiced_notes(step, player.voicing);
        let gain = player.settings.gain() / (notes.len().max(1) as f32).sqrt();
        if let Err(e) = engine.play_step(player.mode, &notes, sound_at, interval, timbre, gain) {
            log::warn!(
                target: "audio::playback",
                "{}: failed to schedule step {}: {}",
                player.mode.name(),
                player.step_index,
                e
            );
        }

        player.tick_count += 1;
        player.ticks_into_step += 1;
        if player.ticks_into_step >= player.settings.subdivision.reps_per_bar() {
            player.ticks_into_step = 0;
            player.step_index = (player.step_index + 1) % player.steps.len();
        }
        player.next_tick_secs += interval;
    }
}

/// Expand a step's notes through the player's voicing.
///
/// Transpositions that leave MIDI range are dropped rather than clamped, so
/// an already-high note simply loses its upper doubling.
pub(crate) fn voiced_notes(step: &SequenceStep, voicing: Voicing) -> Vec<Note> {
    match voicing {
        Voicing::Plain => step.notes.clone(),
        Voicing::OctaveSpread => {
            let mut notes = Vec::with_capacity(step.notes.len() * OCTAVE_SPREAD_OFFSETS.len());
            for note in &step.notes {
                for offset in OCTAVE_SPREAD_OFFSETS {
                    match note.transposed(offset) {
                        Some(n) => notes.push(n),
                        None => log::debug!(
                            target: "audio::playback",
                            "dropping {} offset {:+} (out of range)",
                            note,
                            offset
                        ),
                    }
                }
            }
            notes
        }
        Voicing::AddedFifth => {
            let mut notes = Vec::with_capacity(step.notes.len() * 2);
            for note in &step.notes {
                notes.push(*note);
                if let Some(fifth) = note.transposed(7) {
                    notes.push(fifth);
                }
            }
            notes
        }
    }
}
