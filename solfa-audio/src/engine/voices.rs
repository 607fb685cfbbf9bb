//! Voice scheduling operations on [`AudioEngine`]: sequence steps, metronome
//! clicks, note previews, and the bookkeeping needed to crossfade and stop
//! them.

use solfa_types::{Note, PracticeMode, Timbre};

use super::backend::{VoiceId, VoiceSpec, VoiceTag};
use super::AudioEngine;
use crate::synth::MIN_ATTACK_SECS;

/// Fade applied when a voice is cut short (crossfade onto the next step,
/// stop, preview retrigger). Long enough to mask the discontinuity.
const CROSSFADE_SECS: f64 = 0.030;

/// Onset offset between successive chord notes, for a strummed attack
/// instead of a single block of phase-aligned partials.
const CHORD_STAGGER_SECS: f64 = 0.025;

/// Preview voice length. Long enough to hear the timbre settle.
const PREVIEW_SECS: f64 = 1.2;

/// Upper bound for a playable fundamental.
const MAX_FREQ_HZ: f64 = 20_000.0;

/// Metronome click frequencies and lengths. Accented beats ring higher
/// and slightly longer.
const ACCENT_CLICK_HZ: f64 = 1000.0;
const CLICK_HZ: f64 = 800.0;
const ACCENT_CLICK_SECS: f64 = 0.065;
const CLICK_SECS: f64 = 0.04;

/// Tracker entries outlive their voice's nominal end by this much, covering
/// release tails before cleanup drops them.
const EXPIRY_MARGIN_SECS: f64 = 0.25;

/// One voice the engine has scheduled and may still need to release.
struct TrackedVoice {
    id: VoiceId,
    tag: VoiceTag,
    /// Backend-clock time when the envelope reaches the decay floor.
    end_secs: f64,
    /// Set once the voice has been explicitly released, so a crossfade
    /// never fades the same voice twice.
    released: bool,
}

/// Bookkeeping for scheduled voices: id allocation, per-tag release for
/// crossfades, and expiry cleanup.
pub(crate) struct VoiceTracker {
    next_id: u64,
    voices: Vec<TrackedVoice>,
}

impl VoiceTracker {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            voices: Vec::new(),
        }
    }

    fn allocate(&mut self) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn add(&mut self, id: VoiceId, tag: VoiceTag, end_secs: f64) {
        self.voices.push(TrackedVoice {
            id,
            tag,
            end_secs,
            released: false,
        });
    }

    /// Ids with this tag that have not been released yet, marked released
    /// on the way out.
    fn take_unreleased(&mut self, tag: VoiceTag) -> Vec<VoiceId> {
        let mut ids = Vec::new();
        for voice in self.voices.iter_mut() {
            if voice.tag == tag && !voice.released {
                voice.released = true;
                ids.push(voice.id);
            }
        }
        ids
    }

    fn clear_tag(&mut self, tag: VoiceTag) {
        self.voices.retain(|v| v.tag != tag);
    }

    fn clear(&mut self) {
        self.voices.clear();
    }

    fn cleanup(&mut self, now: f64) {
        self.voices.retain(|v| v.end_secs + EXPIRY_MARGIN_SECS > now);
    }

    fn any_live(&self, tag: VoiceTag, now: f64) -> bool {
        self.voices
            .iter()
            .any(|v| v.tag == tag && !v.released && v.end_secs > now)
    }

    pub(crate) fn len(&self) -> usize {
        self.voices.len()
    }
}

impl AudioEngine {
    /// Sound one sequence step for a player: crossfade out the mode's
    /// previous voices under the new onset, then schedule one voice per
    /// note. Chord notes get a slight stagger for a strummed attack.
    pub fn play_step(
        &mut self,
        mode: PracticeMode,
        notes: &[Note],
        start_secs: f64,
        duration_secs: f64,
        timbre: Timbre,
        gain: f32,
    ) -> Result<(), String> {
        let backend = self.backend.as_ref().ok_or("Not connected")?;
        let tag = VoiceTag::Player(mode);

        // The previous tick's voices may still be sounding. Fade them out
        // across the new onset instead of truncating: the release spans the
        // remaining lead time plus the crossfade.
        let lead = (start_secs - backend.clock_now()).max(0.0);
        for id in self.voices.take_unreleased(tag) {
            backend
                .release(id, lead + CROSSFADE_SECS)
                .map_err(|e| e.to_string())?;
        }

        let stagger = if notes.len() > 1 {
            CHORD_STAGGER_SECS
        } else {
            0.0
        };
        for (i, note) in notes.iter().enumerate() {
            let freq_hz = note.frequency();
            if !freq_hz.is_finite() || freq_hz <= 0.0 || freq_hz > MAX_FREQ_HZ {
                log::debug!(
                    target: "audio::engine",
                    "skipping unplayable note {} ({:.1} Hz)",
                    note,
                    freq_hz
                );
                continue;
            }
            let onset = start_secs + i as f64 * stagger;
            let id = self.voices.allocate();
            backend
                .spawn(VoiceSpec {
                    id,
                    tag,
                    start_secs: onset,
                    freq_hz,
                    duration_secs,
                    timbre,
                    gain,
                    attack_secs: 0.0,
                })
                .map_err(|e| e.to_string())?;
            self.voices.add(id, tag, onset + duration_secs);
        }
        Ok(())
    }

    /// Metronome click: a short blip, accented beats higher, longer, and a
    /// touch louder.
    pub fn play_click(&mut self, accent: bool, start_secs: f64, gain: f32) -> Result<(), String> {
        let backend = self.backend.as_ref().ok_or("Not connected")?;

        let (freq_hz, duration_secs, gain) = if accent {
            (ACCENT_CLICK_HZ, ACCENT_CLICK_SECS, (gain * 1.2).min(1.0))
        } else {
            (CLICK_HZ, CLICK_SECS, gain)
        };

        let id = self.voices.allocate();
        backend
            .spawn(VoiceSpec {
                id,
                tag: VoiceTag::Click,
                start_secs,
                freq_hz,
                duration_secs,
                timbre: Timbre::Sine,
                gain,
                attack_secs: MIN_ATTACK_SECS,
            })
            .map_err(|e| e.to_string())?;
        self.voices.add(id, VoiceTag::Click, start_secs + duration_secs);
        Ok(())
    }

    /// Audition a single note right now, replacing any running preview.
    pub fn preview_note(&mut self, note: Note, timbre: Timbre, gain: f32) -> Result<(), String> {
        let backend = self.backend.as_ref().ok_or("Not connected")?;

        let freq_hz = note.frequency();
        if !freq_hz.is_finite() || freq_hz <= 0.0 || freq_hz > MAX_FREQ_HZ {
            log::debug!(
                target: "audio::engine",
                "skipping unplayable preview {} ({:.1} Hz)",
                note,
                freq_hz
            );
            return Ok(());
        }

        backend
            .stop_tag(VoiceTag::Preview, CROSSFADE_SECS)
            .map_err(|e| e.to_string())?;
        self.voices.clear_tag(VoiceTag::Preview);

        let start_secs = backend.clock_now();
        let id = self.voices.allocate();
        backend
            .spawn(VoiceSpec {
                id,
                tag: VoiceTag::Preview,
                start_secs,
                freq_hz,
                duration_secs: PREVIEW_SECS,
                timbre,
                gain,
                // Mirror the outgoing fade so retriggers overlap smoothly.
                attack_secs: CROSSFADE_SECS,
            })
            .map_err(|e| e.to_string())?;
        self.voices.add(id, VoiceTag::Preview, start_secs + PREVIEW_SECS);
        Ok(())
    }

    /// Whether a previewed note is still sounding.
    pub fn preview_active(&self) -> bool {
        match self.backend.as_ref() {
            Some(backend) => self.voices.any_live(VoiceTag::Preview, backend.clock_now()),
            None => false,
        }
    }

    /// Stop everything a player has scheduled: pending voices are dropped,
    /// sounding ones fade out.
    pub fn stop_player(&mut self, mode: PracticeMode) {
        if let Some(backend) = self.backend.as_ref() {
            let _ = backend.stop_tag(VoiceTag::Player(mode), CROSSFADE_SECS);
        }
        self.voices.clear_tag(VoiceTag::Player(mode));
    }

    /// Stop the metronome: pending clicks are dropped, sounding ones fade
    /// out. Without this, clicks already inside the lookahead window would
    /// keep sounding after their player stopped.
    pub fn stop_click(&mut self) {
        if let Some(backend) = self.backend.as_ref() {
            let _ = backend.stop_tag(VoiceTag::Click, CROSSFADE_SECS);
        }
        self.voices.clear_tag(VoiceTag::Click);
    }

    /// Stop every voice from every source.
    pub fn stop_all_voices(&mut self) {
        if let Some(backend) = self.backend.as_ref() {
            let _ = backend.stop_all(CROSSFADE_SECS);
        }
        self.voices.clear();
    }

    /// Drop tracker entries whose envelopes have finished. Called
    /// periodically from the audio thread to bound tracker growth.
    pub fn cleanup_expired_voices(&mut self) {
        let now = self.clock_now();
        self.voices.cleanup(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::MockOp;
    use crate::engine::test_support::engine_with_mock;
    use solfa_types::PitchClass;

    fn note(midi: u8) -> Note {
        Note::from_midi(midi).unwrap()
    }

    #[test]
    fn play_step_spawns_one_voice_per_note() {
        let (mut engine, mock) = engine_with_mock();
        let chord = [note(60), note(64), note(67)];

        engine
            .play_step(PracticeMode::Patterns, &chord, 1.0, 0.5, Timbre::Piano, 0.8)
            .unwrap();

        let spawned = mock.spawned();
        assert_eq!(spawned.len(), 3);
        for (i, spec) in spawned.iter().enumerate() {
            assert_eq!(spec.tag, VoiceTag::Player(PracticeMode::Patterns));
            assert_eq!(spec.timbre, Timbre::Piano);
            let expected = 1.0 + i as f64 * CHORD_STAGGER_SECS;
            assert!(
                (spec.start_secs - expected).abs() < 1e-9,
                "chord note {} at {} expected {}",
                i,
                spec.start_secs,
                expected
            );
        }
    }

    #[test]
    fn play_step_single_note_has_no_stagger() {
        let (mut engine, mock) = engine_with_mock();

        engine
            .play_step(PracticeMode::Random, &[note(69)], 2.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();

        let spawned = mock.spawned();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].start_secs, 2.0);
        assert!((spawned[0].freq_hz - 440.0).abs() < 1e-6);
    }

    #[test]
    fn play_step_crossfades_previous_step() {
        let (mut engine, mock) = engine_with_mock();

        engine
            .play_step(PracticeMode::Random, &[note(60)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();
        assert!(mock.released().is_empty());

        // Second step scheduled 0.4s ahead of the mock clock: the first
        // voice's fade must span that lead plus the crossfade.
        engine
            .play_step(PracticeMode::Random, &[note(64)], 0.4, 0.5, Timbre::Sine, 0.8)
            .unwrap();

        let released = mock.released();
        assert_eq!(released.len(), 1);
        let fade = mock
            .find(|op| matches!(op, MockOp::Released { .. }))
            .and_then(|op| match op {
                MockOp::Released { fade_secs, .. } => Some(fade_secs),
                _ => None,
            })
            .unwrap();
        assert!((fade - (0.4 + CROSSFADE_SECS)).abs() < 1e-9);
    }

    #[test]
    fn play_step_does_not_crossfade_other_modes() {
        let (mut engine, mock) = engine_with_mock();

        engine
            .play_step(PracticeMode::Random, &[note(60)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();
        engine
            .play_step(PracticeMode::Patterns, &[note(64)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();

        assert!(
            mock.released().is_empty(),
            "a different mode's step must not release this mode's voices"
        );
    }

    #[test]
    fn play_step_without_backend_errors() {
        let mut engine = AudioEngine::new();
        let err = engine
            .play_step(PracticeMode::Random, &[note(60)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap_err();
        assert_eq!(err, "Not connected");
    }

    #[test]
    fn unplayable_frequency_is_skipped() {
        let (mut engine, mock) = engine_with_mock();
        // Hand-built note far above MIDI range: ~851 kHz.
        let bogus = Note {
            name: PitchClass::C,
            midi: 200,
            octave: 15,
        };

        engine
            .play_step(
                PracticeMode::Random,
                &[bogus, note(60)],
                0.0,
                0.5,
                Timbre::Sine,
                0.8,
            )
            .unwrap();

        let spawned = mock.spawned();
        assert_eq!(spawned.len(), 1, "only the playable note should spawn");
        assert!((spawned[0].freq_hz - note(60).frequency()).abs() < 1e-6);
    }

    #[test]
    fn click_accent_is_higher_longer_and_louder() {
        let (mut engine, mock) = engine_with_mock();

        engine.play_click(true, 0.0, 0.5).unwrap();
        engine.play_click(false, 0.5, 0.5).unwrap();

        let spawned = mock.spawned();
        assert_eq!(spawned.len(), 2);
        let (accent, plain) = (&spawned[0], &spawned[1]);
        assert_eq!(accent.tag, VoiceTag::Click);
        assert!(accent.freq_hz > plain.freq_hz);
        assert!(accent.duration_secs > plain.duration_secs);
        assert!(accent.gain > plain.gain);
    }

    #[test]
    fn preview_replaces_previous_preview() {
        let (mut engine, mock) = engine_with_mock();

        engine.preview_note(note(60), Timbre::Piano, 0.8).unwrap();
        engine.preview_note(note(64), Timbre::Piano, 0.8).unwrap();

        assert_eq!(
            mock.count(|op| matches!(
                op,
                MockOp::StoppedTag {
                    tag: VoiceTag::Preview,
                    ..
                }
            )),
            2,
            "each preview retriggers the preview tag"
        );
        assert_eq!(mock.spawned().len(), 2);
    }

    #[test]
    fn preview_active_tracks_the_voice_lifetime() {
        let (mut engine, mock) = engine_with_mock();
        assert!(!engine.preview_active());

        engine.preview_note(note(60), Timbre::Piano, 0.8).unwrap();
        assert!(engine.preview_active());

        // PREVIEW_SECS after the trigger the voice has rung out.
        mock.set_clock(PREVIEW_SECS + 0.1);
        assert!(!engine.preview_active());
    }

    #[test]
    fn stop_player_stops_tag_and_clears_tracker() {
        let (mut engine, mock) = engine_with_mock();
        engine
            .play_step(PracticeMode::Random, &[note(60)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();

        engine.stop_player(PracticeMode::Random);

        assert_eq!(
            mock.count(|op| matches!(
                op,
                MockOp::StoppedTag {
                    tag: VoiceTag::Player(PracticeMode::Random),
                    ..
                }
            )),
            1
        );

        // A following step must not try to release the stopped voices.
        mock.clear();
        engine
            .play_step(PracticeMode::Random, &[note(64)], 1.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();
        assert!(mock.released().is_empty());
    }

    #[test]
    fn stop_click_drops_pending_clicks() {
        let (mut engine, mock) = engine_with_mock();
        engine.play_click(true, 1.0, 0.5).unwrap();

        engine.stop_click();

        assert_eq!(
            mock.count(|op| matches!(
                op,
                MockOp::StoppedTag {
                    tag: VoiceTag::Click,
                    ..
                }
            )),
            1
        );
        assert_eq!(engine.voices.len(), 0);
    }

    #[test]
    fn stop_all_voices_sends_global_stop() {
        let (mut engine, mock) = engine_with_mock();
        engine
            .play_step(PracticeMode::Random, &[note(60)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();
        engine.play_click(true, 0.0, 0.5).unwrap();

        engine.stop_all_voices();

        assert_eq!(mock.count(|op| matches!(op, MockOp::StoppedAll { .. })), 1);
    }

    #[test]
    fn cleanup_drops_finished_voices() {
        let (mut engine, mock) = engine_with_mock();
        engine
            .play_step(PracticeMode::Random, &[note(60)], 0.0, 0.5, Timbre::Sine, 0.8)
            .unwrap();
        engine.play_click(false, 10.0, 0.5).unwrap();

        // Well past the first voice's end plus margin, before the click.
        mock.set_clock(5.0);
        engine.cleanup_expired_voices();

        assert_eq!(engine.voices.len(), 1, "only the future click remains");
    }
}
