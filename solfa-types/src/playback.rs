use serde::{Deserialize, Serialize};

use crate::Note;

pub const MIN_BPM: f32 = 20.0;
pub const MAX_BPM: f32 = 240.0;

/// Beat subdivision: how many ticks fill a 4-beat bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Subdivision {
    #[default]
    Quarter,
    Eighth,
    Triplet,
    Sixteenth,
}

impl Subdivision {
    pub const ALL: [Subdivision; 4] = [
        Subdivision::Quarter,
        Subdivision::Eighth,
        Subdivision::Triplet,
        Subdivision::Sixteenth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Subdivision::Quarter => "Quarter",
            Subdivision::Eighth => "Eighth",
            Subdivision::Triplet => "Triplet",
            Subdivision::Sixteenth => "Sixteenth",
        }
    }

    /// Subdivision ticks per 4-beat bar.
    pub fn reps_per_bar(&self) -> u32 {
        match self {
            Subdivision::Quarter => 4,
            Subdivision::Eighth => 8,
            Subdivision::Triplet => 12,
            Subdivision::Sixteenth => 16,
        }
    }

    /// Legacy small-integer encoding (1..=4).
    pub fn from_index(index: u8) -> Option<Subdivision> {
        match index {
            1 => Some(Subdivision::Quarter),
            2 => Some(Subdivision::Eighth),
            3 => Some(Subdivision::Triplet),
            4 => Some(Subdivision::Sixteenth),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Subdivision::Quarter => 1,
            Subdivision::Eighth => 2,
            Subdivision::Triplet => 3,
            Subdivision::Sixteenth => 4,
        }
    }
}

/// How a single-note step is voiced when scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Voicing {
    /// Just the note itself.
    #[default]
    Plain,
    /// Wide unison across several octaves.
    OctaveSpread,
    /// Note plus a perfect fifth above.
    AddedFifth,
}

impl Voicing {
    pub const ALL: [Voicing; 3] = [Voicing::Plain, Voicing::OctaveSpread, Voicing::AddedFifth];

    pub fn name(&self) -> &'static str {
        match self {
            Voicing::Plain => "Plain",
            Voicing::OctaveSpread => "Octave Spread",
            Voicing::AddedFifth => "Added Fifth",
        }
    }
}

/// Per-mode playback settings, mutated by the UI at arbitrary times and
/// read live by the scheduler on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    pub playing: bool,
    pub bpm: f32,
    pub subdivision: Subdivision,
    pub swing: bool,
    /// Volume percent (0..=100)
    pub volume: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            playing: false,
            bpm: 90.0,
            subdivision: Subdivision::default(),
            swing: false,
            volume: 80,
        }
    }
}

impl PlaybackSettings {
    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    /// Volume as a linear gain factor (0.0..=1.0).
    pub fn gain(&self) -> f32 {
        self.volume.min(100) as f32 / 100.0
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Seconds between successive subdivision ticks at the current
    /// bpm/subdivision: secondsPerBeat / (repsPerBar / 4).
    pub fn tick_interval_secs(&self) -> f64 {
        self.seconds_per_beat() / (self.subdivision.reps_per_bar() as f64 / 4.0)
    }
}

/// One entry of a practice sequence: one or more simultaneous notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub notes: Vec<Note>,
}

impl SequenceStep {
    pub fn single(note: Note) -> SequenceStep {
        SequenceStep { notes: vec![note] }
    }

    pub fn chord(notes: Vec<Note>) -> SequenceStep {
        SequenceStep { notes }
    }

    pub fn is_chord(&self) -> bool {
        self.notes.len() > 1
    }
}

/// Metronome settings (enable toggle plus volume percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickSettings {
    pub enabled: bool,
    pub volume: u8,
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: 70,
        }
    }
}

impl ClickSettings {
    pub fn gain(&self) -> f32 {
        self.volume.min(100) as f32 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn subdivision_all_has_4() {
        assert_eq!(Subdivision::ALL.len(), 4);
    }

    #[test]
    fn subdivision_names_unique() {
        let names: HashSet<&str> = Subdivision::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn subdivision_reps_per_bar() {
        let reps: Vec<u32> = Subdivision::ALL.iter().map(|s| s.reps_per_bar()).collect();
        assert_eq!(reps, vec![4, 8, 12, 16]);
    }

    #[test]
    fn subdivision_index_roundtrip() {
        for sub in Subdivision::ALL {
            assert_eq!(Subdivision::from_index(sub.index()), Some(sub));
        }
        assert_eq!(Subdivision::from_index(0), None);
        assert_eq!(Subdivision::from_index(5), None);
    }

    #[test]
    fn voicing_all_has_3() {
        assert_eq!(Voicing::ALL.len(), 3);
    }

    #[test]
    fn set_bpm_clamps_to_range() {
        let mut settings = PlaybackSettings::default();
        settings.set_bpm(500.0);
        assert_eq!(settings.bpm, MAX_BPM);
        settings.set_bpm(1.0);
        assert_eq!(settings.bpm, MIN_BPM);
        settings.set_bpm(120.0);
        assert_eq!(settings.bpm, 120.0);
    }

    #[test]
    fn set_volume_clamps_to_100() {
        let mut settings = PlaybackSettings::default();
        settings.set_volume(250);
        assert_eq!(settings.volume, 100);
        assert!((settings.gain() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tick_interval_quarter_at_120() {
        let settings = PlaybackSettings {
            bpm: 120.0,
            subdivision: Subdivision::Quarter,
            ..Default::default()
        };
        assert!((settings.tick_interval_secs() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tick_interval_eighths_at_60() {
        let settings = PlaybackSettings {
            bpm: 60.0,
            subdivision: Subdivision::Eighth,
            ..Default::default()
        };
        // (60/60) / (8/4) = 0.5
        assert!((settings.tick_interval_secs() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tick_interval_scales_with_subdivision() {
        for sub in Subdivision::ALL {
            let settings = PlaybackSettings {
                bpm: 90.0,
                subdivision: sub,
                ..Default::default()
            };
            let expected = (60.0 / 90.0) / (sub.reps_per_bar() as f64 / 4.0);
            assert!((settings.tick_interval_secs() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn default_settings_not_playing() {
        let settings = PlaybackSettings::default();
        assert!(!settings.playing);
        assert!(settings.bpm >= MIN_BPM && settings.bpm <= MAX_BPM);
    }

    #[test]
    fn step_chord_detection() {
        let c4 = crate::Note::from_midi(60).unwrap();
        let e4 = crate::Note::from_midi(64).unwrap();
        assert!(!SequenceStep::single(c4).is_chord());
        assert!(SequenceStep::chord(vec![c4, e4]).is_chord());
    }

    #[test]
    fn click_default_disabled() {
        let click = ClickSettings::default();
        assert!(!click.enabled);
        assert!(click.gain() > 0.0);
    }
}
