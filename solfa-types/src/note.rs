use serde::{Deserialize, Serialize};

/// Reference tuning: A4 = MIDI 69 = 440 Hz.
pub const MIDI_A4: u8 = 69;
pub const FREQ_A4: f64 = 440.0;

/// Pitch class (note name without octave)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// Semitone offset from C (0..=11)
    pub fn semitone(&self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

    /// Pitch class for a semitone offset (wraps modulo 12).
    pub fn from_semitone(semitone: i32) -> PitchClass {
        PitchClass::ALL[semitone.rem_euclid(12) as usize]
    }

    /// Parse a pitch-class label ("C", "F#", "Bb"). Returns None for
    /// anything unrecognized; external generators are not trusted.
    pub fn from_name(name: &str) -> Option<PitchClass> {
        let pc = match name {
            "C" => PitchClass::C,
            "C#" | "Db" => PitchClass::Cs,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::Ds,
            "E" => PitchClass::E,
            "F" => PitchClass::F,
            "F#" | "Gb" => PitchClass::Fs,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::Gs,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::As,
            "B" => PitchClass::B,
            _ => return None,
        };
        Some(pc)
    }
}

/// A semantic pitch produced by the sequence generators.
///
/// `midi` is the authoritative field and is always consistent with the
/// reference tuning; `name` and `octave` exist for display. Octaves follow
/// the MIDI convention where C4 = 60 (so octave = midi/12 - 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub name: PitchClass,
    pub midi: u8,
    pub octave: i8,
}

impl Note {
    /// Build a note from a MIDI number. None if out of the 0..=127 range.
    pub fn from_midi(midi: u8) -> Option<Note> {
        if midi > 127 {
            return None;
        }
        Some(Note {
            name: PitchClass::from_semitone(midi as i32 % 12),
            midi,
            octave: (midi / 12) as i8 - 1,
        })
    }

    /// Build a note from a pitch class and octave. None if the result
    /// falls outside MIDI range.
    pub fn new(name: PitchClass, octave: i8) -> Option<Note> {
        let midi = (octave as i32 + 1) * 12 + name.semitone();
        if !(0..=127).contains(&midi) {
            return None;
        }
        Some(Note {
            name,
            midi: midi as u8,
            octave,
        })
    }

    /// Parse a pitch-class label plus octave ("F#", 3). None for malformed
    /// labels or out-of-range octaves.
    pub fn from_name(name: &str, octave: i8) -> Option<Note> {
        Note::new(PitchClass::from_name(name)?, octave)
    }

    /// Frequency in Hz under 12-tone equal temperament.
    pub fn frequency(&self) -> f64 {
        FREQ_A4 * 2.0_f64.powf((self.midi as f64 - MIDI_A4 as f64) / 12.0)
    }

    /// Shift by a signed number of semitones. None if the result leaves
    /// MIDI range.
    pub fn transposed(&self, semitones: i32) -> Option<Note> {
        let midi = self.midi as i32 + semitones;
        if !(0..=127).contains(&midi) {
            return None;
        }
        Note::from_midi(midi as u8)
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name.name(), self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pitch_class_all_has_12() {
        assert_eq!(PitchClass::ALL.len(), 12);
    }

    #[test]
    fn pitch_class_names_unique() {
        let names: HashSet<&str> = PitchClass::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn pitch_class_semitones_0_to_11() {
        let semitones: Vec<i32> = PitchClass::ALL.iter().map(|p| p.semitone()).collect();
        assert_eq!(semitones, (0..12).collect::<Vec<i32>>());
    }

    #[test]
    fn from_semitone_wraps() {
        assert_eq!(PitchClass::from_semitone(12), PitchClass::C);
        assert_eq!(PitchClass::from_semitone(-1), PitchClass::B);
        assert_eq!(PitchClass::from_semitone(14), PitchClass::D);
    }

    #[test]
    fn from_name_accepts_sharps_and_flats() {
        assert_eq!(PitchClass::from_name("F#"), Some(PitchClass::Fs));
        assert_eq!(PitchClass::from_name("Gb"), Some(PitchClass::Fs));
        assert_eq!(PitchClass::from_name("H"), None);
        assert_eq!(PitchClass::from_name(""), None);
    }

    #[test]
    fn a4_is_440() {
        let a4 = Note::from_midi(69).unwrap();
        assert_eq!(a4.name, PitchClass::A);
        assert_eq!(a4.octave, 4);
        assert!((a4.frequency() - 440.0).abs() < 1e-9);
    }

    #[test]
    fn middle_c_is_midi_60() {
        let c4 = Note::new(PitchClass::C, 4).unwrap();
        assert_eq!(c4.midi, 60);
        assert!((c4.frequency() - 261.6255653005986).abs() < 1e-9);
    }

    #[test]
    fn octave_doubles_frequency() {
        let a4 = Note::from_midi(69).unwrap();
        let a5 = Note::from_midi(81).unwrap();
        assert!((a5.frequency() / a4.frequency() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn from_midi_rejects_out_of_range() {
        assert!(Note::from_midi(128).is_none());
        assert!(Note::from_midi(127).is_some());
        assert!(Note::from_midi(0).is_some());
    }

    #[test]
    fn new_rejects_out_of_range_octaves() {
        assert!(Note::new(PitchClass::C, -2).is_none());
        assert!(Note::new(PitchClass::G, 9).is_some());
        assert!(Note::new(PitchClass::A, 9).is_none()); // midi 129
    }

    #[test]
    fn transposed_clamps_to_midi_range() {
        let c4 = Note::from_midi(60).unwrap();
        assert_eq!(c4.transposed(12).unwrap().midi, 72);
        assert_eq!(c4.transposed(-12).unwrap().midi, 48);
        assert!(c4.transposed(100).is_none());
        assert!(Note::from_midi(10).unwrap().transposed(-24).is_none());
    }

    #[test]
    fn display_formats_name_and_octave() {
        let fs3 = Note::from_name("F#", 3).unwrap();
        assert_eq!(fs3.to_string(), "F#3");
        assert_eq!(fs3.midi, 54);
    }
}
