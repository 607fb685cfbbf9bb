//! # solfa-types
//!
//! Shared type definitions for the solfa practice engine: the note data
//! model, per-mode playback settings, and the feedback types crossing the
//! audio-thread boundary.

mod audio;
mod mode;
mod note;
mod playback;
mod timbre;

pub use audio::{AudioFeedback, DeviceStatus};
pub use mode::PracticeMode;
pub use note::{Note, PitchClass, FREQ_A4, MIDI_A4};
pub use playback::{
    ClickSettings, PlaybackSettings, SequenceStep, Subdivision, Voicing, MAX_BPM, MIN_BPM,
};
pub use timbre::Timbre;
