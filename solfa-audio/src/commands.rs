//! Command types for the audio thread abstraction.
//!
//! AudioHandle serializes commands through a pair of channels to a
//! dedicated audio thread and consumes feedback updates each frame.

use solfa_types::{
    ClickSettings, Note, PracticeMode, SequenceStep, Subdivision, Timbre, Voicing,
};

use crate::devices::AudioConfig;

/// Commands sent from the UI thread to the audio thread.
///
/// Each practice mode owns an independent player, so transport and
/// parameter commands carry the mode they address. Settings take effect on
/// the next scheduled tick, never retroactively.
#[derive(Debug)]
pub enum AudioCmd {
    // ── Transport ─────────────────────────────────────────────────
    SetPlaying {
        mode: PracticeMode,
        playing: bool,
    },
    StopAll,

    // ── Player parameters ─────────────────────────────────────────
    SetBpm {
        mode: PracticeMode,
        bpm: f32,
    },
    SetSubdivision {
        mode: PracticeMode,
        subdivision: Subdivision,
    },
    SetSwing {
        mode: PracticeMode,
        swing: bool,
    },
    SetVolume {
        mode: PracticeMode,
        volume: u8,
    },
    SetVoicing {
        mode: PracticeMode,
        voicing: Voicing,
    },
    SetSequence {
        mode: PracticeMode,
        steps: Vec<SequenceStep>,
    },

    // ── Global settings ───────────────────────────────────────────
    SetActiveMode {
        mode: PracticeMode,
    },
    SetTimbre {
        timbre: Timbre,
    },
    SetClick {
        settings: ClickSettings,
    },

    // ── Preview ───────────────────────────────────────────────────
    PreviewNote {
        note: Note,
    },

    // ── Device lifecycle ──────────────────────────────────────────
    RestartDevice {
        config: AudioConfig,
    },
    Shutdown,
}

impl AudioCmd {
    /// Returns true if this command is time-critical and should use the priority channel.
    /// Priority commands: transport, live parameter changes, previews.
    /// Normal commands: sequence swaps, device lifecycle.
    pub fn is_priority(&self) -> bool {
        matches!(
            self,
            // Transport (most time-critical)
            AudioCmd::SetPlaying { .. }
                | AudioCmd::StopAll
                | AudioCmd::PreviewNote { .. }
                // Param changes (need low latency for knob tweaks)
                | AudioCmd::SetBpm { .. }
                | AudioCmd::SetSubdivision { .. }
                | AudioCmd::SetSwing { .. }
                | AudioCmd::SetVolume { .. }
                | AudioCmd::SetVoicing { .. }
                | AudioCmd::SetTimbre { .. }
                | AudioCmd::SetClick { .. }
                | AudioCmd::SetActiveMode { .. }
        )
    }
}

// Re-export AudioFeedback and DeviceStatus from solfa-types
pub use solfa_types::{AudioFeedback, DeviceStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_commands_use_priority_channel() {
        assert!(AudioCmd::StopAll.is_priority());
        assert!(AudioCmd::SetPlaying {
            mode: PracticeMode::Random,
            playing: true
        }
        .is_priority());
        assert!(!AudioCmd::SetSequence {
            mode: PracticeMode::Random,
            steps: Vec::new()
        }
        .is_priority());
        assert!(!AudioCmd::Shutdown.is_priority());
    }
}
