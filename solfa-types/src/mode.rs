use serde::{Deserialize, Serialize};

use crate::Voicing;

/// Practice mode. Each mode owns an independent sequence player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PracticeMode {
    /// Random single notes for ear training.
    #[default]
    Random,
    /// Chord progressions.
    Progressions,
    /// Geometric note patterns.
    Patterns,
}

impl PracticeMode {
    pub const COUNT: usize = 3;

    pub const ALL: [PracticeMode; PracticeMode::COUNT] = [
        PracticeMode::Random,
        PracticeMode::Progressions,
        PracticeMode::Patterns,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PracticeMode::Random => "Random Notes",
            PracticeMode::Progressions => "Progressions",
            PracticeMode::Patterns => "Patterns",
        }
    }

    /// Stable index for per-mode arrays.
    pub fn index(&self) -> usize {
        match self {
            PracticeMode::Random => 0,
            PracticeMode::Progressions => 1,
            PracticeMode::Patterns => 2,
        }
    }

    /// Voicing a fresh player for this mode starts with. Random notes use
    /// the wide unison spread; progression steps arrive as chords and need
    /// no shaping; patterns add a fifth for harmonic context.
    pub fn default_voicing(&self) -> Voicing {
        match self {
            PracticeMode::Random => Voicing::OctaveSpread,
            PracticeMode::Progressions => Voicing::Plain,
            PracticeMode::Patterns => Voicing::AddedFifth,
        }
    }
}
