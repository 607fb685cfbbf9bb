use serde::{Deserialize, Serialize};

/// Oscillator timbre for synthesized tones.
///
/// `Piano` is a composite: a triangle fundamental plus 2nd and 3rd sine
/// harmonics under one master envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timbre {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
    Piano,
}

impl Timbre {
    pub const ALL: [Timbre; 5] = [
        Timbre::Sine,
        Timbre::Triangle,
        Timbre::Sawtooth,
        Timbre::Square,
        Timbre::Piano,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Timbre::Sine => "Sine",
            Timbre::Triangle => "Triangle",
            Timbre::Sawtooth => "Sawtooth",
            Timbre::Square => "Square",
            Timbre::Piano => "Piano",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn timbre_all_has_5() {
        assert_eq!(Timbre::ALL.len(), 5);
    }

    #[test]
    fn timbre_names_unique() {
        let names: HashSet<&str> = Timbre::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn timbre_default_is_sine() {
        assert_eq!(Timbre::default(), Timbre::Sine);
    }
}
