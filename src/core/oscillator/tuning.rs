//! Pitch to frequency mapping strategies.

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};

/// A4, MIDI note 69.
pub const REFERENCE_PITCH: u8 = 69;
pub const REFERENCE_FREQ: f64 = 440.0;

/// Reference C (MIDI note 60) for the historical temperaments.
pub const C_REFERENCE_FREQ: f64 = 256.0;

pub const MIN_DIVISIONS: u32 = 1;
pub const MAX_DIVISIONS: u32 = 64;

/// Thomas Young's first temperament (1799), ratios from C.
const YOUNG_1799: [f64; 12] = [
    1.000000, 1.053498, 1.119930, 1.185185, 1.254243, 1.333333,
    1.404664, 1.496616, 1.580247, 1.676105, 1.777778, 1.877120,
];

/// Werckmeister III, ratios from C.
const WERCKMEISTER: [f64; 12] = [
    1.000000, 1.053498, 1.117403, 1.185185, 1.252827, 1.333333,
    1.404664, 1.494927, 1.580247, 1.670436, 1.777778, 1.879241,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tuning {
    /// N equal divisions of the octave around A4 = 440 Hz.
    EqualTemperament(u32),
    Young1799,
    Werckmeister,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::EqualTemperament(12)
    }
}

impl Tuning {
    /// Reject equal divisions outside `[1, 64]`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Tuning::EqualTemperament(n) if !(MIN_DIVISIONS..=MAX_DIVISIONS).contains(&n) => {
                Err(Error::InvalidDivision(n))
            }
            _ => Ok(()),
        }
    }

    pub fn frequency(&self, pitch: u8) -> f64 {
        match *self {
            Tuning::EqualTemperament(n) => {
                let steps = pitch as f64 - REFERENCE_PITCH as f64;
                REFERENCE_FREQ * 2.0f64.powf(steps / n as f64)
            }
            Tuning::Young1799 => from_table(&YOUNG_1799, pitch),
            Tuning::Werckmeister => from_table(&WERCKMEISTER, pitch),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Tuning::EqualTemperament(n) => format!("{n}-et"),
            Tuning::Young1799 => "Young 1799".to_string(),
            Tuning::Werckmeister => "Werckmeister III".to_string(),
        }
    }
}

fn from_table(ratios: &[f64; 12], pitch: u8) -> f64 {
    let octave = (pitch / 12) as i32 - 5;
    C_REFERENCE_FREQ * ratios[(pitch % 12) as usize] * 2.0f64.powi(octave)
}

/// Pitch class name, sharps only.
pub fn note_name(pitch: u8) -> &'static str {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    NAMES[(pitch % 12) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn a4_is_440_for_every_division() {
        for n in MIN_DIVISIONS..=MAX_DIVISIONS {
            assert_eq!(Tuning::EqualTemperament(n).frequency(69), 440.0);
        }
    }

    #[test]
    fn twelve_et_octaves_and_semitones() {
        let et = Tuning::EqualTemperament(12);
        assert_relative_eq!(et.frequency(81), 880.0, epsilon = 1e-9);
        assert_relative_eq!(et.frequency(57), 220.0, epsilon = 1e-9);
        assert_relative_eq!(et.frequency(60), 261.625_565, epsilon = 1e-5);
    }

    #[test]
    fn twenty_four_et_takes_quarter_tones() {
        let et = Tuning::EqualTemperament(24);
        assert_relative_eq!(et.frequency(93), 880.0, epsilon = 1e-9);
    }

    #[test]
    fn temperaments_anchor_middle_c_at_256() {
        assert_eq!(Tuning::Young1799.frequency(60), 256.0);
        assert_eq!(Tuning::Werckmeister.frequency(60), 256.0);
        assert_eq!(Tuning::Werckmeister.frequency(72), 512.0);
        assert_eq!(Tuning::Young1799.frequency(48), 128.0);
    }

    #[test]
    fn temperaments_differ_on_a() {
        assert_relative_eq!(Tuning::Werckmeister.frequency(69), 256.0 * 1.670436, epsilon = 1e-9);
        assert_relative_eq!(Tuning::Young1799.frequency(69), 256.0 * 1.676105, epsilon = 1e-9);
    }

    #[test]
    fn temperament_ratios_ascend() {
        for table in [&YOUNG_1799, &WERCKMEISTER] {
            assert!(table.windows(2).all(|w| w[0] < w[1]));
            assert!(table[11] < 2.0);
        }
    }

    #[test]
    fn division_bounds() {
        assert!(Tuning::EqualTemperament(1).validate().is_ok());
        assert!(Tuning::EqualTemperament(64).validate().is_ok());
        assert!(matches!(
            Tuning::EqualTemperament(0).validate(),
            Err(Error::InvalidDivision(0))
        ));
        assert!(Tuning::EqualTemperament(65).validate().is_err());
        assert!(Tuning::Young1799.validate().is_ok());
    }

    #[test]
    fn names_wrap_by_octave() {
        assert_eq!(note_name(60), "C");
        assert_eq!(note_name(69), "A");
        assert_eq!(note_name(61), "C#");
    }
}
