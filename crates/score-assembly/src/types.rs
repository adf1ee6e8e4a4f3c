use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const NOTE_NAMES_SHARP: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const NOTE_NAMES_FLAT: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Tonics conventionally spelled with flats, per mode.
const FLAT_MAJOR_TONICS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb
const FLAT_MINOR_TONICS: [u8; 2] = [3, 10]; // Ebm, Bbm

/// Position on the circle of fifths for each major tonic, spelled as above.
const MAJOR_FIFTHS: [i8; 12] = [0, -5, 2, -3, 4, -1, -6, 1, -4, 3, -2, 5];

/// One of the 12 semitone classes, C = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    /// Wraps any semitone count into 0–11.
    pub fn new(semitones: u8) -> Self {
        Self(semitones % 12)
    }

    pub fn of_pitch(pitch: u8) -> Self {
        Self(pitch % 12)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn sharp_name(self) -> &'static str {
        NOTE_NAMES_SHARP[self.0 as usize]
    }

    pub fn flat_name(self) -> &'static str {
        NOTE_NAMES_FLAT[self.0 as usize]
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sharp_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// Best-fit tonal center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    pub tonic: PitchClass,
    pub mode: KeyMode,
    /// Pearson correlation with the winning template, or 1.0 for an override
    pub confidence: f64,
}

impl Default for KeyEstimate {
    fn default() -> Self {
        Self {
            tonic: PitchClass::C,
            mode: KeyMode::Major,
            confidence: 0.0,
        }
    }
}

impl KeyEstimate {
    /// Tonic spelled the way the key signature is written: "Db", "F#", "Bb".
    pub fn tonic_name(&self) -> &'static str {
        let flats: &[u8] = match self.mode {
            KeyMode::Major => &FLAT_MAJOR_TONICS,
            KeyMode::Minor => &FLAT_MINOR_TONICS,
        };
        if flats.contains(&self.tonic.index()) {
            self.tonic.flat_name()
        } else {
            self.tonic.sharp_name()
        }
    }

    /// "C major", "F# minor"
    pub fn name(&self) -> String {
        format!("{} {}", self.tonic_name(), self.mode)
    }

    /// Signed accidental count: positive sharps, negative flats.
    pub fn fifths(&self) -> i8 {
        let major_tonic = match self.mode {
            KeyMode::Major => self.tonic.index(),
            KeyMode::Minor => (self.tonic.index() + 3) % 12,
        };
        MAJOR_FIFTHS[major_tonic as usize]
    }

    /// Whether accidentals in this key are written as flats.
    pub fn prefers_flats(&self) -> bool {
        self.fifths() < 0
    }
}

/// Beats per measure over beat unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats_per_measure: u8,
    pub beat_unit: u8,
}

impl TimeSignature {
    /// Quarter-note beat unit; the only denominator the measure grouper produces.
    pub fn quarter(beats_per_measure: u8) -> Self {
        Self {
            beats_per_measure,
            beat_unit: 4,
        }
    }

    /// Measure length in quarter-note beats.
    pub fn measure_beats(&self) -> f64 {
        self.beats_per_measure as f64 * 4.0 / self.beat_unit as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::quarter(4)
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.beats_per_measure, self.beat_unit)
    }
}

impl std::str::FromStr for TimeSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || Error::Parse(format!("time signature {:?}", s));

        let (num, den) = s.trim().split_once('/').ok_or_else(parse_err)?;
        let beats_per_measure: u8 = num.trim().parse().map_err(|_| parse_err())?;
        let beat_unit: u8 = den.trim().parse().map_err(|_| parse_err())?;

        if beats_per_measure == 0 || !beat_unit.is_power_of_two() || beat_unit > 64 {
            return Err(parse_err());
        }

        Ok(Self {
            beats_per_measure,
            beat_unit,
        })
    }
}

/// Register hint for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clef {
    Treble,
    Bass,
}

/// Header text for the rendered score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub title: String,
    pub composer: String,
}

impl Default for ScoreMetadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            composer: "Unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tonic: u8, mode: KeyMode) -> KeyEstimate {
        KeyEstimate {
            tonic: PitchClass::new(tonic),
            mode,
            confidence: 1.0,
        }
    }

    #[test]
    fn tonic_spelling_follows_key_signature() {
        assert_eq!(key(1, KeyMode::Major).name(), "Db major");
        assert_eq!(key(6, KeyMode::Major).name(), "Gb major");
        assert_eq!(key(6, KeyMode::Minor).name(), "F# minor");
        assert_eq!(key(10, KeyMode::Minor).name(), "Bb minor");
        assert_eq!(key(9, KeyMode::Minor).name(), "A minor");
    }

    #[test]
    fn fifths_for_relative_keys_match() {
        assert_eq!(key(0, KeyMode::Major).fifths(), 0);
        assert_eq!(key(9, KeyMode::Minor).fifths(), 0);
        assert_eq!(key(7, KeyMode::Major).fifths(), 1);
        assert_eq!(key(4, KeyMode::Minor).fifths(), 1);
        assert_eq!(key(5, KeyMode::Major).fifths(), -1);
        assert_eq!(key(2, KeyMode::Minor).fifths(), -1);
        assert!(key(3, KeyMode::Minor).prefers_flats());
    }

    #[test]
    fn time_signature_parses() {
        let ts: TimeSignature = "3/4".parse().unwrap();
        assert_eq!(ts, TimeSignature::quarter(3));
        assert_eq!(ts.to_string(), "3/4");

        let ts: TimeSignature = " 6 / 8 ".parse().unwrap();
        assert_eq!(ts.measure_beats(), 3.0);
    }

    #[test]
    fn time_signature_rejects_odd_denominators() {
        assert!("3/5".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("four/4".parse::<TimeSignature>().is_err());
        assert!("4".parse::<TimeSignature>().is_err());
    }
}
