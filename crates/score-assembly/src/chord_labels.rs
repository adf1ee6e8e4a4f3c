//! Chord-recognition labels to notation chord symbols.
//!
//! The recognizer speaks a Harte-style vocabulary ("C:maj", "A:min7", "N");
//! lead sheets also show up in short form ("Am", "Bb7"). Both reduce to a
//! [`ChordSymbol`] with a canonical root spelling and quality.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::quantize::{seconds_to_beats, snap_ticks};
use crate::types::PitchClass;
use crate::{Error, Result};

/// Label the recognizer emits for "no chord".
pub const NO_CHORD: &str = "N";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

/// Letter plus accidental, e.g. "Bb" or "F#".
///
/// "Bb" and "B-" parse to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PitchName {
    pub letter: char,
    pub accidental: Accidental,
}

impl PitchName {
    pub fn pitch_class(&self) -> PitchClass {
        let natural: u8 = match self.letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            _ => 11,
        };
        let semitones = match self.accidental {
            Accidental::Natural => natural,
            Accidental::Sharp => natural + 1,
            Accidental::Flat => natural + 11,
        };
        PitchClass::new(semitones)
    }

    /// Split a leading root off a label, returning the root and the rest.
    fn split_prefix(label: &str) -> Option<(PitchName, &str)> {
        let mut chars = label.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        if !('A'..='G').contains(&letter) {
            return None;
        }

        let rest = chars.as_str();
        let (accidental, rest) = match rest.chars().next() {
            Some('#') => (Accidental::Sharp, &rest[1..]),
            Some('b') | Some('-') => (Accidental::Flat, &rest[1..]),
            _ => (Accidental::Natural, rest),
        };

        Some((PitchName { letter, accidental }, rest))
    }
}

impl std::str::FromStr for PitchName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::split_prefix(s.trim()) {
            Some((name, "")) => Ok(name),
            _ => Err(Error::Parse(format!("pitch name {:?}", s))),
        }
    }
}

impl std::fmt::Display for PitchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let accidental = match self.accidental {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        write!(f, "{}{}", self.letter, accidental)
    }
}

impl From<PitchName> for String {
    fn from(name: PitchName) -> Self {
        name.to_string()
    }
}

impl TryFrom<String> for PitchName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
    Diminished,
    Diminished7,
    HalfDiminished7,
    Augmented,
    Sus2,
    Sus4,
    Unknown,
}

impl ChordQuality {
    /// Lead-sheet suffix; empty for major and unknown.
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::Diminished => "dim",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Augmented => "aug",
            ChordQuality::Sus2 => "sus2",
            ChordQuality::Sus4 => "sus4",
            ChordQuality::Unknown => "",
        }
    }
}

/// Recognized quality tokens. Harte shorthand first, then lead-sheet forms.
static QUALITY_TOKENS: &[(&str, ChordQuality)] = &[
    ("", ChordQuality::Major),
    ("maj", ChordQuality::Major),
    ("min", ChordQuality::Minor),
    ("dim", ChordQuality::Diminished),
    ("aug", ChordQuality::Augmented),
    ("7", ChordQuality::Dominant7),
    ("maj7", ChordQuality::Major7),
    ("min7", ChordQuality::Minor7),
    ("dim7", ChordQuality::Diminished7),
    ("hdim7", ChordQuality::HalfDiminished7),
    ("sus4", ChordQuality::Sus4),
    ("sus2", ChordQuality::Sus2),
    ("m", ChordQuality::Minor),
    ("m7", ChordQuality::Minor7),
    ("m7b5", ChordQuality::HalfDiminished7),
    ("+", ChordQuality::Augmented),
];

pub fn quality_from_token(token: &str) -> ChordQuality {
    QUALITY_TOKENS
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, q)| *q)
        .unwrap_or(ChordQuality::Unknown)
}

/// Canonical chord symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSymbol {
    pub root: PitchName,
    pub quality: ChordQuality,
    /// Quality token as received, kept so unknown qualities still render
    pub token: String,
}

impl ChordSymbol {
    pub fn new(root: PitchName, quality: ChordQuality) -> Self {
        Self {
            root,
            quality,
            token: quality.suffix().to_string(),
        }
    }
}

impl std::fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.quality {
            ChordQuality::Unknown => write!(f, "{}{}", self.root, self.token),
            quality => write!(f, "{}{}", self.root, quality.suffix()),
        }
    }
}

/// Normalize a recognizer label. "N" and empty labels are no chord.
///
/// Unrecognized quality tokens map to [`ChordQuality::Unknown`] and are kept;
/// a label whose root cannot be read is dropped with a warning.
pub fn normalize(label: &str) -> Option<ChordSymbol> {
    let label = label.trim();
    if label.is_empty() || label == NO_CHORD {
        return None;
    }

    // Bass inversions ("C:maj/5", "G/B") don't change the symbol's quality
    let label = label.split_once('/').map_or(label, |(head, _)| head);

    let parsed = match label.split_once(':') {
        Some((root, quality)) => root
            .parse::<PitchName>()
            .ok()
            .map(|root| (root, quality)),
        None => PitchName::split_prefix(label),
    };

    let Some((root, token)) = parsed else {
        warn!(label, "unreadable chord root, dropping symbol");
        return None;
    };

    Some(ChordSymbol {
        root,
        quality: quality_from_token(token),
        token: token.to_string(),
    })
}

/// A chord segment from the recognizer, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChord {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

impl RawChord {
    pub fn new(start: f64, end: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }
}

/// Check that segments are well formed, ordered and non-overlapping.
pub fn validate_raw_chords(chords: &[RawChord]) -> Result<()> {
    for (index, chord) in chords.iter().enumerate() {
        if !chord.start.is_finite() || !chord.end.is_finite() || chord.start < 0.0 {
            return Err(Error::InvalidInput(format!(
                "chord {}: times {}..{} out of range",
                index, chord.start, chord.end
            )));
        }
        if chord.end <= chord.start {
            return Err(Error::InvalidInput(format!(
                "chord {}: end {} is not after start {}",
                index, chord.end, chord.start
            )));
        }
    }

    for (index, pair) in chords.windows(2).enumerate() {
        if pair[1].start < pair[0].end {
            return Err(Error::Precondition(format!(
                "chord {} starts at {} before chord {} ends at {}",
                index + 1,
                pair[1].start,
                index,
                pair[0].end
            )));
        }
    }

    Ok(())
}

/// The segment sounding at `time`, if any.
pub fn chord_at(chords: &[RawChord], time: f64) -> Option<&RawChord> {
    chords.iter().find(|c| c.start <= time && time < c.end)
}

/// A chord symbol scheduled in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordPlacement {
    /// Grid-aligned offset in beats from the start of the piece
    pub offset: f64,
    /// Grid-aligned length in beats, at least one grid step
    pub duration: f64,
    pub symbol: ChordSymbol,
}

/// Map recognizer segments to placed chord symbols.
///
/// Offsets snap to the same grid as notes. "N" segments are dropped; when two
/// symbols land on the same grid tick the later one wins.
pub fn map_chords(chords: &[RawChord], tempo_bpm: f64, grid_resolution: f64) -> Result<Vec<ChordPlacement>> {
    if !(tempo_bpm.is_finite() && tempo_bpm > 0.0) {
        return Err(Error::InvalidInput(format!("tempo {} must be > 0", tempo_bpm)));
    }
    if !(grid_resolution.is_finite() && grid_resolution > 0.0) {
        return Err(Error::InvalidInput(format!(
            "grid resolution {} must be > 0",
            grid_resolution
        )));
    }
    validate_raw_chords(chords)?;

    let mut placed: BTreeMap<i64, ChordPlacement> = BTreeMap::new();

    for chord in chords {
        let Some(symbol) = normalize(&chord.label) else {
            continue;
        };

        let tick = snap_ticks(seconds_to_beats(chord.start, tempo_bpm), grid_resolution);
        let length_ticks = snap_ticks(
            seconds_to_beats(chord.end - chord.start, tempo_bpm),
            grid_resolution,
        )
        .max(1);

        debug!(label = %chord.label, symbol = %symbol, tick, "placed chord symbol");

        placed.insert(
            tick,
            ChordPlacement {
                offset: tick as f64 * grid_resolution,
                duration: length_ticks as f64 * grid_resolution,
                symbol,
            },
        );
    }

    Ok(placed.into_values().collect())
}
