use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::chord_labels::ChordPlacement;
use crate::quantize::{QuantizedChordStack, QuantizedElement, QuantizedNote};
use crate::types::{Clef, KeyEstimate, ScoreMetadata, TimeSignature};
use crate::{Error, Result};

/// Mean pitch below this selects the bass clef (G3).
pub const BASS_CLEF_BELOW: f64 = 55.0;

/// One entry of the score timeline. Offsets and durations are in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreElement {
    ChordSymbol(ChordPlacement),
    Note(QuantizedNote),
    Stack(QuantizedChordStack),
}

impl ScoreElement {
    pub fn offset(&self) -> f64 {
        match self {
            ScoreElement::ChordSymbol(c) => c.offset,
            ScoreElement::Note(n) => n.offset,
            ScoreElement::Stack(s) => s.offset,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            ScoreElement::ChordSymbol(c) => c.duration,
            ScoreElement::Note(n) => n.duration,
            ScoreElement::Stack(s) => s.duration,
        }
    }

    pub fn is_chord_symbol(&self) -> bool {
        matches!(self, ScoreElement::ChordSymbol(_))
    }

    /// Sounding pitches; empty for chord symbols.
    pub fn pitches(&self) -> Vec<u8> {
        match self {
            ScoreElement::ChordSymbol(_) => Vec::new(),
            ScoreElement::Note(n) => vec![n.pitch],
            ScoreElement::Stack(s) => s.pitches(),
        }
    }

    /// Chord symbols sort ahead of notes sharing their offset.
    fn rank(&self) -> u8 {
        if self.is_chord_symbol() {
            0
        } else {
            1
        }
    }
}

impl From<QuantizedElement> for ScoreElement {
    fn from(element: QuantizedElement) -> Self {
        match element {
            QuantizedElement::Note(n) => ScoreElement::Note(n),
            QuantizedElement::Stack(s) => ScoreElement::Stack(s),
        }
    }
}

/// The assembled score handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub title: String,
    pub composer: String,
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,
    pub key: KeyEstimate,
    pub clef: Clef,
    /// Ascending offset
    pub elements: Vec<ScoreElement>,
}

/// Elements whose onset falls inside one measure.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar<'a> {
    /// 0-based
    pub index: usize,
    pub start: f64,
    pub elements: Vec<&'a ScoreElement>,
}

impl Score {
    pub fn chord_symbols(&self) -> impl Iterator<Item = &ChordPlacement> {
        self.elements.iter().filter_map(|e| match e {
            ScoreElement::ChordSymbol(c) => Some(c),
            _ => None,
        })
    }

    /// Notes and stacks, skipping chord symbols.
    pub fn musical_elements(&self) -> impl Iterator<Item = &ScoreElement> {
        self.elements.iter().filter(|e| !e.is_chord_symbol())
    }

    /// Beat position where the last element stops sounding.
    pub fn end_beat(&self) -> f64 {
        self.elements
            .iter()
            .map(|e| e.offset() + e.duration())
            .fold(0.0, f64::max)
    }

    /// Split the timeline into bars of the score's meter, by onset.
    ///
    /// Only bars holding at least one onset are returned; `index` keeps the
    /// absolute bar number so callers can see the gaps.
    pub fn bars(&self) -> Vec<Bar<'_>> {
        let bar_length = self.time_signature.measure_beats();
        if bar_length <= 0.0 {
            return Vec::new();
        }

        let mut by_index: BTreeMap<usize, Vec<&ScoreElement>> = BTreeMap::new();
        for element in &self.elements {
            let index = (element.offset() / bar_length).floor() as usize;
            by_index.entry(index).or_default().push(element);
        }

        by_index
            .into_iter()
            .map(|(index, elements)| Bar {
                index,
                start: index as f64 * bar_length,
                elements,
            })
            .collect()
    }
}

/// Register hint from the mean sounding pitch; treble when there are no notes.
pub fn select_clef(elements: &[QuantizedElement]) -> Clef {
    let pitches: Vec<u8> = elements.iter().flat_map(QuantizedElement::pitches).collect();
    if pitches.is_empty() {
        return Clef::Treble;
    }

    let mean = pitches.iter().map(|&p| p as f64).sum::<f64>() / pitches.len() as f64;
    if mean < BASS_CLEF_BELOW {
        Clef::Bass
    } else {
        Clef::Treble
    }
}

/// Merge quantized notes and chord symbols into one score.
///
/// Elements are ordered by offset; a chord symbol precedes a note or stack at
/// the same offset. Chord symbols are kept even where no note sounds.
pub fn assemble(
    elements: Vec<QuantizedElement>,
    chords: Vec<ChordPlacement>,
    key: KeyEstimate,
    time_signature: TimeSignature,
    tempo_bpm: f64,
    metadata: ScoreMetadata,
) -> Result<Score> {
    if !(tempo_bpm.is_finite() && tempo_bpm > 0.0) {
        return Err(Error::InvalidInput(format!("tempo {} must be > 0", tempo_bpm)));
    }
    if let Some(bad) = chords
        .iter()
        .map(|c| c.offset)
        .chain(elements.iter().map(QuantizedElement::offset))
        .find(|o| !o.is_finite() || *o < 0.0)
    {
        return Err(Error::InvalidInput(format!("element offset {} must be >= 0", bad)));
    }

    let clef = select_clef(&elements);

    let mut merged: Vec<ScoreElement> = chords.into_iter().map(ScoreElement::ChordSymbol).collect();
    merged.extend(elements.into_iter().map(ScoreElement::from));

    // Stable: inputs keep their relative order within an offset and kind
    merged.sort_by(|a, b| match a.offset().total_cmp(&b.offset()) {
        Ordering::Equal => a.rank().cmp(&b.rank()),
        other => other,
    });

    Ok(Score {
        title: metadata.title,
        composer: metadata.composer,
        tempo_bpm,
        time_signature,
        key,
        clef,
        elements: merged,
    })
}
