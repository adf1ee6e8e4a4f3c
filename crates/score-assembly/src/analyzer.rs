use note_events::NoteEvent;

use crate::chord_labels::{map_chords, ChordPlacement, RawChord};
use crate::key::{estimate, PitchClassProfile};
use crate::measures::{group, Beat, MeasureGrouping};
use crate::quantize::{quantize, QuantizeParams, QuantizedElement};
use crate::types::KeyEstimate;
use crate::Result;

/// Trait for feature reduction backends.
///
/// `TemplateReducer` uses template matching and grid bucketing. A learned
/// backend can stand in for any single reduction without touching assembly.
pub trait FeatureReducer: Send + Sync {
    fn estimate_key(&self, profile: &PitchClassProfile) -> KeyEstimate;

    fn group_measures(&self, beats: &[Beat]) -> Result<MeasureGrouping>;

    fn map_chords(
        &self,
        chords: &[RawChord],
        tempo_bpm: f64,
        grid_resolution: f64,
    ) -> Result<Vec<ChordPlacement>>;

    fn quantize(&self, notes: &[NoteEvent], params: &QuantizeParams) -> Result<Vec<QuantizedElement>>;
}

/// Krumhansl-Schmuckler key estimation, downbeat-mode meter inference,
/// table-driven chord normalization and grid quantization.
pub struct TemplateReducer;

impl FeatureReducer for TemplateReducer {
    fn estimate_key(&self, profile: &PitchClassProfile) -> KeyEstimate {
        estimate(profile)
    }

    fn group_measures(&self, beats: &[Beat]) -> Result<MeasureGrouping> {
        group(beats)
    }

    fn map_chords(
        &self,
        chords: &[RawChord],
        tempo_bpm: f64,
        grid_resolution: f64,
    ) -> Result<Vec<ChordPlacement>> {
        map_chords(chords, tempo_bpm, grid_resolution)
    }

    fn quantize(&self, notes: &[NoteEvent], params: &QuantizeParams) -> Result<Vec<QuantizedElement>> {
        quantize(notes, params)
    }
}
