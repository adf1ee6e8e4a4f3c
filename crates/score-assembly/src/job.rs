use note_events::{NoteEvent, TranscriptionStats};
use serde::{Deserialize, Serialize};

use crate::chord_labels::RawChord;
use crate::key::{parse_key_label, PitchClassProfile};
use crate::measures::{Beat, Measure};
use crate::score::Score;
use crate::types::{KeyEstimate, TimeSignature};
use crate::Result;

/// Output of the audio-feature model for one recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub tempo_bpm: Option<f64>,
    pub pitch_profile: Option<PitchClassProfile>,
    pub beats: Vec<Beat>,
    pub chords: Vec<RawChord>,
}

/// Caller-supplied values that win over anything estimated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub tempo_bpm: Option<f64>,
    pub key: Option<KeyEstimate>,
    pub time_signature: Option<TimeSignature>,
    pub title: Option<String>,
    pub composer: Option<String>,
}

impl Overrides {
    /// Set the key from a label such as "D minor" or "Bb".
    pub fn with_key(mut self, label: &str) -> Result<Self> {
        self.key = Some(parse_key_label(label)?);
        Ok(self)
    }

    /// Set the meter from a label such as "3/4".
    pub fn with_time_signature(mut self, label: &str) -> Result<Self> {
        self.time_signature = Some(label.parse::<TimeSignature>()?);
        Ok(self)
    }

    pub fn with_tempo(mut self, tempo_bpm: f64) -> Self {
        self.tempo_bpm = Some(tempo_bpm);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_composer(mut self, composer: impl Into<String>) -> Self {
        self.composer = Some(composer.into());
        self
    }
}

/// Everything the engine needs to assemble one score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionJob {
    /// From the transcription model
    pub notes: Vec<NoteEvent>,
    /// Recording length in seconds
    pub duration: f64,
    pub features: AudioFeatures,
    pub overrides: Overrides,
}

impl TranscriptionJob {
    pub fn new(notes: Vec<NoteEvent>, duration: f64) -> Self {
        Self {
            notes,
            duration,
            ..Default::default()
        }
    }

    pub fn with_features(mut self, features: AudioFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Where a resolved score parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Override,
    Estimated,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSources {
    pub tempo: ValueSource,
    pub key: ValueSource,
    pub time_signature: ValueSource,
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub score: Score,
    pub measures: Vec<Measure>,
    pub stats: TranscriptionStats,
    pub sources: ResolvedSources,
}
