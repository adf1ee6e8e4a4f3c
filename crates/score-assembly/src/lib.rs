pub mod analyzer;
pub mod chord_labels;
pub mod export;
pub mod job;
pub mod key;
pub mod measures;
pub mod quantize;
pub mod score;
pub mod types;

pub use analyzer::{FeatureReducer, TemplateReducer};
pub use chord_labels::{normalize, ChordPlacement, ChordQuality, ChordSymbol, PitchName, RawChord};
pub use export::{ExportFormat, ScoreSource};
pub use job::{AudioFeatures, Overrides, ResolvedSources, Transcription, TranscriptionJob, ValueSource};
pub use key::{key_to_abc, parse_key_label, PitchClassProfile};
pub use measures::{Beat, Measure, MeasureGrouping};
pub use quantize::{QuantizeParams, QuantizedChordStack, QuantizedElement, QuantizedNote};
pub use score::{assemble, Score, ScoreElement};
pub use types::{Clef, KeyEstimate, KeyMode, PitchClass, ScoreMetadata, TimeSignature};

use std::sync::Arc;

use note_events::TranscriptionStats;
use scoreconf::{ConfigError, ScoreConfig};
use tracing::{debug, info, warn};

/// Errors from the assembly engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error(transparent)]
    Notes(#[from] note_events::Error),

    #[error("cannot parse {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("MIDI encode error: {0}")]
    Midi(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Notation assembly engine.
///
/// Resolves tempo, key and meter for a job, reduces the audio features,
/// quantizes the notes and assembles one `Score`. Holds no per-job state;
/// a single engine can serve many jobs.
pub struct ScoreEngine {
    reducer: Arc<dyn FeatureReducer>,
    config: ScoreConfig,
    default_key: KeyEstimate,
    default_time_signature: TimeSignature,
}

impl ScoreEngine {
    /// Create with the default template reducer.
    pub fn new(config: ScoreConfig) -> Result<Self> {
        Self::with_reducer(Arc::new(TemplateReducer), config)
    }

    /// Create with a custom reducer (for testing or a learned backend).
    pub fn with_reducer(reducer: Arc<dyn FeatureReducer>, config: ScoreConfig) -> Result<Self> {
        config.validate()?;

        let default_key = KeyEstimate {
            confidence: 0.0,
            ..parse_key_label(&config.defaults.key)?
        };
        let default_time_signature: TimeSignature = config.defaults.time_signature.parse()?;

        Ok(Self {
            reducer,
            config,
            default_key,
            default_time_signature,
        })
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Assemble a score from one job.
    ///
    /// Chord and beat reductions are optional annotations: when either fails
    /// the job continues without them. Note quantization is mandatory.
    pub fn transcribe(&self, job: &TranscriptionJob) -> Result<Transcription> {
        info!(
            notes = job.notes.len(),
            beats = job.features.beats.len(),
            chords = job.features.chords.len(),
            "assembling score"
        );

        let (tempo_bpm, tempo_source) = self.resolve_tempo(job)?;
        let params = QuantizeParams::from_config(tempo_bpm, &self.config.quantize);
        params.validate()?;

        let (key, key_source) = self.resolve_key(job);

        let (measures, time_signature, meter_source) = match self.reducer.group_measures(&job.features.beats) {
            Ok(grouping) => {
                let (time_signature, source) = match job.overrides.time_signature {
                    Some(ts) => (ts, ValueSource::Override),
                    None if grouping.inferred => (grouping.time_signature, ValueSource::Estimated),
                    None => (self.default_time_signature, ValueSource::Default),
                };
                (grouping.measures, time_signature, source)
            }
            Err(e) => {
                warn!(error = %e, "beat grouping failed, continuing without measures");
                match job.overrides.time_signature {
                    Some(ts) => (Vec::new(), ts, ValueSource::Override),
                    None => (Vec::new(), self.default_time_signature, ValueSource::Default),
                }
            }
        };

        let chords = match self
            .reducer
            .map_chords(&job.features.chords, tempo_bpm, params.grid_resolution)
        {
            Ok(chords) => chords,
            Err(e) => {
                warn!(error = %e, "chord mapping failed, continuing without chord symbols");
                Vec::new()
            }
        };

        let elements = self.reducer.quantize(&job.notes, &params)?;

        let metadata = ScoreMetadata {
            title: job
                .overrides
                .title
                .clone()
                .unwrap_or_else(|| self.config.defaults.title.clone()),
            composer: job
                .overrides
                .composer
                .clone()
                .unwrap_or_else(|| self.config.defaults.composer.clone()),
        };

        let score = assemble(elements, chords, key, time_signature, tempo_bpm, metadata)?;

        info!(
            tempo = tempo_bpm,
            key = %score.key.name(),
            time_signature = %score.time_signature,
            elements = score.elements.len(),
            measures = measures.len(),
            "score assembled"
        );

        Ok(Transcription {
            stats: TranscriptionStats::from_notes(&job.notes, job.duration),
            score,
            measures,
            sources: ResolvedSources {
                tempo: tempo_source,
                key: key_source,
                time_signature: meter_source,
            },
        })
    }

    /// Assemble a score from Standard MIDI File bytes.
    ///
    /// The file's first tempo event stands in for a tempo estimate.
    pub fn from_midi(&self, bytes: &[u8], overrides: Overrides) -> Result<Transcription> {
        let midi = note_events::read_midi(bytes)?;
        debug!(notes = midi.notes.len(), tempo = ?midi.tempo_bpm, "read MIDI file");

        let job = TranscriptionJob {
            notes: midi.notes,
            duration: midi.duration,
            features: AudioFeatures {
                tempo_bpm: midi.tempo_bpm,
                ..Default::default()
            },
            overrides,
        };
        self.transcribe(&job)
    }

    fn resolve_tempo(&self, job: &TranscriptionJob) -> Result<(f64, ValueSource)> {
        let (tempo, source) = match (job.overrides.tempo_bpm, job.features.tempo_bpm) {
            (Some(tempo), _) => (tempo, ValueSource::Override),
            (None, Some(tempo)) => (tempo, ValueSource::Estimated),
            (None, None) => (self.config.defaults.tempo_bpm, ValueSource::Default),
        };

        if !(tempo.is_finite() && tempo > 0.0) {
            return Err(Error::InvalidInput(format!("tempo {} must be > 0", tempo)));
        }
        debug!(tempo, ?source, "resolved tempo");
        Ok((tempo, source))
    }

    fn resolve_key(&self, job: &TranscriptionJob) -> (KeyEstimate, ValueSource) {
        if let Some(key) = job.overrides.key {
            return (key, ValueSource::Override);
        }

        let profile = match &job.features.pitch_profile {
            Some(profile) => *profile,
            None if !job.notes.is_empty() => PitchClassProfile::from_notes(&job.notes),
            None => {
                debug!(key = %self.default_key.name(), "no pitch material, using default key");
                return (self.default_key, ValueSource::Default);
            }
        };

        let key = self.reducer.estimate_key(&profile);
        debug!(key = %key.name(), confidence = key.confidence, "estimated key");
        (key, ValueSource::Estimated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use note_events::NoteEvent;
    use pretty_assertions::assert_eq;

    fn engine() -> ScoreEngine {
        ScoreEngine::new(ScoreConfig::default()).unwrap()
    }

    fn c_major_notes() -> Vec<NoteEvent> {
        [60, 62, 64, 65, 67, 69, 71, 72]
            .iter()
            .enumerate()
            .map(|(i, &p)| NoteEvent::new(p, i as f64 * 0.5, (i + 1) as f64 * 0.5, 80))
            .collect()
    }

    /// Reducer whose chord and beat reductions always fail.
    struct FlakyReducer;

    impl FeatureReducer for FlakyReducer {
        fn estimate_key(&self, profile: &PitchClassProfile) -> KeyEstimate {
            key::estimate(profile)
        }

        fn group_measures(&self, _beats: &[Beat]) -> Result<MeasureGrouping> {
            Err(Error::Precondition("beats out of order".into()))
        }

        fn map_chords(&self, _chords: &[RawChord], _tempo: f64, _grid: f64) -> Result<Vec<ChordPlacement>> {
            Err(Error::Precondition("chords overlap".into()))
        }

        fn quantize(
            &self,
            notes: &[note_events::NoteEvent],
            params: &QuantizeParams,
        ) -> Result<Vec<QuantizedElement>> {
            quantize::quantize(notes, params)
        }
    }

    #[test]
    fn defaults_fill_missing_features() {
        let transcription = engine().transcribe(&TranscriptionJob::new(vec![], 0.0)).unwrap();

        assert_eq!(transcription.score.tempo_bpm, 120.0);
        assert_eq!(transcription.score.key.name(), "C major");
        assert_eq!(transcription.score.time_signature, TimeSignature::quarter(4));
        assert_eq!(transcription.score.title, "Untitled");
        assert!(transcription.score.elements.is_empty());
        assert_eq!(
            transcription.sources,
            ResolvedSources {
                tempo: ValueSource::Default,
                key: ValueSource::Default,
                time_signature: ValueSource::Default,
            }
        );
    }

    #[test]
    fn key_estimated_from_notes_without_profile() {
        let job = TranscriptionJob::new(c_major_notes(), 4.0);
        let transcription = engine().transcribe(&job).unwrap();

        assert_eq!(transcription.score.key.name(), "C major");
        assert_eq!(transcription.sources.key, ValueSource::Estimated);
        assert_eq!(transcription.stats.note_count, 8);
    }

    #[test]
    fn overrides_win() {
        let overrides = Overrides::default()
            .with_key("D minor")
            .unwrap()
            .with_time_signature("3/4")
            .unwrap()
            .with_tempo(90.0)
            .with_title("Etude");
        let job = TranscriptionJob::new(c_major_notes(), 4.0)
            .with_features(AudioFeatures {
                tempo_bpm: Some(140.0),
                ..Default::default()
            })
            .with_overrides(overrides);

        let score = engine().transcribe(&job).unwrap().score;
        assert_eq!(score.tempo_bpm, 90.0);
        assert_eq!(score.key.name(), "D minor");
        assert_eq!(score.key.confidence, 1.0);
        assert_eq!(score.time_signature.to_string(), "3/4");
        assert_eq!(score.title, "Etude");
    }

    #[test]
    fn failed_annotations_do_not_abort() {
        let engine = ScoreEngine::with_reducer(Arc::new(FlakyReducer), ScoreConfig::default()).unwrap();
        let job = TranscriptionJob::new(c_major_notes(), 4.0).with_features(AudioFeatures {
            chords: vec![RawChord::new(0.0, 1.0, "C:maj")],
            beats: vec![Beat::new(0.0, true)],
            ..Default::default()
        });

        let transcription = engine.transcribe(&job).unwrap();
        assert_eq!(transcription.score.chord_symbols().count(), 0);
        assert!(transcription.measures.is_empty());
        assert_eq!(transcription.score.time_signature, TimeSignature::default());
        assert_eq!(transcription.score.elements.len(), 8);
    }

    #[test]
    fn bad_notes_abort() {
        let job = TranscriptionJob::new(vec![NoteEvent::new(60, 1.0, 0.5, 80)], 1.0);
        assert!(matches!(engine().transcribe(&job), Err(Error::Notes(_))));
    }

    #[test]
    fn non_positive_tempo_aborts() {
        let job = TranscriptionJob::new(c_major_notes(), 4.0).with_overrides(Overrides::default().with_tempo(0.0));
        assert!(matches!(engine().transcribe(&job), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = ScoreConfig::default();
        config.quantize.max_voices = 0;
        assert!(matches!(ScoreEngine::new(config), Err(Error::Config(_))));

        let mut config = ScoreConfig::default();
        config.defaults.key = "Q major".into();
        assert!(matches!(ScoreEngine::new(config), Err(Error::Parse(_))));
    }
}
