//! Continuous-time notes to a grid-aligned, chorded timeline.
//!
//! Onsets are bucketed on integer grid ticks rather than float offsets, so
//! two notes share a bucket exactly when they snap to the same tick.

use note_events::{validate_all, NoteEvent};
use scoreconf::QuantizeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Error, Result};

pub fn seconds_to_beats(seconds: f64, tempo_bpm: f64) -> f64 {
    seconds * tempo_bpm / 60.0
}

/// Nearest grid tick for a beat position, rounding halves up.
pub fn snap_ticks(beats: f64, grid_resolution: f64) -> i64 {
    (beats / grid_resolution + 0.5).floor() as i64
}

/// Quantization parameters for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizeParams {
    pub tempo_bpm: f64,
    /// Grid step as a fraction of a beat (0.25 = sixteenth notes)
    pub grid_resolution: f64,
    /// Shortest notated duration in beats
    pub min_duration: f64,
    pub max_voices: usize,
}

impl QuantizeParams {
    /// Sixteenth-note grid, four voices.
    pub fn new(tempo_bpm: f64) -> Self {
        Self::from_config(tempo_bpm, &QuantizeConfig::default())
    }

    pub fn from_config(tempo_bpm: f64, config: &QuantizeConfig) -> Self {
        Self {
            tempo_bpm,
            grid_resolution: config.grid_resolution,
            min_duration: config.effective_min_duration(),
            max_voices: config.max_voices,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0) {
            return Err(Error::InvalidInput(format!("tempo {} must be > 0", self.tempo_bpm)));
        }
        if !(self.grid_resolution.is_finite() && self.grid_resolution > 0.0) {
            return Err(Error::InvalidInput(format!(
                "grid resolution {} must be > 0",
                self.grid_resolution
            )));
        }
        if !(self.min_duration.is_finite() && self.min_duration > 0.0) {
            return Err(Error::InvalidInput(format!(
                "minimum duration {} must be > 0",
                self.min_duration
            )));
        }
        if self.max_voices == 0 {
            return Err(Error::InvalidInput("max voices must be >= 1".to_string()));
        }
        Ok(())
    }

    fn snap_duration(&self, beats: f64) -> f64 {
        let snapped = snap_ticks(beats, self.grid_resolution) as f64 * self.grid_resolution;
        snapped.max(self.min_duration)
    }
}

/// A single pitch at a grid offset. Offsets and durations are in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedNote {
    pub offset: f64,
    pub duration: f64,
    pub pitch: u8,
    pub velocity: u8,
}

/// One pitch inside a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub pitch: u8,
    pub velocity: u8,
}

/// Simultaneous pitches sharing an offset and a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedChordStack {
    pub offset: f64,
    pub duration: f64,
    /// Loudest first
    pub voices: Vec<Voice>,
    /// Integer mean of the voice velocities
    pub velocity: u8,
}

impl QuantizedChordStack {
    pub fn pitches(&self) -> Vec<u8> {
        self.voices.iter().map(|v| v.pitch).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantizedElement {
    Note(QuantizedNote),
    Stack(QuantizedChordStack),
}

impl QuantizedElement {
    pub fn offset(&self) -> f64 {
        match self {
            QuantizedElement::Note(n) => n.offset,
            QuantizedElement::Stack(s) => s.offset,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            QuantizedElement::Note(n) => n.duration,
            QuantizedElement::Stack(s) => s.duration,
        }
    }

    pub fn pitches(&self) -> Vec<u8> {
        match self {
            QuantizedElement::Note(n) => vec![n.pitch],
            QuantizedElement::Stack(s) => s.pitches(),
        }
    }
}

/// Quantize notes onto the grid and group simultaneities into stacks.
///
/// Buckets above `max_voices` keep their loudest notes; ties keep input
/// order. An empty note list quantizes to an empty timeline.
pub fn quantize(notes: &[NoteEvent], params: &QuantizeParams) -> Result<Vec<QuantizedElement>> {
    params.validate()?;
    validate_all(notes)?;

    let mut buckets: BTreeMap<i64, Vec<(usize, &NoteEvent)>> = BTreeMap::new();
    for (index, note) in notes.iter().enumerate() {
        let beats = seconds_to_beats(note.start, params.tempo_bpm);
        buckets
            .entry(snap_ticks(beats, params.grid_resolution))
            .or_default()
            .push((index, note));
    }

    let mut elements = Vec::with_capacity(buckets.len());

    for (tick, mut bucket) in buckets {
        // Stable: equal velocities stay in input order
        bucket.sort_by(|a, b| b.1.velocity.cmp(&a.1.velocity));

        if bucket.len() > params.max_voices {
            let dropped: Vec<usize> = bucket[params.max_voices..].iter().map(|(i, _)| *i).collect();
            debug!(tick, ?dropped, max_voices = params.max_voices, "dropping voices above cap");
            bucket.truncate(params.max_voices);
        }

        let offset = tick as f64 * params.grid_resolution;
        let durations: Vec<f64> = bucket
            .iter()
            .map(|(_, n)| params.snap_duration(seconds_to_beats(n.duration(), params.tempo_bpm)))
            .collect();

        let element = match bucket.as_slice() {
            [(_, note)] => QuantizedElement::Note(QuantizedNote {
                offset,
                duration: durations[0],
                pitch: note.pitch,
                velocity: note.velocity,
            }),
            _ => {
                let count = bucket.len();
                let mean_duration = durations.iter().sum::<f64>() / count as f64;
                let velocity_sum: usize = bucket.iter().map(|(_, n)| n.velocity as usize).sum();

                QuantizedElement::Stack(QuantizedChordStack {
                    offset,
                    duration: params.snap_duration(mean_duration),
                    voices: bucket
                        .iter()
                        .map(|(_, n)| Voice {
                            pitch: n.pitch,
                            velocity: n.velocity,
                        })
                        .collect(),
                    velocity: (velocity_sum / count) as u8,
                })
            }
        };

        elements.push(element);
    }

    Ok(elements)
}
