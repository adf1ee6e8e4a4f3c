use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::TimeSignature;
use crate::{Error, Result};

/// A tracked beat in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub time: f64,
    pub is_downbeat: bool,
}

impl Beat {
    pub fn new(time: f64, is_downbeat: bool) -> Self {
        Self { time, is_downbeat }
    }
}

/// Build beats from a tracker that reports `(time, position in bar)`, where
/// position 1 is the downbeat.
pub fn beats_from_positions(positions: &[(f64, u32)]) -> Vec<Beat> {
    positions
        .iter()
        .map(|&(time, position)| Beat::new(time, position == 1))
        .collect()
}

/// Beats from one downbeat up to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// 1-based; a pickup is measure 0
    pub number: usize,
    pub beats: Vec<Beat>,
    /// Leading beats before the first downbeat
    pub pickup: bool,
}

impl Measure {
    pub fn start(&self) -> f64 {
        self.beats.first().map_or(0.0, |b| b.time)
    }

    pub fn beat_count(&self) -> usize {
        self.beats.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureGrouping {
    pub measures: Vec<Measure>,
    pub time_signature: TimeSignature,
    /// False when no downbeat was seen and the signature is the 4/4 default
    pub inferred: bool,
}

fn validate_beats(beats: &[Beat]) -> Result<()> {
    for (index, beat) in beats.iter().enumerate() {
        if !beat.time.is_finite() || beat.time < 0.0 {
            return Err(Error::InvalidInput(format!(
                "beat {}: time {} must be finite and >= 0",
                index, beat.time
            )));
        }
    }
    for (index, pair) in beats.windows(2).enumerate() {
        if pair[1].time <= pair[0].time {
            return Err(Error::Precondition(format!(
                "beat {} at {} does not follow beat {} at {}",
                index + 1,
                pair[1].time,
                index,
                pair[0].time
            )));
        }
    }
    Ok(())
}

/// Group beats into measures and infer the meter.
///
/// A measure starts at every downbeat. Beats ahead of the first downbeat form
/// a pickup measure, which does not vote on the meter. The numerator is the
/// most common beat count (smallest on a tie); the beat unit is always a
/// quarter note.
pub fn group(beats: &[Beat]) -> Result<MeasureGrouping> {
    validate_beats(beats)?;

    if !beats.iter().any(|b| b.is_downbeat) {
        let measures = if beats.is_empty() {
            Vec::new()
        } else {
            vec![Measure {
                number: 1,
                beats: beats.to_vec(),
                pickup: false,
            }]
        };
        return Ok(MeasureGrouping {
            measures,
            time_signature: TimeSignature::default(),
            inferred: false,
        });
    }

    let mut measures: Vec<Measure> = Vec::new();
    for beat in beats {
        if !beat.is_downbeat {
            if let Some(current) = measures.last_mut() {
                current.beats.push(*beat);
                continue;
            }
        }

        let pickup = !beat.is_downbeat;
        let number = if pickup {
            0
        } else {
            measures.iter().filter(|m| !m.pickup).count() + 1
        };
        measures.push(Measure {
            number,
            beats: vec![*beat],
            pickup,
        });
    }

    // BTreeMap iterates counts ascending, so a strict > keeps the smallest on ties
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for measure in measures.iter().filter(|m| !m.pickup) {
        *histogram.entry(measure.beat_count()).or_default() += 1;
    }

    let mut numerator = 4;
    let mut best = 0;
    for (&count, &votes) in &histogram {
        if votes > best {
            best = votes;
            numerator = count;
        }
    }

    Ok(MeasureGrouping {
        measures,
        time_signature: TimeSignature::quarter(u8::try_from(numerator).unwrap_or(u8::MAX)),
        inferred: true,
    })
}
