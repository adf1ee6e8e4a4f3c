use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A single transcribed note with absolute timing in seconds.
///
/// Produced by the transcription model and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch 0–127
    pub pitch: u8,
    /// Onset in seconds from the start of the recording
    pub start: f64,
    /// Release in seconds, strictly after `start`
    pub end: f64,
    /// MIDI velocity 0–127
    pub velocity: u8,
}

impl NoteEvent {
    pub fn new(pitch: u8, start: f64, end: f64, velocity: u8) -> Self {
        Self {
            pitch,
            start,
            end,
            velocity,
        }
    }

    /// Build from a model that reports velocity in 0.0–1.0.
    pub fn with_unit_velocity(pitch: u8, start: f64, end: f64, velocity: f64) -> Self {
        Self::new(pitch, start, end, velocity_from_unit(velocity))
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Scientific pitch name, e.g. "C4" for 60 or "A#3" for 58.
    pub fn name(&self) -> String {
        pitch_name(self.pitch)
    }

    /// Equal-tempered frequency in Hz (A4 = 440).
    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((self.pitch as f64 - 69.0) / 12.0)
    }

    /// Check the shape invariants: pitch and velocity in MIDI range,
    /// finite non-negative start, end after start.
    pub fn validate(&self) -> Result<()> {
        if self.pitch > 127 {
            return Err(Error::InvalidNote(format!("pitch {} above 127", self.pitch)));
        }
        if self.velocity > 127 {
            return Err(Error::InvalidNote(format!(
                "velocity {} above 127",
                self.velocity
            )));
        }
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(Error::InvalidNote(format!("start {} is not >= 0", self.start)));
        }
        if !self.end.is_finite() || self.end <= self.start {
            return Err(Error::InvalidNote(format!(
                "end {} is not after start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

/// Validate a whole note list, reporting the first offending index.
pub fn validate_all(notes: &[NoteEvent]) -> Result<()> {
    for (index, note) in notes.iter().enumerate() {
        note.validate().map_err(|e| match e {
            Error::InvalidNote(reason) => Error::InvalidNote(format!("note {}: {}", index, reason)),
            other => other,
        })?;
    }
    Ok(())
}

/// Scale a 0.0–1.0 velocity to MIDI, truncating toward zero.
pub fn velocity_from_unit(velocity: f64) -> u8 {
    if !velocity.is_finite() {
        return 0;
    }
    (velocity * 127.0).clamp(0.0, 127.0) as u8
}

pub fn pitch_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_scientific_pitch() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(58), "A#3");
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(pitch_name(127), "G9");
    }

    #[test]
    fn a4_is_440() {
        let note = NoteEvent::new(69, 0.0, 1.0, 80);
        assert!((note.frequency() - 440.0).abs() < 1e-9);
    }

    #[test]
    fn unit_velocity_truncates() {
        assert_eq!(velocity_from_unit(1.0), 127);
        assert_eq!(velocity_from_unit(0.8), 101);
        assert_eq!(velocity_from_unit(1.7), 127);
        assert_eq!(velocity_from_unit(-0.2), 0);
        assert_eq!(velocity_from_unit(f64::NAN), 0);
    }

    #[test]
    fn end_before_start_rejected() {
        let note = NoteEvent::new(60, 1.0, 1.0, 80);
        assert!(note.validate().is_err());

        let note = NoteEvent::new(60, 1.0, 0.5, 80);
        assert!(note.validate().is_err());
    }

    #[test]
    fn validate_all_names_index() {
        let notes = vec![
            NoteEvent::new(60, 0.0, 0.5, 80),
            NoteEvent::new(200, 0.5, 1.0, 80),
        ];
        let err = validate_all(&notes).unwrap_err();
        assert!(err.to_string().contains("note 1"), "{}", err);
    }
}
