use serde::{Deserialize, Serialize};

use crate::note::{pitch_name, NoteEvent};

/// Summary statistics for one transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionStats {
    pub note_count: usize,
    /// Recording length in seconds
    pub duration: f64,
    pub notes_per_second: f64,
    pub pitch_min: u8,
    pub pitch_max: u8,
    pub average_velocity: f64,
    /// Seconds
    pub average_note_duration: f64,
    pub min_note_duration: f64,
    pub max_note_duration: f64,
}

impl TranscriptionStats {
    pub fn from_notes(notes: &[NoteEvent], duration: f64) -> Self {
        if notes.is_empty() {
            return Self {
                note_count: 0,
                duration,
                notes_per_second: 0.0,
                pitch_min: 0,
                pitch_max: 0,
                average_velocity: 0.0,
                average_note_duration: 0.0,
                min_note_duration: 0.0,
                max_note_duration: 0.0,
            };
        }

        let count = notes.len() as f64;
        let pitch_min = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
        let pitch_max = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
        let average_velocity = notes.iter().map(|n| n.velocity as f64).sum::<f64>() / count;

        let durations: Vec<f64> = notes.iter().map(NoteEvent::duration).collect();
        let average_note_duration = durations.iter().sum::<f64>() / count;
        let min_note_duration = durations.iter().copied().fold(f64::INFINITY, f64::min);
        let max_note_duration = durations.iter().copied().fold(0.0, f64::max);

        let notes_per_second = if duration > 0.0 { count / duration } else { 0.0 };

        Self {
            note_count: notes.len(),
            duration,
            notes_per_second,
            pitch_min,
            pitch_max,
            average_velocity,
            average_note_duration,
            min_note_duration,
            max_note_duration,
        }
    }

    /// Pitch range as names, ("N/A", "N/A") when there are no notes.
    pub fn pitch_range_names(&self) -> (String, String) {
        if self.note_count == 0 {
            return ("N/A".to_string(), "N/A".to_string());
        }
        (pitch_name(self.pitch_min), pitch_name(self.pitch_max))
    }
}
