pub mod midi;
pub mod note;
pub mod stats;

pub use midi::{read_midi, MidiTranscription};
pub use note::{pitch_name, validate_all, velocity_from_unit, NoteEvent};
pub use stats::TranscriptionStats;

/// Errors from note validation and MIDI ingestion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid note: {0}")]
    InvalidNote(String),

    #[error("MIDI parse error: {0}")]
    MidiParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
