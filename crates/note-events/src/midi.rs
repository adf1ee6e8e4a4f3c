//! Standard MIDI File ingestion.
//!
//! Turns an SMF into the same `NoteEvent` list the transcription model
//! produces, so a MIDI file can stand in for a fresh transcription.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::note::NoteEvent;
use crate::{Error, Result};

const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// Notes and timing recovered from a MIDI file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiTranscription {
    /// Sorted by start time
    pub notes: Vec<NoteEvent>,
    /// Tempo of the first tempo event, if any
    pub tempo_bpm: Option<f64>,
    /// Seconds to the last event
    pub duration: f64,
}

/// Tempo change at an absolute tick.
#[derive(Debug, Clone, Copy)]
struct TempoChange {
    tick: u64,
    microseconds_per_beat: u32,
}

/// Converts absolute ticks to seconds through a tempo map.
struct TickClock {
    ticks_per_second: Option<f64>,
    ppq: f64,
    tempo_changes: Vec<TempoChange>,
}

impl TickClock {
    fn seconds(&self, tick: u64) -> f64 {
        if let Some(tps) = self.ticks_per_second {
            return tick as f64 / tps;
        }

        let mut seconds = 0.0;
        let mut last_tick = 0u64;
        let mut usec = DEFAULT_USEC_PER_BEAT;

        for change in &self.tempo_changes {
            if change.tick >= tick {
                break;
            }
            seconds += (change.tick - last_tick) as f64 * usec as f64 / (self.ppq * 1e6);
            last_tick = change.tick;
            usec = change.microseconds_per_beat;
        }

        seconds + (tick - last_tick) as f64 * usec as f64 / (self.ppq * 1e6)
    }
}

/// Parse SMF bytes into note events.
pub fn read_midi(bytes: &[u8]) -> Result<MidiTranscription> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let (ppq, ticks_per_second) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int() as f64, None),
        Timing::Timecode(fps, subframe) => (480.0, Some(fps.as_f32() as f64 * subframe as f64)),
    };

    // (onset_tick, offset_tick, pitch, velocity)
    let mut spans: Vec<(u64, u64, u8, u8)> = Vec::new();
    let mut tempo_changes = Vec::new();
    let mut total_ticks: u64 = 0;

    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        // Map (channel, pitch) → Vec<(onset_tick, velocity)> for stacking
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push(TempoChange {
                        tick: current_tick,
                        microseconds_per_beat: tempo.as_int(),
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            // vel=0 NoteOn is NoteOff
                            let key = (ch, key.as_int());
                            if let Some((onset, velocity)) =
                                pending.get_mut(&key).and_then(|stack| stack.pop())
                            {
                                spans.push((onset, current_tick, key.1, velocity));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }

            total_ticks = total_ticks.max(current_tick);
        }

        // Close any unclosed notes at the track's final tick
        for ((_, pitch), stack) in pending {
            for (onset, velocity) in stack {
                spans.push((onset, current_tick, pitch, velocity));
            }
        }
    }

    tempo_changes.sort_by_key(|tc| tc.tick);
    let tempo_bpm = tempo_changes
        .first()
        .map(|tc| 60_000_000.0 / tc.microseconds_per_beat as f64);

    let clock = TickClock {
        ticks_per_second,
        ppq,
        tempo_changes,
    };

    let mut notes: Vec<NoteEvent> = spans
        .into_iter()
        .filter(|(onset, offset, _, _)| offset > onset)
        .map(|(onset, offset, pitch, velocity)| {
            NoteEvent::new(pitch, clock.seconds(onset), clock.seconds(offset), velocity)
        })
        .collect();

    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

    Ok(MidiTranscription {
        notes,
        tempo_bpm,
        duration: clock.seconds(total_ticks),
    })
}
