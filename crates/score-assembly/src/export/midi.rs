use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use scoreconf::ExportConfig;

use crate::score::{Score, ScoreElement};
use crate::types::KeyMode;
use crate::{Error, Result};

/// Largest delta a 28-bit variable-length quantity holds.
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// (tick, event); offs sort before ons at the same tick.
type Timed<'a> = (u64, TrackEventKind<'a>);

fn beats_to_ticks(beats: f64, ppq: u16) -> u64 {
    (beats * ppq as f64).round().max(0.0) as u64
}

fn note_on(channel: u8, pitch: u8, velocity: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel.min(15)),
        message: MidiMessage::NoteOn {
            key: u7::new(pitch.min(127)),
            vel: u7::new(velocity.clamp(1, 127)),
        },
    }
}

fn note_off(channel: u8, pitch: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel.min(15)),
        message: MidiMessage::NoteOff {
            key: u7::new(pitch.min(127)),
            vel: u7::new(0),
        },
    }
}

fn is_note_off(kind: &TrackEventKind<'_>) -> bool {
    matches!(
        kind,
        TrackEventKind::Midi {
            message: MidiMessage::NoteOff { .. },
            ..
        }
    )
}

/// Turn absolute-tick events into a delta-timed track ending in EndOfTrack.
fn into_track(mut events: Vec<Timed<'_>>) -> Vec<TrackEvent<'_>> {
    events.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| is_note_off(&b.1).cmp(&is_note_off(&a.1))));

    let mut track = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;
    for (tick, kind) in events {
        let delta = tick.saturating_sub(last_tick).min(MAX_DELTA);
        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind,
        });
        last_tick = tick;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Encode a score as a format 1 Standard MIDI File.
///
/// Track 0 carries the title, tempo, meter and key; track 1 the notes, with
/// chord symbols as text events.
pub fn to_midi(score: &Score, options: &ExportConfig) -> Result<Vec<u8>> {
    let ppq = options.ticks_per_beat.clamp(1, 0x7FFF);
    let channel = options.channel.min(15);

    let usec_per_beat = (60_000_000.0 / score.tempo_bpm).round().clamp(1.0, 0xFF_FFFF as f64) as u32;
    let ts = score.time_signature;
    let denominator_pow = ts.beat_unit.max(1).trailing_zeros() as u8;

    let conductor = into_track(vec![
        (0, TrackEventKind::Meta(MetaMessage::TrackName(score.title.as_bytes()))),
        (0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(usec_per_beat)))),
        (
            0,
            TrackEventKind::Meta(MetaMessage::TimeSignature(ts.beats_per_measure, denominator_pow, 24, 8)),
        ),
        (
            0,
            TrackEventKind::Meta(MetaMessage::KeySignature(
                score.key.fifths(),
                score.key.mode == KeyMode::Minor,
            )),
        ),
    ]);

    let labels: Vec<(u64, String)> = score
        .chord_symbols()
        .map(|c| (beats_to_ticks(c.offset, ppq), c.symbol.to_string()))
        .collect();

    let mut events: Vec<Timed<'_>> = vec![(
        0,
        TrackEventKind::Midi {
            channel: u4::new(channel),
            message: MidiMessage::ProgramChange {
                program: u7::new(options.program.min(127)),
            },
        },
    )];

    for (tick, label) in &labels {
        events.push((*tick, TrackEventKind::Meta(MetaMessage::Text(label.as_bytes()))));
    }

    for element in &score.elements {
        let voices: Vec<(u8, u8)> = match element {
            ScoreElement::ChordSymbol(_) => continue,
            ScoreElement::Note(n) => vec![(n.pitch, n.velocity)],
            ScoreElement::Stack(s) => s.voices.iter().map(|v| (v.pitch, v.velocity)).collect(),
        };

        let on = beats_to_ticks(element.offset(), ppq);
        let off = beats_to_ticks(element.offset() + element.duration(), ppq).max(on + 1);
        for (pitch, velocity) in voices {
            events.push((on, note_on(channel, pitch, velocity)));
            events.push((off, note_off(channel, pitch)));
        }
    }

    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(ppq))));
    smf.tracks.push(conductor);
    smf.tracks.push(into_track(events));

    let mut bytes = Vec::new();
    smf.write(&mut bytes).map_err(|e| Error::Midi(e.to_string()))?;
    Ok(bytes)
}
