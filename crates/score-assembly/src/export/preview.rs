use std::fmt::Write as _;

use note_events::pitch_name;

use crate::score::{Score, ScoreElement};

const RULE_WIDTH: usize = 60;
const PREVIEW_CHORDS: usize = 10;
const PREVIEW_NOTES: usize = 20;

/// Plain-text summary: header fields, the first chord symbols and notes.
pub fn preview(score: &Score) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{}\nSCORE PREVIEW\n{}\n", heavy, heavy);
    let _ = writeln!(out, "Title: {}", score.title);
    let _ = writeln!(out, "Composer: {}", score.composer);
    let _ = writeln!(out, "Tempo: {} BPM", score.tempo_bpm);
    let _ = writeln!(out, "Key: {} (confidence {:.2})", score.key.name(), score.key.confidence);
    let _ = writeln!(out, "Time Signature: {}", score.time_signature);
    let _ = writeln!(out, "Length: {:.2} beats", score.end_beat());

    let chords: Vec<_> = score.chord_symbols().collect();
    if !chords.is_empty() {
        let _ = writeln!(
            out,
            "\n{}\nChord Symbols ({} total, first {}):\n{}",
            light,
            chords.len(),
            PREVIEW_CHORDS,
            light
        );
        for chord in chords.iter().take(PREVIEW_CHORDS) {
            let _ = writeln!(out, "  {:8} | offset: {:6.2}", chord.symbol.to_string(), chord.offset);
        }
        if chords.len() > PREVIEW_CHORDS {
            let _ = writeln!(out, "  ... and {} more chords", chords.len() - PREVIEW_CHORDS);
        }
    }

    let _ = writeln!(out, "\n{}\nNotes (first {}):\n{}", light, PREVIEW_NOTES, light);
    for (count, element) in score.musical_elements().enumerate() {
        if count >= PREVIEW_NOTES {
            let _ = writeln!(out, "...");
            break;
        }
        let names = match element {
            ScoreElement::Stack(s) => {
                let names: Vec<String> = s.voices.iter().map(|v| pitch_name(v.pitch)).collect();
                format!("[{}]", names.join(", "))
            }
            other => other.pitches().into_iter().map(pitch_name).collect::<Vec<_>>().join(", "),
        };
        let _ = writeln!(
            out,
            "  {:5} | offset: {:6.2} | dur: {:.2}q",
            names,
            element.offset(),
            element.duration()
        );
    }

    let _ = write!(out, "\n{}", heavy);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord_labels::{normalize, ChordPlacement};
    use crate::quantize::{QuantizedChordStack, QuantizedNote, Voice};
    use crate::types::{Clef, KeyEstimate, TimeSignature};

    fn score(notes: usize, chords: usize) -> Score {
        let mut elements: Vec<ScoreElement> = (0..chords)
            .map(|i| {
                ScoreElement::ChordSymbol(ChordPlacement {
                    offset: i as f64 * 4.0,
                    duration: 4.0,
                    symbol: normalize("A:min").unwrap(),
                })
            })
            .collect();
        elements.extend((0..notes).map(|i| {
            ScoreElement::Note(QuantizedNote {
                offset: i as f64,
                duration: 1.0,
                pitch: 60,
                velocity: 80,
            })
        }));
        elements.push(ScoreElement::Stack(QuantizedChordStack {
            offset: notes as f64,
            duration: 2.0,
            voices: vec![Voice { pitch: 64, velocity: 90 }, Voice { pitch: 67, velocity: 70 }],
            velocity: 80,
        }));

        Score {
            title: "Preview".into(),
            composer: "Unknown".into(),
            tempo_bpm: 96.0,
            time_signature: TimeSignature::quarter(4),
            key: KeyEstimate::default(),
            clef: Clef::Treble,
            elements,
        }
    }

    #[test]
    fn shows_header_and_elements() {
        let text = preview(&score(2, 1));
        assert!(text.contains("Tempo: 96 BPM"), "{}", text);
        assert!(text.contains("Key: C major"), "{}", text);
        assert!(text.contains("Time Signature: 4/4"), "{}", text);
        assert!(text.contains("Length: 4.00 beats"), "{}", text);
        assert!(text.contains("Am       | offset:   0.00"), "{}", text);
        assert!(text.contains("C4    | offset:   1.00 | dur: 1.00q"), "{}", text);
        assert!(text.contains("[E4, G4] | offset:   2.00 | dur: 2.00q"), "{}", text);
    }

    #[test]
    fn truncates_long_listings() {
        let text = preview(&score(30, 12));
        assert!(text.contains("... and 2 more chords"), "{}", text);
        assert!(text.contains("\n...\n"), "{}", text);
    }
}
