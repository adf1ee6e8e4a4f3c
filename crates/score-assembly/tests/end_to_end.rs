//! Full jobs through the engine: features in, assembled score out.

use note_events::NoteEvent;
use pretty_assertions::assert_eq;
use score_assembly::export::to_abc;
use score_assembly::key::MAJOR_PROFILE;
use score_assembly::measures::beats_from_positions;
use score_assembly::{
    AudioFeatures, Clef, KeyMode, Overrides, PitchClassProfile, QuantizedElement, RawChord, ScoreElement,
    ScoreEngine, TimeSignature, TranscriptionJob, ValueSource,
};
use scoreconf::ScoreConfig;

fn engine() -> ScoreEngine {
    ScoreEngine::new(ScoreConfig::default()).expect("default config is valid")
}

/// Three-beat bars at 120 BPM, starting with one pickup beat.
fn waltz_beats(bars: usize) -> AudioFeatures {
    let mut positions = vec![(0.0, 3)];
    for i in 0..bars * 3 {
        positions.push((0.5 + i as f64 * 0.5, (i % 3 + 1) as u32));
    }

    let mut g_major = [0.0; 12];
    for (i, v) in g_major.iter_mut().enumerate() {
        *v = MAJOR_PROFILE[(i + 12 - 7) % 12];
    }

    AudioFeatures {
        tempo_bpm: Some(120.0),
        pitch_profile: Some(PitchClassProfile::new(g_major).unwrap()),
        beats: beats_from_positions(&positions),
        chords: vec![
            RawChord::new(0.0, 0.5, "N"),
            RawChord::new(0.5, 2.0, "G:maj"),
            RawChord::new(2.0, 3.5, "D:7"),
        ],
    }
}

#[test]
fn two_note_chord_at_120_bpm() {
    let notes = vec![
        NoteEvent::with_unit_velocity(60, 0.0, 0.5, 1.0),
        NoteEvent::with_unit_velocity(64, 0.0, 0.5, 0.8),
    ];
    let job = TranscriptionJob::new(notes, 0.5).with_features(AudioFeatures {
        tempo_bpm: Some(120.0),
        ..Default::default()
    });

    let score = engine().transcribe(&job).unwrap().score;
    assert_eq!(score.elements.len(), 1);

    let ScoreElement::Stack(stack) = &score.elements[0] else {
        panic!("expected one stack, got {:?}", score.elements);
    };
    assert_eq!(stack.offset, 0.0);
    assert_eq!(stack.duration, 1.0);
    assert_eq!(stack.pitches(), vec![60, 64]);
    assert_eq!(stack.velocity, 114);
}

#[test]
fn waltz_with_chords_and_pickup() {
    let notes = vec![
        NoteEvent::new(62, 0.0, 0.5, 70),
        NoteEvent::new(67, 0.5, 1.0, 90),
        NoteEvent::new(71, 0.5, 1.0, 80),
        NoteEvent::new(74, 1.0, 2.0, 85),
        NoteEvent::new(66, 2.0, 3.5, 75),
    ];
    let job = TranscriptionJob::new(notes, 3.5).with_features(waltz_beats(2));

    let transcription = engine().transcribe(&job).unwrap();
    let score = &transcription.score;

    assert_eq!(score.time_signature, TimeSignature::quarter(3));
    assert_eq!(score.key.tonic.index(), 7);
    assert_eq!(score.key.mode, KeyMode::Major);
    assert_eq!(score.key.confidence, 1.0);
    assert_eq!(score.clef, Clef::Treble);
    assert_eq!(transcription.sources.key, ValueSource::Estimated);
    assert_eq!(transcription.sources.time_signature, ValueSource::Estimated);

    // Pickup plus two full bars
    let counts: Vec<usize> = transcription.measures.iter().map(|m| m.beat_count()).collect();
    assert_eq!(counts, vec![1, 3, 3]);

    let timeline: Vec<(f64, String)> = score
        .elements
        .iter()
        .map(|e| {
            let label = match e {
                ScoreElement::ChordSymbol(c) => c.symbol.to_string(),
                other => format!("{:?}", other.pitches()),
            };
            (e.offset(), label)
        })
        .collect();
    assert_eq!(
        timeline,
        vec![
            (0.0, "[62]".to_string()),
            (1.0, "G".to_string()),
            (1.0, "[67, 71]".to_string()),
            (2.0, "[74]".to_string()),
            (4.0, "D7".to_string()),
            (4.0, "[66]".to_string()),
        ]
    );

    assert_eq!(transcription.stats.note_count, 5);
}

#[test]
fn overlapping_chords_are_dropped_not_fatal() {
    let mut features = waltz_beats(1);
    features.chords = vec![
        RawChord::new(0.0, 2.0, "C:maj"),
        RawChord::new(1.0, 3.0, "G:maj"),
    ];
    let job = TranscriptionJob::new(vec![NoteEvent::new(60, 0.0, 1.0, 80)], 3.0).with_features(features);

    let score = engine().transcribe(&job).unwrap().score;
    assert_eq!(score.chord_symbols().count(), 0);
    assert_eq!(score.elements.len(), 1);
}

#[test]
fn unordered_beats_fall_back_to_default_meter() {
    let mut features = waltz_beats(1);
    features.beats.reverse();
    let job = TranscriptionJob::new(vec![NoteEvent::new(60, 0.0, 1.0, 80)], 3.0).with_features(features);

    let transcription = engine().transcribe(&job).unwrap();
    assert!(transcription.measures.is_empty());
    assert_eq!(transcription.score.time_signature, TimeSignature::quarter(4));
    assert_eq!(transcription.sources.time_signature, ValueSource::Default);
}

#[test]
fn low_notes_get_bass_clef() {
    let notes: Vec<NoteEvent> = [40, 43, 47, 50]
        .iter()
        .enumerate()
        .map(|(i, &p)| NoteEvent::new(p, i as f64 * 0.5, (i + 1) as f64 * 0.5, 80))
        .collect();

    let score = engine().transcribe(&TranscriptionJob::new(notes, 2.0)).unwrap().score;
    assert_eq!(score.clef, Clef::Bass);
}

#[test]
fn quantized_elements_convert_into_score_elements() {
    let notes = vec![NoteEvent::new(60, 0.0, 0.5, 80)];
    let params = score_assembly::QuantizeParams::new(120.0);
    let elements = score_assembly::quantize::quantize(&notes, &params).unwrap();

    assert!(matches!(elements[0], QuantizedElement::Note(_)));
    assert!(matches!(ScoreElement::from(elements[0].clone()), ScoreElement::Note(_)));
}

#[test]
fn job_with_negative_profile_energy_is_rejected() {
    let json = r#"{
        "notes": [],
        "duration": 1.0,
        "features": {
            "tempo_bpm": 120.0,
            "pitch_profile": [-3.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            "beats": [],
            "chords": []
        },
        "overrides": {}
    }"#;

    let err = serde_json::from_str::<TranscriptionJob>(json).unwrap_err();
    assert!(err.to_string().contains("pitch-class energy"), "{}", err);
}

#[test]
fn held_note_is_tied_across_the_bar_line() {
    let job = TranscriptionJob::new(vec![NoteEvent::new(60, 1.5, 2.5, 80)], 2.5)
        .with_features(AudioFeatures {
            tempo_bpm: Some(120.0),
            ..Default::default()
        })
        .with_overrides(Overrides::default().with_key("C major").unwrap());

    let score = engine().transcribe(&job).unwrap().score;
    let abc = to_abc(&score);
    assert_eq!(abc.lines().last(), Some("z3 C- | C z3 |]"));
}
