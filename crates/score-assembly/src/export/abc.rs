//! ABC notation text.
//!
//! The unit note length is one beat (`L:1/4`); lengths are written as
//! reduced fractions of it. Elements are cut at the next onset, so each bar
//! reads as one monophonic line of notes, stacks and rests; anything still
//! sounding at the bar line is tied into the next bar. Runs of bars with no
//! onsets are written as one multi-measure rest.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::key::key_to_abc;
use crate::score::{Score, ScoreElement};
use crate::types::{Clef, KeyEstimate, PitchClass};

/// Smallest length step, in beats: 1/48 covers sixteenths and triplets.
const STEPS_PER_BEAT: i64 = 48;

const BARS_PER_LINE: usize = 4;

/// Tolerance when comparing beat positions.
const EPSILON: f64 = 1e-9;

/// Key-signature order of sharps; flats use the reverse.
const SHARP_ORDER: [char; 7] = ['F', 'C', 'G', 'D', 'A', 'E', 'B'];

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Length suffix for a duration in beats: "", "2", "/2", "3/4".
fn length(beats: f64) -> String {
    let steps = ((beats * STEPS_PER_BEAT as f64).round() as i64).max(1);
    let divisor = gcd(steps, STEPS_PER_BEAT);
    let (num, den) = (steps / divisor, STEPS_PER_BEAT / divisor);

    match (num, den) {
        (1, 1) => String::new(),
        (n, 1) => n.to_string(),
        (1, d) => format!("/{}", d),
        (n, d) => format!("{}/{}", n, d),
    }
}

/// Accidentals in force per letter for a key signature.
fn key_accidentals(key: &KeyEstimate) -> HashMap<char, i8> {
    let fifths = key.fifths();
    let mut alters = HashMap::new();
    if fifths > 0 {
        for letter in SHARP_ORDER.iter().take(fifths as usize) {
            alters.insert(*letter, 1);
        }
    } else {
        for letter in SHARP_ORDER.iter().rev().take(fifths.unsigned_abs() as usize) {
            alters.insert(*letter, -1);
        }
    }
    alters
}

/// Accidental state for one bar: the key signature plus anything written so far.
struct BarSpelling<'a> {
    signature: &'a HashMap<char, i8>,
    written: HashMap<(char, i8), i8>,
    flats: bool,
}

impl<'a> BarSpelling<'a> {
    fn new(signature: &'a HashMap<char, i8>, flats: bool) -> Self {
        Self {
            signature,
            written: HashMap::new(),
            flats,
        }
    }

    fn pitch(&mut self, pitch: u8) -> String {
        let pc = PitchClass::of_pitch(pitch);
        let name = if self.flats { pc.flat_name() } else { pc.sharp_name() };
        let mut chars = name.chars();
        let letter = chars.next().unwrap_or('C');
        let alter: i8 = match chars.next() {
            Some('#') => 1,
            Some('b') => -1,
            _ => 0,
        };
        let octave = (pitch / 12) as i8 - 1;

        let in_force = self
            .written
            .get(&(letter, octave))
            .or_else(|| self.signature.get(&letter))
            .copied()
            .unwrap_or(0);

        let mut out = String::new();
        if alter != in_force {
            out.push_str(match alter {
                1 => "^",
                -1 => "_",
                _ => "=",
            });
            self.written.insert((letter, octave), alter);
        }

        if octave >= 5 {
            out.push(letter.to_ascii_lowercase());
            out.extend(std::iter::repeat('\'').take((octave - 5) as usize));
        } else {
            out.push(letter);
            out.extend(std::iter::repeat(',').take((4 - octave) as usize));
        }
        out
    }
}

/// Fill the gap up to `until` with a rest, carrying any pending chord annotation.
fn rest_until(tokens: &mut Vec<String>, annotation: &mut Option<String>, cursor: &mut f64, until: f64) {
    if until - *cursor > EPSILON {
        tokens.push(format!("{}z{}", annotation.take().unwrap_or_default(), length(until - *cursor)));
        *cursor = until;
    }
}

/// A note or stack still sounding at the bar line.
struct Tie {
    pitches: Vec<u8>,
    stack: bool,
    until: f64,
}

fn spell(spelling: &mut BarSpelling<'_>, pitches: &[u8], stack: bool) -> String {
    if !stack {
        return pitches.iter().map(|&p| spelling.pitch(p)).collect();
    }
    let mut sorted = pitches.to_vec();
    sorted.sort_unstable();
    let inner: String = sorted.into_iter().map(|p| spelling.pitch(p)).collect();
    format!("[{}]", inner)
}

/// Multi-measure rest for a run of bars with no onsets.
fn bar_rest(bars: usize) -> String {
    match bars {
        1 => "Z".to_string(),
        n => format!("Z{}", n),
    }
}

/// Render one bar. `tie` carries a held element in from the previous bar and
/// out to the next one.
fn write_bar(
    start: f64,
    elements: &[&ScoreElement],
    bar_length: f64,
    signature: &HashMap<char, i8>,
    flats: bool,
    tie: &mut Option<Tie>,
) -> String {
    let mut spelling = BarSpelling::new(signature, flats);
    let bar_end = start + bar_length;
    let mut cursor = start;
    let mut tokens: Vec<String> = Vec::new();
    let mut annotation: Option<String> = None;

    // Chord symbols on the downbeat label the tied-in note
    let leading = elements
        .iter()
        .take_while(|e| e.is_chord_symbol() && e.offset() <= start + EPSILON)
        .count();
    for element in &elements[..leading] {
        if let ScoreElement::ChordSymbol(c) = element {
            annotation = Some(format!("\"{}\"", c.symbol));
        }
    }
    let elements = &elements[leading..];

    let onsets: Vec<f64> = elements
        .iter()
        .filter(|e| !e.is_chord_symbol())
        .map(|e| e.offset())
        .collect();

    if let Some(held) = tie.take() {
        let until = held.until.min(onsets.first().copied().unwrap_or(bar_end)).min(bar_end);
        if until - cursor > EPSILON {
            let continues = until >= bar_end - EPSILON && held.until > bar_end + EPSILON;
            tokens.push(format!(
                "{}{}{}{}",
                annotation.take().unwrap_or_default(),
                spell(&mut spelling, &held.pitches, held.stack),
                length(until - cursor),
                if continues { "-" } else { "" }
            ));
            cursor = until;
            if continues {
                *tie = Some(held);
            }
        }
    }

    let mut next_onset = onsets.iter().copied().skip(1).chain(std::iter::once(bar_end));

    for element in elements {
        let (pitches, stack) = match element {
            ScoreElement::ChordSymbol(c) => {
                if c.offset > cursor {
                    rest_until(&mut tokens, &mut annotation, &mut cursor, c.offset);
                }
                annotation = Some(format!("\"{}\"", c.symbol));
                continue;
            }
            ScoreElement::Note(n) => (vec![n.pitch], false),
            ScoreElement::Stack(s) => (s.pitches(), true),
        };

        let offset = element.offset().max(cursor);
        rest_until(&mut tokens, &mut annotation, &mut cursor, offset);

        let end = element.offset() + element.duration();
        let until = next_onset.next().unwrap_or(bar_end).min(bar_end);
        let sounding = end.min(until) - offset;
        if sounding <= EPSILON {
            continue;
        }

        let continues = until >= bar_end - EPSILON && end > bar_end + EPSILON;
        tokens.push(format!(
            "{}{}{}{}",
            annotation.take().unwrap_or_default(),
            spell(&mut spelling, &pitches, stack),
            length(sounding),
            if continues { "-" } else { "" }
        ));
        cursor = offset + sounding;
        if continues {
            *tie = Some(Tie { pitches, stack, until: end });
        }
    }

    rest_until(&mut tokens, &mut annotation, &mut cursor, bar_end);
    tokens.join(" ")
}

/// Render a score as an ABC tune.
pub fn to_abc(score: &Score) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "X:1");
    let _ = writeln!(out, "T:{}", score.title);
    let _ = writeln!(out, "C:{}", score.composer);
    let _ = writeln!(out, "M:{}", score.time_signature);
    let _ = writeln!(out, "L:1/4");
    let _ = writeln!(out, "Q:1/4={}", score.tempo_bpm.round() as i64);
    let clef = match score.clef {
        Clef::Bass => " clef=bass",
        Clef::Treble => "",
    };
    let _ = writeln!(out, "K:{}{}", key_to_abc(&score.key), clef);

    let bars = score.bars();
    if bars.is_empty() {
        let _ = writeln!(out, "z{} |]", length(score.time_signature.measure_beats()));
        return out;
    }

    let signature = key_accidentals(&score.key);
    let flats = score.key.prefers_flats();
    let bar_length = score.time_signature.measure_beats();

    let mut rendered: Vec<String> = Vec::new();
    let mut tie: Option<Tie> = None;
    let mut occupied = bars.iter().peekable();
    let mut index = 0usize;

    loop {
        if let Some(bar) = occupied.next_if(|bar| bar.index == index) {
            rendered.push(write_bar(bar.start, &bar.elements, bar_length, &signature, flats, &mut tie));
        } else if tie.is_some() {
            let start = index as f64 * bar_length;
            rendered.push(write_bar(start, &[], bar_length, &signature, flats, &mut tie));
        } else if let Some(next) = occupied.peek() {
            rendered.push(bar_rest(next.index - index));
            index = next.index;
            continue;
        } else {
            break;
        }
        index += 1;
    }

    for (i, bar) in rendered.iter().enumerate() {
        out.push_str(bar);
        if i + 1 == rendered.len() {
            out.push_str(" |]\n");
        } else if (i + 1) % BARS_PER_LINE == 0 {
            out.push_str(" |\n");
        } else {
            out.push_str(" | ");
        }
    }

    out
}
