use note_events::NoteEvent;
use serde::{Deserialize, Serialize};

use crate::chord_labels::PitchName;
use crate::types::{KeyEstimate, KeyMode, PitchClass};
use crate::{Error, Result};

/// Krumhansl-Kessler major key profile (duration-weighted perception studies).
pub const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
pub const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

/// Relative pitch-class energies, index 0 = C.
///
/// Not normalized; only the shape matters to the correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 12]", into = "[f64; 12]")]
pub struct PitchClassProfile([f64; 12]);

impl TryFrom<[f64; 12]> for PitchClassProfile {
    type Error = Error;

    fn try_from(values: [f64; 12]) -> Result<Self> {
        Self::new(values)
    }
}

impl From<PitchClassProfile> for [f64; 12] {
    fn from(profile: PitchClassProfile) -> Self {
        profile.0
    }
}

impl PitchClassProfile {
    pub fn new(values: [f64; 12]) -> Result<Self> {
        for (pc, value) in values.iter().enumerate() {
            if !value.is_finite() || *value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "pitch-class energy {} at index {} must be finite and >= 0",
                    value, pc
                )));
            }
        }
        Ok(Self(values))
    }

    /// Build from a model output of unchecked length.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let values: [f64; 12] = values.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "pitch-class profile must have 12 bins, got {}",
                values.len()
            ))
        })?;
        Self::new(values)
    }

    /// Duration-weighted pitch-class histogram of a note list.
    pub fn from_notes(notes: &[NoteEvent]) -> Self {
        let mut histogram = [0.0_f64; 12];
        for note in notes {
            let duration = note.duration();
            if duration.is_finite() && duration > 0.0 {
                histogram[PitchClass::of_pitch(note.pitch).index() as usize] += duration;
            }
        }
        Self(histogram)
    }

    pub fn values(&self) -> &[f64; 12] {
        &self.0
    }
}

/// Estimate the key of a pitch-class profile using the Krumhansl-Schmuckler algorithm.
///
/// Correlates the profile against all 24 major/minor key profiles. The best
/// Pearson correlation determines the key; ties keep the first candidate in
/// tonic-ascending, major-before-minor order.
pub fn estimate(profile: &PitchClassProfile) -> KeyEstimate {
    let histogram = profile.values();
    let total: f64 = histogram.iter().sum();
    if total == 0.0 {
        return KeyEstimate::default();
    }

    let mut normalized = [0.0_f64; 12];
    for (n, h) in normalized.iter_mut().zip(histogram) {
        *n = h / total;
    }

    // Correlate against all 24 key profiles (12 tonics × 2 modes)
    let mut best_tonic: u8 = 0;
    let mut best_mode = KeyMode::Major;
    let mut best_corr = f64::NEG_INFINITY;

    for tonic in 0..12u8 {
        // Rotate histogram so tonic = index 0
        let mut rotated = [0.0; 12];
        for (i, r) in rotated.iter_mut().enumerate() {
            *r = normalized[(i + tonic as usize) % 12];
        }

        let major_corr = pearson(&rotated, &MAJOR_PROFILE);
        if major_corr > best_corr {
            best_corr = major_corr;
            best_tonic = tonic;
            best_mode = KeyMode::Major;
        }

        let minor_corr = pearson(&rotated, &MINOR_PROFILE);
        if minor_corr > best_corr {
            best_corr = minor_corr;
            best_tonic = tonic;
            best_mode = KeyMode::Minor;
        }
    }

    KeyEstimate {
        tonic: PitchClass::new(best_tonic),
        mode: best_mode,
        confidence: (best_corr * 10000.0).round() / 10000.0,
    }
}

/// Pearson correlation coefficient between two 12-element arrays.
///
/// A constant array has no variance; that case reports 0.0 instead of NaN.
pub fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

/// Parse a key override such as "C major", "A minor", "F#:min", "Ebm" or "Bb".
///
/// The returned estimate carries confidence 1.0.
pub fn parse_key_label(label: &str) -> Result<KeyEstimate> {
    let parse_err = || Error::Parse(format!("key {:?}", label));
    let label = label.trim();

    let (root, mode) = match label.split_once(|c: char| c == ':' || c.is_whitespace()) {
        Some((root, mode)) => (root, parse_mode(mode.trim()).ok_or_else(parse_err)?),
        None => match label.strip_suffix('m') {
            Some(root) if !root.is_empty() => (root, KeyMode::Minor),
            _ => (label, KeyMode::Major),
        },
    };

    let root: PitchName = root.parse().map_err(|_| parse_err())?;

    Ok(KeyEstimate {
        tonic: root.pitch_class(),
        mode,
        confidence: 1.0,
    })
}

fn parse_mode(mode: &str) -> Option<KeyMode> {
    match mode.to_ascii_lowercase().as_str() {
        "" | "maj" | "major" => Some(KeyMode::Major),
        "min" | "minor" | "m" => Some(KeyMode::Minor),
        _ => None,
    }
}

/// Convert a key estimate to an ABC notation key field.
pub fn key_to_abc(key: &KeyEstimate) -> String {
    let mode_suffix = match key.mode {
        KeyMode::Minor => "m",
        KeyMode::Major => "",
    };
    format!("{}{}", key.tonic_name(), mode_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rotate(profile: &[f64; 12], tonic: usize) -> [f64; 12] {
        let mut rotated = [0.0; 12];
        for (i, r) in rotated.iter_mut().enumerate() {
            *r = profile[(i + 12 - tonic) % 12];
        }
        rotated
    }

    #[test]
    fn every_major_rotation_is_an_exact_match() {
        for tonic in 0..12 {
            for scale in [1.0, 0.01, 250.0] {
                let mut values = rotate(&MAJOR_PROFILE, tonic);
                for v in &mut values {
                    *v *= scale;
                }
                let key = estimate(&PitchClassProfile::new(values).unwrap());
                assert_eq!(key.tonic, PitchClass::new(tonic as u8), "tonic {} scale {}", tonic, scale);
                assert_eq!(key.mode, KeyMode::Major);
                assert_eq!(key.confidence, 1.0);
            }
        }
    }

    #[test]
    fn every_minor_rotation_is_an_exact_match() {
        for tonic in 0..12 {
            let key = estimate(&PitchClassProfile::new(rotate(&MINOR_PROFILE, tonic)).unwrap());
            assert_eq!(key.tonic, PitchClass::new(tonic as u8));
            assert_eq!(key.mode, KeyMode::Minor);
            assert_eq!(key.confidence, 1.0);
        }
    }

    #[test]
    fn zero_profile_is_c_major_without_confidence() {
        let key = estimate(&PitchClassProfile::new([0.0; 12]).unwrap());
        assert_eq!(key, KeyEstimate::default());
        assert!(!key.confidence.is_nan());
    }

    #[test]
    fn flat_profile_falls_back_to_first_candidate() {
        let key = estimate(&PitchClassProfile::new([1.0; 12]).unwrap());
        assert_eq!(key.tonic, PitchClass::C);
        assert_eq!(key.mode, KeyMode::Major);
        assert_eq!(key.confidence, 0.0);
    }

    #[test]
    fn profile_shape_is_checked() {
        assert!(matches!(
            PitchClassProfile::from_slice(&[1.0; 11]),
            Err(Error::InvalidInput(_))
        ));
        let mut values = [1.0; 12];
        values[3] = -0.5;
        assert!(PitchClassProfile::new(values).is_err());
        values[3] = f64::NAN;
        assert!(PitchClassProfile::new(values).is_err());
    }

    #[test]
    fn deserialized_profile_is_checked() {
        let err = serde_json::from_str::<PitchClassProfile>("[-3, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0]").unwrap_err();
        assert!(err.to_string().contains("must be finite and >= 0"), "{}", err);
        assert!(serde_json::from_str::<PitchClassProfile>("[1, 2, 3]").is_err());

        let profile: PitchClassProfile = serde_json::from_str(&serde_json::to_string(&MAJOR_PROFILE).unwrap()).unwrap();
        assert_eq!(profile.values(), &MAJOR_PROFILE);
        assert_eq!(serde_json::to_value(profile).unwrap(), serde_json::to_value(MAJOR_PROFILE).unwrap());
    }

    #[test]
    fn c_major_scale_from_notes() {
        let pitches = [60, 62, 64, 65, 67, 69, 71, 72];
        let notes: Vec<_> = pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| NoteEvent::new(p, i as f64 * 0.5, (i + 1) as f64 * 0.5, 80))
            .collect();

        let key = estimate(&PitchClassProfile::from_notes(&notes));
        assert_eq!(key.tonic, PitchClass::C);
        assert_eq!(key.mode, KeyMode::Major);
        assert!(key.confidence > 0.7, "confidence {} should be > 0.7", key.confidence);
    }

    #[test]
    fn pearson_identical_arrays() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let r = pearson(&a, &a);
        assert!((r - 1.0).abs() < 1e-10, "self-correlation should be 1.0, got {}", r);
    }

    #[test]
    fn parses_key_labels() {
        let key = parse_key_label("C major").unwrap();
        assert_eq!((key.tonic.index(), key.mode, key.confidence), (0, KeyMode::Major, 1.0));

        assert_eq!(parse_key_label("A minor").unwrap().name(), "A minor");
        assert_eq!(parse_key_label("F#:min").unwrap().name(), "F# minor");
        assert_eq!(parse_key_label("Ebm").unwrap().name(), "Eb minor");
        assert_eq!(parse_key_label("Bb").unwrap().name(), "Bb major");
        assert_eq!(parse_key_label("B-").unwrap().name(), "Bb major");
        assert_eq!(parse_key_label("G").unwrap().name(), "G major");
    }

    #[test]
    fn rejects_bad_key_labels() {
        assert!(matches!(parse_key_label("H major"), Err(Error::Parse(_))));
        assert!(parse_key_label("C lydian").is_err());
        assert!(parse_key_label("").is_err());
    }

    #[test]
    fn key_to_abc_formatting() {
        let key = parse_key_label("Db minor").unwrap();
        assert_eq!(key_to_abc(&key), "C#m");

        let key = parse_key_label("G").unwrap();
        assert_eq!(key_to_abc(&key), "G");

        let key = parse_key_label("Eb").unwrap();
        assert_eq!(key_to_abc(&key), "Eb");
    }
}
