//! Engine configuration - values that shape the assembled score.

use serde::{Deserialize, Serialize};

/// Note quantization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizeConfig {
    /// Grid step in fractional beats.
    /// Default: 0.25 (sixteenth notes in quarter-note beats)
    #[serde(default = "QuantizeConfig::default_grid_resolution")]
    pub grid_resolution: f64,

    /// Shortest notated duration in beats. `None` means one grid step.
    #[serde(default)]
    pub min_duration: Option<f64>,

    /// Maximum simultaneous pitches kept per onset.
    /// Default: 4
    #[serde(default = "QuantizeConfig::default_max_voices")]
    pub max_voices: usize,
}

impl QuantizeConfig {
    fn default_grid_resolution() -> f64 {
        0.25
    }

    fn default_max_voices() -> usize {
        4
    }

    /// Minimum duration with the grid fallback applied.
    pub fn effective_min_duration(&self) -> f64 {
        self.min_duration.unwrap_or(self.grid_resolution)
    }
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            grid_resolution: Self::default_grid_resolution(),
            min_duration: None,
            max_voices: Self::default_max_voices(),
        }
    }
}

/// Fallbacks used when neither an override nor an estimate is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "DefaultsConfig::default_tempo_bpm")]
    pub tempo_bpm: f64,

    /// Written as "N/D", e.g. "3/4".
    #[serde(default = "DefaultsConfig::default_time_signature")]
    pub time_signature: String,

    /// Written as "C major", "A minor", "F#m", ...
    #[serde(default = "DefaultsConfig::default_key")]
    pub key: String,

    #[serde(default = "DefaultsConfig::default_title")]
    pub title: String,

    #[serde(default = "DefaultsConfig::default_composer")]
    pub composer: String,
}

impl DefaultsConfig {
    fn default_tempo_bpm() -> f64 {
        120.0
    }

    fn default_time_signature() -> String {
        "4/4".to_string()
    }

    fn default_key() -> String {
        "C major".to_string()
    }

    fn default_title() -> String {
        "Untitled".to_string()
    }

    fn default_composer() -> String {
        "Unknown".to_string()
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: Self::default_tempo_bpm(),
            time_signature: Self::default_time_signature(),
            key: Self::default_key(),
            title: Self::default_title(),
            composer: Self::default_composer(),
        }
    }
}
