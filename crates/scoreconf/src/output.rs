//! Output configuration - export encoding and log filtering.

use serde::{Deserialize, Serialize};

/// Standard MIDI File export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Pulses per quarter note.
    /// Default: 480
    #[serde(default = "ExportConfig::default_ticks_per_beat")]
    pub ticks_per_beat: u16,

    /// MIDI channel 0-15.
    #[serde(default)]
    pub channel: u8,

    /// General MIDI program 0-127 (0 = acoustic grand piano).
    #[serde(default)]
    pub program: u8,
}

impl ExportConfig {
    fn default_ticks_per_beat() -> u16 {
        480
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ticks_per_beat: Self::default_ticks_per_beat(),
            channel: 0,
            program: 0,
        }
    }
}

/// Log filtering for whichever binary embeds the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `tracing` filter directive, e.g. "info" or "score_assembly=debug".
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
