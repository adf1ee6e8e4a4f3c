//! Layered configuration loading for scorewright.
//!
//! Every job gets an explicit [`ScoreConfig`]; nothing in the engine reads
//! process-wide defaults. This crate only decides where those values come
//! from.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/scorewright/config.toml` (system)
//! 2. `~/.config/scorewright/config.toml` (user)
//! 3. `./scorewright.toml` or an explicit path (local override)
//! 4. Environment variables (`SCOREWRIGHT_*`)
//!
//! # Example Config
//!
//! ```toml
//! [quantize]
//! grid_resolution = 0.125
//! max_voices = 3
//!
//! [defaults]
//! tempo_bpm = 96.0
//! time_signature = "3/4"
//! key = "D minor"
//!
//! [export]
//! ticks_per_beat = 960
//!
//! [telemetry]
//! log_level = "score_assembly=debug"
//! ```

pub mod engine;
pub mod loader;
pub mod output;

pub use engine::{DefaultsConfig, QuantizeConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use output::{ExportConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Complete scorewright configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreConfig {
    #[serde(default)]
    pub quantize: QuantizeConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ScoreConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./scorewright.toml`.
    ///
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        loader::load_layered(&files, |name| std::env::var(name).ok())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.quantize;
        if !(q.grid_resolution.is_finite() && q.grid_resolution > 0.0) {
            return Err(ConfigError::Invalid {
                field: "quantize.grid_resolution",
                message: format!("must be > 0, got {}", q.grid_resolution),
            });
        }
        if let Some(min) = q.min_duration {
            if !(min.is_finite() && min > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "quantize.min_duration",
                    message: format!("must be > 0, got {}", min),
                });
            }
        }
        if q.max_voices == 0 {
            return Err(ConfigError::Invalid {
                field: "quantize.max_voices",
                message: "must be at least 1".to_string(),
            });
        }
        if !(self.defaults.tempo_bpm.is_finite() && self.defaults.tempo_bpm > 0.0) {
            return Err(ConfigError::Invalid {
                field: "defaults.tempo_bpm",
                message: format!("must be > 0, got {}", self.defaults.tempo_bpm),
            });
        }
        if self.export.ticks_per_beat == 0 || self.export.ticks_per_beat > 0x7FFF {
            return Err(ConfigError::Invalid {
                field: "export.ticks_per_beat",
                message: format!("must be 1..=32767, got {}", self.export.ticks_per_beat),
            });
        }
        if self.export.channel > 15 {
            return Err(ConfigError::Invalid {
                field: "export.channel",
                message: format!("must be 0..=15, got {}", self.export.channel),
            });
        }
        if self.export.program > 127 {
            return Err(ConfigError::Invalid {
                field: "export.program",
                message: format!("must be 0..=127, got {}", self.export.program),
            });
        }
        Ok(())
    }

    /// Serialize the effective config to a TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_default();
        format!("# scorewright configuration\n\n{}", body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScoreConfig::default();
        config.validate().unwrap();
        assert_eq!(config.quantize.grid_resolution, 0.25);
        assert_eq!(config.quantize.effective_min_duration(), 0.25);
        assert_eq!(config.quantize.max_voices, 4);
        assert_eq!(config.defaults.tempo_bpm, 120.0);
        assert_eq!(config.defaults.title, "Untitled");
    }

    #[test]
    fn zero_voices_rejected() {
        let mut config = ScoreConfig::default();
        config.quantize.max_voices = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quantize.max_voices"));
    }

    #[test]
    fn negative_grid_rejected() {
        let mut config = ScoreConfig::default();
        config.quantize.grid_resolution = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_roundtrips() {
        let mut config = ScoreConfig::default();
        config.quantize.min_duration = Some(0.5);
        config.defaults.key = "A minor".to_string();

        let rendered = config.to_toml();
        assert!(rendered.starts_with("# scorewright configuration"));

        let parsed: ScoreConfig = toml::from_str(&rendered).unwrap();
        pretty_assertions::assert_eq!(parsed, config);
    }
}
