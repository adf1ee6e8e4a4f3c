//! Score output: Standard MIDI, ABC text, JSON and a plain-text preview.

pub mod abc;
pub mod midi;
pub mod preview;

pub use abc::to_abc;
pub use midi::to_midi;
pub use preview::preview;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use scoreconf::ExportConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::job::Overrides;
use crate::score::Score;
use crate::ScoreEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Midi,
    Abc,
    Json,
    Text,
}

impl ExportFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mid" | "midi" => Some(ExportFormat::Midi),
            "abc" => Some(ExportFormat::Abc),
            "json" => Some(ExportFormat::Json),
            "txt" => Some(ExportFormat::Text),
            _ => None,
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "midi" | "mid" => Ok(ExportFormat::Midi),
            "abc" => Ok(ExportFormat::Abc),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(crate::Error::Parse(format!("export format {:?}", s))),
        }
    }
}

/// What an exporter was handed: an assembled score or a file holding one.
#[derive(Debug, Clone)]
pub enum ScoreSource {
    InMemory(Score),
    /// A `.json` score or a Standard MIDI File
    Path(PathBuf),
}

impl ScoreSource {
    /// Resolve to a score. MIDI files go through the engine with no overrides.
    pub fn resolve(self, engine: &ScoreEngine) -> Result<Score> {
        match self {
            ScoreSource::InMemory(score) => Ok(score),
            ScoreSource::Path(path) => {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("reading score source: {}", path.display()))?;

                if ExportFormat::from_path(&path) == Some(ExportFormat::Json) {
                    return serde_json::from_slice(&bytes)
                        .with_context(|| format!("parsing score JSON: {}", path.display()));
                }

                let transcription = engine
                    .from_midi(&bytes, Overrides::default())
                    .with_context(|| format!("assembling score from MIDI: {}", path.display()))?;
                Ok(transcription.score)
            }
        }
    }
}

impl From<Score> for ScoreSource {
    fn from(score: Score) -> Self {
        ScoreSource::InMemory(score)
    }
}

impl From<PathBuf> for ScoreSource {
    fn from(path: PathBuf) -> Self {
        ScoreSource::Path(path)
    }
}

/// The renderer contract as pretty-printed JSON.
pub fn to_json(score: &Score) -> Result<String> {
    serde_json::to_string_pretty(score).context("serializing score")
}

/// Render a score in `format` and write it to `path`.
pub fn export(score: &Score, format: ExportFormat, path: &Path, options: &ExportConfig) -> Result<()> {
    let bytes = match format {
        ExportFormat::Midi => to_midi(score, options)?,
        ExportFormat::Abc => to_abc(score).into_bytes(),
        ExportFormat::Json => to_json(score)?.into_bytes(),
        ExportFormat::Text => preview(score).into_bytes(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            bail!("output directory does not exist: {}", parent.display());
        }
    }

    std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), ?format, bytes = bytes.len(), "exported score");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out/song.MID")), Some(ExportFormat::Midi));
        assert_eq!(ExportFormat::from_path(Path::new("song.abc")), Some(ExportFormat::Abc));
        assert_eq!(ExportFormat::from_path(Path::new("song.pdf")), None);
        assert_eq!(ExportFormat::from_path(Path::new("song")), None);
    }

    #[test]
    fn formats_from_name() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("musicxml".parse::<ExportFormat>().is_err());
    }
}
