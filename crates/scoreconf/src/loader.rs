//! Config file discovery, layered merging, and environment variable overlay.

use crate::{ConfigError, ScoreConfig};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with an explicit override path.
///
/// If `override_path` is provided and exists, it replaces the local
/// `./scorewright.toml`. Returns paths in load order (system, user,
/// local/override). Only returns files that exist.
pub fn discover_config_files_with_override(override_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/scorewright/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("scorewright/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = override_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("scorewright.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Merge `files` in order, then overlay environment values from `env`.
///
/// `env` is a lookup so tests can inject variables without touching the
/// process environment.
pub fn load_layered<F>(files: &[PathBuf], env: F) -> Result<(ScoreConfig, ConfigSources), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = read_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let mut config: ScoreConfig =
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: files.last().cloned().unwrap_or_default(),
                message: e.to_string(),
            })?;

    apply_env_overrides(&mut config, &mut sources, env)?;
    config.validate()?;

    Ok((config, sources))
}

/// Load and validate a single config file (no env overlay).
pub fn load_from_file(path: &Path) -> Result<ScoreConfig, ConfigError> {
    let (config, _) = load_layered(&[path.to_path_buf()], |_| None)?;
    Ok(config)
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep merge: nested tables merge key by key, anything else in `overlay` replaces `base`.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_env<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field: name,
        message: format!("{:?}: {}", raw, e),
    })
}

/// Apply `SCOREWRIGHT_*` overrides on top of file values.
pub fn apply_env_overrides<F>(
    config: &mut ScoreConfig,
    sources: &mut ConfigSources,
    env: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const GRID: &str = "SCOREWRIGHT_GRID_RESOLUTION";
    const MIN_DURATION: &str = "SCOREWRIGHT_MIN_DURATION";
    const MAX_VOICES: &str = "SCOREWRIGHT_MAX_VOICES";
    const TEMPO: &str = "SCOREWRIGHT_DEFAULT_TEMPO";
    const TIME_SIG: &str = "SCOREWRIGHT_DEFAULT_TIME_SIGNATURE";
    const KEY: &str = "SCOREWRIGHT_DEFAULT_KEY";
    const TICKS: &str = "SCOREWRIGHT_TICKS_PER_BEAT";
    const LOG_LEVEL: &str = "SCOREWRIGHT_LOG_LEVEL";

    if let Some(v) = env(GRID) {
        config.quantize.grid_resolution = parse_env(GRID, &v)?;
        sources.env_overrides.push(GRID.to_string());
    }
    if let Some(v) = env(MIN_DURATION) {
        config.quantize.min_duration = Some(parse_env(MIN_DURATION, &v)?);
        sources.env_overrides.push(MIN_DURATION.to_string());
    }
    if let Some(v) = env(MAX_VOICES) {
        config.quantize.max_voices = parse_env(MAX_VOICES, &v)?;
        sources.env_overrides.push(MAX_VOICES.to_string());
    }
    if let Some(v) = env(TEMPO) {
        config.defaults.tempo_bpm = parse_env(TEMPO, &v)?;
        sources.env_overrides.push(TEMPO.to_string());
    }
    if let Some(v) = env(TIME_SIG) {
        config.defaults.time_signature = v;
        sources.env_overrides.push(TIME_SIG.to_string());
    }
    if let Some(v) = env(KEY) {
        config.defaults.key = v;
        sources.env_overrides.push(KEY.to_string());
    }
    if let Some(v) = env(TICKS) {
        config.export.ticks_per_beat = parse_env(TICKS, &v)?;
        sources.env_overrides.push(TICKS.to_string());
    }
    if let Some(v) = env(LOG_LEVEL) {
        config.telemetry.log_level = v;
        sources.env_overrides.push(LOG_LEVEL.to_string());
    }

    Ok(())
}
