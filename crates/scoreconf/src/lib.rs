//! Layered configuration for the midiscore converter.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/midiscore/config.toml` (system)
//! 2. `~/.config/midiscore/config.toml` (user)
//! 3. `./midiscore.toml`, or the path passed with `--config`
//! 4. Environment variables (`MIDISCORE_*`, `RUST_LOG`)
//!
//! A file only needs the keys it changes; everything else keeps the value
//! from the previous layer.
//!
//! # Example Config
//!
//! ```toml
//! [convert]
//! default_velocity = 80
//! chord_tolerance = 20
//! time_signature = "3/4"
//!
//! [output]
//! track_name = "Piano"
//! tempo_bpm = 96.0
//! program = 0
//!
//! [logging]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{ConvertConfig, LoggingConfig, OutputConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
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
}

/// Effective converter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreConfig {
    #[serde(default)]
    pub convert: ConvertConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScoreConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Like [`ScoreConfig::load`], with `config_path` replacing `./midiscore.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = ScoreConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::overlay_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Render as TOML, loadable back through [`ScoreConfig::load_from`].
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# midiscore configuration\n\n");

        output.push_str("[convert]\n");
        output.push_str(&format!(
            "default_velocity = {}\n",
            self.convert.default_velocity
        ));
        output.push_str(&format!(
            "chord_tolerance = {}\n",
            self.convert.chord_tolerance
        ));
        output.push_str(&format!(
            "time_signature = {}\n",
            toml::Value::from(self.convert.time_signature.as_str())
        ));

        output.push_str("\n[output]\n");
        output.push_str(&format!(
            "track_name = {}\n",
            toml::Value::from(self.output.track_name.as_str())
        ));
        output.push_str(&format!("tempo_bpm = {:?}\n", self.output.tempo_bpm));
        output.push_str(&format!("program = {}\n", self.output.program));

        output.push_str("\n[logging]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            toml::Value::from(self.logging.log_level.as_str())
        ));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScoreConfig::default();
        assert_eq!(config.convert.default_velocity, 80);
        assert_eq!(config.convert.chord_tolerance, 20);
        assert_eq!(config.convert.time_signature, "4/4");
        assert_eq!(config.output.track_name, "Piano");
        assert_eq!(config.output.tempo_bpm, 120.0);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_to_toml() {
        let toml = ScoreConfig::default().to_toml();
        assert!(toml.contains("[convert]"));
        assert!(toml.contains("[output]"));
        assert!(toml.contains("[logging]"));
        assert!(toml.contains("time_signature = \"4/4\""));
        assert!(toml.contains("tempo_bpm = 120.0"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = ScoreConfig::default();
        config.convert.time_signature = "6/8".to_string();
        config.output.track_name = "Left \"hand\"".to_string();
        config.output.tempo_bpm = 72.5;

        let parsed: ScoreConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_with_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[convert]\nchord_tolerance = 35\n").unwrap();

        let (config, sources) = ScoreConfig::load_with_sources_from(Some(&path)).unwrap();
        assert_eq!(config.convert.chord_tolerance, 35);
        assert_eq!(sources.files.last(), Some(&path));
    }

    #[test]
    fn test_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[convert\n").unwrap();

        let err = ScoreConfig::load_from(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
