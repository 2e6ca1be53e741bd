//! Config file discovery, layering, and environment variable overlay.

use crate::{ConfigError, ScoreConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns existing paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/midiscore/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midiscore/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("midiscore.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and layer its keys over `config`.
pub fn overlay_file(config: &mut ScoreConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    overlay_toml(config, &contents, path)
}

/// Layer the keys present in `contents` over `config`; absent keys keep their value.
fn overlay_toml(config: &mut ScoreConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let bad_value = |key: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{key} must be {expected}"),
    };

    if let Some(convert) = table.get("convert").and_then(|v| v.as_table()) {
        if let Some(v) = convert.get("default_velocity") {
            config.convert.default_velocity = v
                .as_integer()
                .and_then(|n| u8::try_from(n).ok())
                .filter(|n| *n <= 127)
                .ok_or_else(|| bad_value("convert.default_velocity", "an integer in 0..=127"))?;
        }
        if let Some(v) = convert.get("chord_tolerance") {
            config.convert.chord_tolerance = v
                .as_integer()
                .filter(|n| *n >= 0)
                .ok_or_else(|| bad_value("convert.chord_tolerance", "a non-negative integer"))?;
        }
        if let Some(v) = convert.get("time_signature") {
            config.convert.time_signature = v
                .as_str()
                .ok_or_else(|| bad_value("convert.time_signature", "a string like \"3/4\""))?
                .to_string();
        }
    }

    if let Some(output) = table.get("output").and_then(|v| v.as_table()) {
        if let Some(v) = output.get("track_name") {
            config.output.track_name = v
                .as_str()
                .ok_or_else(|| bad_value("output.track_name", "a string"))?
                .to_string();
        }
        if let Some(v) = output.get("tempo_bpm") {
            // integers are accepted for convenience: tempo_bpm = 90
            config.output.tempo_bpm = v
                .as_float()
                .or_else(|| v.as_integer().map(|n| n as f64))
                .filter(|bpm| *bpm > 0.0)
                .ok_or_else(|| bad_value("output.tempo_bpm", "a positive number"))?;
        }
        if let Some(v) = output.get("program") {
            config.output.program = v
                .as_integer()
                .and_then(|n| u8::try_from(n).ok())
                .filter(|n| *n <= 127)
                .ok_or_else(|| bad_value("output.program", "an integer in 0..=127"))?;
        }
    }

    if let Some(logging) = table.get("logging").and_then(|v| v.as_table()) {
        if let Some(v) = logging.get("log_level").and_then(|v| v.as_str()) {
            config.logging.log_level = v.to_string();
        }
    }

    Ok(())
}

/// Apply `MIDISCORE_*` and `RUST_LOG` overrides from the process environment.
pub fn apply_env_overrides(config: &mut ScoreConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any variable lookup. Unparseable values are ignored.
pub fn apply_overrides_from(
    config: &mut ScoreConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("MIDISCORE_DEFAULT_VELOCITY") {
        if let Ok(velocity) = v.parse::<u8>() {
            if velocity <= 127 {
                config.convert.default_velocity = velocity;
                sources.env_overrides.push("MIDISCORE_DEFAULT_VELOCITY".to_string());
            }
        }
    }
    if let Some(v) = lookup("MIDISCORE_CHORD_TOLERANCE") {
        if let Ok(tolerance) = v.parse::<i64>() {
            if tolerance >= 0 {
                config.convert.chord_tolerance = tolerance;
                sources.env_overrides.push("MIDISCORE_CHORD_TOLERANCE".to_string());
            }
        }
    }
    if let Some(v) = lookup("MIDISCORE_TIME_SIGNATURE") {
        config.convert.time_signature = v;
        sources.env_overrides.push("MIDISCORE_TIME_SIGNATURE".to_string());
    }

    if let Some(v) = lookup("MIDISCORE_TRACK_NAME") {
        config.output.track_name = v;
        sources.env_overrides.push("MIDISCORE_TRACK_NAME".to_string());
    }
    if let Some(v) = lookup("MIDISCORE_TEMPO_BPM") {
        if let Ok(bpm) = v.parse::<f64>() {
            if bpm > 0.0 {
                config.output.tempo_bpm = bpm;
                sources.env_overrides.push("MIDISCORE_TEMPO_BPM".to_string());
            }
        }
    }
    if let Some(v) = lookup("MIDISCORE_PROGRAM") {
        if let Ok(program) = v.parse::<u8>() {
            if program <= 127 {
                config.output.program = program;
                sources.env_overrides.push("MIDISCORE_PROGRAM".to_string());
            }
        }
    }

    if let Some(v) = lookup("MIDISCORE_LOG_LEVEL") {
        config.logging.log_level = v;
        sources.env_overrides.push("MIDISCORE_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything
    if let Some(v) = lookup("RUST_LOG") {
        config.logging.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(config: &mut ScoreConfig, toml: &str) -> Result<(), ConfigError> {
        overlay_toml(config, toml, Path::new("test.toml"))
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files_with_override(None);
    }

    #[test]
    fn test_missing_cli_path_is_skipped() {
        let files = discover_config_files_with_override(Some(Path::new("/nonexistent/midiscore.toml")));
        assert!(!files.iter().any(|p| p.starts_with("/nonexistent")));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let mut config = ScoreConfig::default();
        overlay(&mut config, "[convert]\ntime_signature = \"6/8\"\n").unwrap();

        assert_eq!(config.convert.time_signature, "6/8");
        // Other values should be defaults
        assert_eq!(config.convert.default_velocity, 80);
        assert_eq!(config.output.track_name, "Piano");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[convert]
default_velocity = 96
chord_tolerance = 30
time_signature = "3/4"

[output]
track_name = "Upright"
tempo_bpm = 90
program = 1

[logging]
log_level = "midiscore=debug"
"#;
        let mut config = ScoreConfig::default();
        overlay(&mut config, toml).unwrap();

        assert_eq!(config.convert.default_velocity, 96);
        assert_eq!(config.convert.chord_tolerance, 30);
        assert_eq!(config.convert.time_signature, "3/4");
        assert_eq!(config.output.track_name, "Upright");
        assert_eq!(config.output.tempo_bpm, 90.0);
        assert_eq!(config.output.program, 1);
        assert_eq!(config.logging.log_level, "midiscore=debug");
    }

    #[test]
    fn test_layers_keep_earlier_values() {
        let mut config = ScoreConfig::default();
        overlay(&mut config, "[output]\ntempo_bpm = 60.0\n").unwrap();
        overlay(&mut config, "[output]\nprogram = 4\n").unwrap();

        assert_eq!(config.output.tempo_bpm, 60.0);
        assert_eq!(config.output.program, 4);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = ScoreConfig::default();
        let err = overlay(&mut config, "[convert]\ndefault_velocity = 200\n").unwrap_err();
        assert!(err.to_string().contains("convert.default_velocity"));

        let err = overlay(&mut config, "[output]\ntempo_bpm = \"fast\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overlay_file_missing() {
        let mut config = ScoreConfig::default();
        let err = overlay_file(&mut config, Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MIDISCORE_CHORD_TOLERANCE", "5"),
            ("MIDISCORE_TEMPO_BPM", "not-a-number"),
            ("MIDISCORE_TRACK_NAME", "Keys"),
            ("MIDISCORE_LOG_LEVEL", "warn"),
            ("RUST_LOG", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = ScoreConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |key| {
            vars.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.convert.chord_tolerance, 5);
        assert_eq!(config.output.tempo_bpm, 120.0);
        assert_eq!(config.output.track_name, "Keys");
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(
            sources.env_overrides,
            vec![
                "MIDISCORE_CHORD_TOLERANCE",
                "MIDISCORE_TRACK_NAME",
                "MIDISCORE_LOG_LEVEL",
                "RUST_LOG"
            ]
        );
    }
}
