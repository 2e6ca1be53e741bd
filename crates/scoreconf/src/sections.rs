//! Config sections and their compiled defaults.

use serde::{Deserialize, Serialize};

/// Knobs for the MIDI → score direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Note-on velocity for score items without one.
    /// Default: 80
    #[serde(default = "ConvertConfig::default_velocity")]
    pub default_velocity: u8,

    /// Onset window, in ticks at 480 per quarter, for merging notes into chords.
    /// Default: 20
    #[serde(default = "ConvertConfig::default_chord_tolerance")]
    pub chord_tolerance: i64,

    /// Used when a MIDI file has no time signature, written as "n/d".
    /// Default: "4/4"
    #[serde(default = "ConvertConfig::default_time_signature")]
    pub time_signature: String,
}

impl ConvertConfig {
    fn default_velocity() -> u8 {
        80
    }

    fn default_chord_tolerance() -> i64 {
        20
    }

    fn default_time_signature() -> String {
        "4/4".to_string()
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            default_velocity: Self::default_velocity(),
            chord_tolerance: Self::default_chord_tolerance(),
            time_signature: Self::default_time_signature(),
        }
    }
}

/// What gets written into generated MIDI files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_track_name")]
    pub track_name: String,

    #[serde(default = "OutputConfig::default_tempo_bpm")]
    pub tempo_bpm: f64,

    /// General MIDI program for both staves.
    #[serde(default)]
    pub program: u8,
}

impl OutputConfig {
    fn default_track_name() -> String {
        "Piano".to_string()
    }

    fn default_tempo_bpm() -> f64 {
        120.0
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            track_name: Self::default_track_name(),
            tempo_bpm: Self::default_tempo_bpm(),
            program: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as "info" or "midiscore=debug".
    #[serde(default = "LoggingConfig::default_log_level")]
    pub log_level: String,
}

impl LoggingConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
