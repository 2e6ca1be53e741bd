//! Conversion between timed MIDI note events and measure-structured scores.
//!
//! Two independent directions share the duration vocabulary:
//!
//! ```text
//! MIDI bytes → decode → normalize → group chords → build measures → Score
//! Score → emit events → delta times → encode → MIDI bytes
//! ```
//!
//! # Example
//!
//! ```
//! use midiscore::{score_to_midi, midi_to_score, ConvertParams, Score};
//!
//! let score = Score::from_json_str(
//!     r#"[[{"midiNotes": [60, 64], "clef": "treble", "duration": "w", "isRest": false}]]"#,
//! )
//! .unwrap();
//!
//! let params = ConvertParams::default();
//! let bytes = score_to_midi(&score, &params).unwrap();
//! let back = midi_to_score(&bytes, &params).unwrap();
//! assert_eq!(back.measures[0][0].pitches, vec![60, 64]);
//! ```

pub mod chord;
pub mod duration;
pub mod emit;
pub mod measure;
pub mod midi;
pub mod normalize;
pub mod note;
pub mod score;

pub use chord::{group_chords, CHORD_TOLERANCE};
pub use duration::{
    match_symbol, nearest_symbol, split_across_capacity, ticks_for, DurationSymbol, SplitOutcome,
    Tick, TICKS_PER_BEAT,
};
pub use emit::{emit_events, to_delta_times, DeltaEvent, EmittedEvent, DEFAULT_VELOCITY};
pub use measure::{build_measures, MeasureBuilder, TimeSignature};
pub use midi::{DecodedMidi, EncodeOptions};
pub use normalize::{normalize_events, EventKind, RawEvent, TickClock};
pub use note::{Chord, Clef, TimedNote};
pub use score::{Measure, MeasureItem, Score, ScoreSummary};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Errors surfaced to callers. Everything else degrades gracefully and is logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("MIDI write error: {0}")]
    MidiWrite(String),

    #[error("invalid score: {reason}")]
    InvalidScore { reason: String },

    #[error("invalid score JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown duration symbol: {0:?}")]
    UnknownDuration(String),

    #[error("invalid time signature: {0:?}")]
    InvalidTimeSignature(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Knobs shared by both conversion directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertParams {
    /// Note-on velocity for items without their own.
    pub default_velocity: u8,
    /// Onset window, in normalized ticks, for merging notes into a chord.
    pub chord_tolerance: i64,
    /// Used when the MIDI file declares no time signature.
    pub default_time_signature: TimeSignature,
    pub encode: EncodeOptions,
}

impl Default for ConvertParams {
    fn default() -> Self {
        Self {
            default_velocity: DEFAULT_VELOCITY,
            chord_tolerance: CHORD_TOLERANCE,
            default_time_signature: TimeSignature::COMMON,
            encode: EncodeOptions::default(),
        }
    }
}

/// Decode MIDI bytes and lay them out as a score.
pub fn midi_to_score(bytes: &[u8], params: &ConvertParams) -> Result<Score> {
    let decoded = midi::decode(bytes)?;
    let time_signature = decoded
        .time_signature
        .unwrap_or(params.default_time_signature);

    Ok(events_to_score(
        &decoded.events,
        decoded.resolution,
        TickClock::Absolute,
        time_signature,
        params,
    ))
}

/// Lay out raw note events as a score.
pub fn events_to_score(
    events: &[RawEvent],
    resolution: Option<u16>,
    clock: TickClock,
    time_signature: TimeSignature,
    params: &ConvertParams,
) -> Score {
    let notes = normalize_events(events, resolution, clock);
    let chords = group_chords(&notes, Tick::from_integer(params.chord_tolerance));
    let score = build_measures(&chords, time_signature);

    let summary = score.summary();
    info!(
        measures = summary.measures,
        items = summary.items,
        rests = summary.rests,
        tied = summary.tied,
        "converted MIDI to score"
    );

    score
}

/// Emit a score's notes and encode them as a MIDI file.
pub fn score_to_midi(score: &Score, params: &ConvertParams) -> Result<Vec<u8>> {
    let events = emit_events(score, params.default_velocity);
    let deltas = to_delta_times(&events);
    midi::encode(&deltas, &params.encode)
}
