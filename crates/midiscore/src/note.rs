//! Clefs, closed notes, and chords on the normalized timeline.

use crate::duration::Tick;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Middle C. Pitches below it are notated on the bass staff.
pub const CLEF_SPLIT_PITCH: u8 = 60;

/// Staff assignment for a note or chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    #[default]
    Treble,
    Bass,
}

impl Clef {
    pub fn for_pitch(pitch: u8) -> Self {
        if pitch < CLEF_SPLIT_PITCH {
            Clef::Bass
        } else {
            Clef::Treble
        }
    }

    /// Bass dominates: any member below middle C puts the chord on the bass staff.
    pub fn for_chord(pitches: &[u8]) -> Self {
        if pitches.iter().any(|&p| p < CLEF_SPLIT_PITCH) {
            Clef::Bass
        } else {
            Clef::Treble
        }
    }

    /// MIDI channel used when emitting notes for this staff.
    pub fn channel(self) -> u8 {
        match self {
            Clef::Treble => 0,
            Clef::Bass => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Clef::Treble => "treble",
            Clef::Bass => "bass",
        }
    }
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed note on the normalized timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    pub pitch: u8,
    pub start_tick: Tick,
    pub duration_ticks: Tick,
    pub clef: Clef,
    pub track_index: usize,
}

impl TimedNote {
    pub fn new(pitch: u8, start_tick: Tick, duration_ticks: Tick, track_index: usize) -> Self {
        Self {
            pitch,
            start_tick,
            duration_ticks,
            clef: Clef::for_pitch(pitch),
            track_index,
        }
    }
}

/// Near-simultaneous notes merged into one notated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    /// Member pitches in onset order, never empty.
    pub pitches: Vec<u8>,
    pub clef: Clef,
    pub start_tick: Tick,
    /// Arithmetic mean of the member durations.
    pub duration_ticks: Tick,
}
