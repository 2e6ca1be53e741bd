//! Score → flat, time-ordered note events.

use crate::normalize::EventKind;
use crate::score::Score;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Velocity for items that do not carry their own.
pub const DEFAULT_VELOCITY: u8 = 80;

/// Release velocity written on every note-off.
pub const NOTE_OFF_VELOCITY: u8 = 64;

/// A note event on the absolute tick timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    pub tick: u64,
}

/// An [`EmittedEvent`] re-expressed relative to the previous event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub delta: u64,
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
}

/// Walk the score and emit note-on/note-off pairs, stably sorted by tick.
///
/// Rests only advance the cursor; note items without pitches take no time.
/// Pitches outside 0..=127 are skipped.
pub fn emit_events(score: &Score, default_velocity: u8) -> Vec<EmittedEvent> {
    let mut events = Vec::new();
    let mut cursor: u64 = 0;

    for item in score.items() {
        let length = item.duration.ticks() as u64;

        if !item.is_rest && item.pitches.is_empty() {
            debug!(measure = item.measure, "note item without pitches, skipping");
            continue;
        }

        if !item.is_rest {
            let velocity = item.velocity.unwrap_or(default_velocity);
            let channel = item.clef.channel();

            for &pitch in &item.pitches {
                let pitch = match u8::try_from(pitch) {
                    Ok(p) if p <= 127 => p,
                    _ => {
                        debug!(pitch, "skipping out-of-range pitch");
                        continue;
                    }
                };

                events.push(EmittedEvent {
                    kind: EventKind::NoteOn,
                    pitch,
                    velocity,
                    channel,
                    tick: cursor,
                });
                events.push(EmittedEvent {
                    kind: EventKind::NoteOff,
                    pitch,
                    velocity: NOTE_OFF_VELOCITY,
                    channel,
                    tick: cursor + length,
                });
            }
        }

        cursor += length;
    }

    events.sort_by_key(|e| e.tick);
    info!(events = events.len(), end_tick = cursor, "emitted note events");

    events
}

/// Convert sorted absolute ticks to deltas; the first delta is measured from 0.
pub fn to_delta_times(events: &[EmittedEvent]) -> Vec<DeltaEvent> {
    let mut previous = 0u64;

    events
        .iter()
        .map(|event| {
            let delta = event.tick.saturating_sub(previous);
            previous = event.tick;
            DeltaEvent {
                delta,
                kind: event.kind,
                pitch: event.pitch,
                velocity: event.velocity,
                channel: event.channel,
            }
        })
        .collect()
}
