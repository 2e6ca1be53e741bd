//! Raw note-on/note-off events → closed, rescaled [`TimedNote`]s.

use crate::duration::{Tick, TICKS_PER_BEAT};
use crate::note::TimedNote;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteOn,
    NoteOff,
}

/// A typed, timestamped event as delivered by the MIDI container codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
    /// Absolute or delta tick, depending on the stream's [`TickClock`].
    pub tick: u64,
    pub track_index: usize,
}

impl RawEvent {
    pub fn note_on(pitch: u8, velocity: u8, tick: u64, track_index: usize) -> Self {
        Self {
            kind: EventKind::NoteOn,
            pitch,
            velocity,
            tick,
            track_index,
        }
    }

    pub fn note_off(pitch: u8, tick: u64, track_index: usize) -> Self {
        Self {
            kind: EventKind::NoteOff,
            pitch,
            velocity: 0,
            tick,
            track_index,
        }
    }

    /// Note-on with velocity 0 closes a note like a note-off.
    fn closes_note(&self) -> bool {
        self.kind == EventKind::NoteOff || self.velocity == 0
    }
}

/// How event ticks are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickClock {
    /// Ticks are absolute positions.
    #[default]
    Absolute,
    /// Ticks are deltas from the previous event of the same track, in input order.
    Delta,
}

/// Scale factor from a source resolution to [`TICKS_PER_BEAT`].
/// A missing or zero resolution means the source is already normalized.
pub fn resolution_scale(resolution: Option<u16>) -> Tick {
    match resolution {
        Some(ppq) if ppq > 0 => Tick::new(TICKS_PER_BEAT, i64::from(ppq)),
        _ => Tick::from_integer(1),
    }
}

/// Pair note-ons with their closing events and rescale to the normalized
/// resolution. The result is ordered by start tick.
///
/// Notes still open at the end of the stream get a one-beat duration.
pub fn normalize_events(
    events: &[RawEvent],
    resolution: Option<u16>,
    clock: TickClock,
) -> Vec<TimedNote> {
    let scale = resolution_scale(resolution);

    let mut events: Vec<RawEvent> = match clock {
        TickClock::Absolute => events.to_vec(),
        TickClock::Delta => accumulate_deltas(events),
    };
    events.sort_by_key(|e| e.tick);

    // (pitch, track) → open note-on tick
    let mut open: BTreeMap<(u8, usize), u64> = BTreeMap::new();
    let mut notes = Vec::new();

    for event in &events {
        let key = (event.pitch, event.track_index);

        if event.closes_note() {
            match open.remove(&key) {
                Some(onset) => close_note(&mut notes, key, onset, event.tick, scale),
                None => debug!(
                    pitch = event.pitch,
                    track = event.track_index,
                    tick = event.tick,
                    "note-off without an open note, ignoring"
                ),
            }
        } else if let Some(onset) = open.insert(key, event.tick) {
            debug!(
                pitch = event.pitch,
                track = event.track_index,
                tick = event.tick,
                dropped_onset = onset,
                "note re-triggered while open, replacing previous onset"
            );
        }
    }

    for ((pitch, track_index), onset) in open {
        warn!(
            pitch,
            track = track_index,
            tick = onset,
            "note was turned on but never turned off, using a one-beat duration"
        );
        notes.push(TimedNote::new(
            pitch,
            Tick::from_integer(onset as i64) * scale,
            Tick::from_integer(TICKS_PER_BEAT),
            track_index,
        ));
    }

    notes.sort_by(|a, b| a.start_tick.cmp(&b.start_tick));
    info!(events = events.len(), notes = notes.len(), "normalized note events");

    notes
}

fn close_note(
    notes: &mut Vec<TimedNote>,
    (pitch, track_index): (u8, usize),
    onset: u64,
    offset: u64,
    scale: Tick,
) {
    let length = offset.saturating_sub(onset);
    if length == 0 {
        debug!(pitch, track = track_index, tick = onset, "dropping zero-length note");
        return;
    }

    notes.push(TimedNote::new(
        pitch,
        Tick::from_integer(onset as i64) * scale,
        Tick::from_integer(length as i64) * scale,
        track_index,
    ));
}

/// Turn per-track delta ticks into absolute ticks.
fn accumulate_deltas(events: &[RawEvent]) -> Vec<RawEvent> {
    let mut positions: HashMap<usize, u64> = HashMap::new();

    events
        .iter()
        .map(|event| {
            let position = positions.entry(event.track_index).or_insert(0);
            *position += event.tick;
            RawEvent {
                tick: *position,
                ..event.clone()
            }
        })
        .collect()
}
