//! Standard MIDI File container adapter built on `midly`.
//!
//! Decoding flattens every track into [`RawEvent`]s with absolute ticks;
//! encoding writes a single-track format 1 file at the normalized resolution.

use crate::duration::TICKS_PER_BEAT;
use crate::emit::DeltaEvent;
use crate::measure::TimeSignature;
use crate::normalize::{EventKind, RawEvent};
use crate::{Error, Result};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Largest delta a track event can carry.
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Note events and timing metadata pulled from a MIDI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMidi {
    /// Note events from every track, absolute ticks at the source resolution.
    pub events: Vec<RawEvent>,
    /// Ticks per beat; `None` for timecode-based files.
    pub resolution: Option<u16>,
    /// Last time signature seen in file order.
    pub time_signature: Option<TimeSignature>,
    pub track_count: usize,
}

/// Parse SMF bytes.
pub fn decode(bytes: &[u8]) -> Result<DecodedMidi> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let resolution = match smf.header.timing {
        Timing::Metrical(ticks) => Some(ticks.as_int()),
        Timing::Timecode(_, _) => {
            warn!("timecode-based MIDI file, treating ticks as normalized");
            None
        }
    };

    let mut events = Vec::new();
    let mut time_signature = None;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick: u64 = 0;

        for event in track {
            tick += u64::from(event.delta.as_int());

            match event.kind {
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_pow, _, _)) => {
                    let parsed = 1u8
                        .checked_shl(u32::from(denominator_pow))
                        .and_then(|denominator| TimeSignature::new(numerator, denominator));
                    match parsed {
                        Some(signature) => {
                            info!(time_signature = %signature, tick, "time signature");
                            time_signature = Some(signature);
                        }
                        None => warn!(
                            numerator,
                            denominator_pow, "ignoring unusable time signature"
                        ),
                    }
                }
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } => {
                        events.push(RawEvent::note_on(key.as_int(), vel.as_int(), tick, track_index));
                    }
                    MidiMessage::NoteOff { key, vel } => events.push(RawEvent {
                        kind: EventKind::NoteOff,
                        pitch: key.as_int(),
                        velocity: vel.as_int(),
                        tick,
                        track_index,
                    }),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    info!(
        tracks = smf.tracks.len(),
        events = events.len(),
        resolution = ?resolution,
        "decoded MIDI file"
    );

    Ok(DecodedMidi {
        events,
        resolution,
        time_signature,
        track_count: smf.tracks.len(),
    })
}

/// Options for writing a MIDI file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub track_name: String,
    pub tempo_bpm: f64,
    /// General MIDI program set on both staff channels.
    pub program: u8,
    /// Written as a meta event when present.
    pub time_signature: Option<TimeSignature>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            track_name: "Piano".to_string(),
            tempo_bpm: 120.0,
            program: 0,
            time_signature: None,
        }
    }
}

impl EncodeOptions {
    /// Microseconds per quarter note; falls back to 120 BPM for unusable tempos.
    pub fn microseconds_per_beat(&self) -> u32 {
        if self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0 {
            (60_000_000.0 / self.tempo_bpm).round().clamp(1.0, 16_777_215.0) as u32
        } else {
            warn!(tempo_bpm = self.tempo_bpm, "unusable tempo, using 120 BPM");
            500_000
        }
    }
}

/// Write delta-timed note events as a single-track format 1 SMF.
pub fn encode(events: &[DeltaEvent], options: &EncodeOptions) -> Result<Vec<u8>> {
    let mut track: Track = Vec::with_capacity(events.len() + 6);

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(options.track_name.as_bytes())),
    });
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(options.microseconds_per_beat().into())),
    });

    if let Some(signature) = options.time_signature {
        if signature.denominator.is_power_of_two() {
            track.push(TrackEvent {
                delta: 0.into(),
                kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                    signature.numerator,
                    signature.denominator.trailing_zeros() as u8,
                    24,
                    8,
                )),
            });
        } else {
            warn!(time_signature = %signature, "denominator is not a power of two, not written");
        }
    }

    for channel in [0u8, 1] {
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::ProgramChange {
                    program: options.program.min(127).into(),
                },
            },
        });
    }

    for event in events {
        if event.delta > MAX_DELTA {
            debug!(delta = event.delta, "clamping oversized delta");
        }
        let key = event.pitch.min(127).into();
        let vel = event.velocity.min(127).into();
        let message = match event.kind {
            EventKind::NoteOn => MidiMessage::NoteOn { key, vel },
            EventKind::NoteOff => MidiMessage::NoteOff { key, vel },
        };

        track.push(TrackEvent {
            delta: (event.delta.min(MAX_DELTA) as u32).into(),
            kind: TrackEventKind::Midi {
                channel: event.channel.min(15).into(),
                message,
            },
        });
    }

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical((TICKS_PER_BEAT as u16).into()),
        },
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| Error::MidiWrite(e.to_string()))?;

    info!(bytes = bytes.len(), notes = events.len(), "encoded MIDI file");
    Ok(bytes)
}
