//! Merging near-simultaneous notes into chords.

use crate::duration::Tick;
use crate::note::{Chord, Clef, TimedNote};
use tracing::info;

/// Notes starting within this many ticks of a group's first note join it.
pub const CHORD_TOLERANCE: i64 = 20;

/// Sweep time-ordered notes into chords.
///
/// A note joins the open group when its onset is within `tolerance` of the
/// group's first onset. Chord duration is the mean of its members.
pub fn group_chords(notes: &[TimedNote], tolerance: Tick) -> Vec<Chord> {
    let mut chords = Vec::new();
    let mut group: Vec<&TimedNote> = Vec::new();

    for note in notes {
        if let Some(first) = group.first() {
            let gap = if note.start_tick > first.start_tick {
                note.start_tick - first.start_tick
            } else {
                first.start_tick - note.start_tick
            };

            if gap > tolerance {
                chords.push(close_group(&group));
                group.clear();
            }
        }
        group.push(note);
    }

    if !group.is_empty() {
        chords.push(close_group(&group));
    }

    info!(notes = notes.len(), chords = chords.len(), "grouped chords");
    chords
}

fn close_group(group: &[&TimedNote]) -> Chord {
    let mut pitches: Vec<u8> = Vec::with_capacity(group.len());
    for note in group {
        if !pitches.contains(&note.pitch) {
            pitches.push(note.pitch);
        }
    }

    let total = group
        .iter()
        .fold(Tick::from_integer(0), |acc, note| acc + note.duration_ticks);
    let duration_ticks = total / Tick::from_integer(group.len() as i64);

    Chord {
        clef: Clef::for_chord(&pitches),
        pitches,
        start_tick: group[0].start_tick,
        duration_ticks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(n: i64) -> Tick {
        Tick::from_integer(n)
    }

    fn make_notes(layout: &[(i64, i64, u8)]) -> Vec<TimedNote> {
        layout.iter()
            .map(|&(start, dur, pitch)| TimedNote::new(pitch, t(start), t(dur), 0))
            .collect()
    }

    #[test]
    fn empty_input() {
        assert!(group_chords(&[], t(CHORD_TOLERANCE)).is_empty());
    }

    #[test]
    fn simultaneous_notes_merge() {
        let notes = make_notes(&[(0, 480, 60), (0, 480, 64), (5, 480, 67)]);
        let chords = group_chords(&notes, t(CHORD_TOLERANCE));
        assert_eq!(chords.len(), 1);
        assert_eq!(chords[0].pitches, vec![60, 64, 67]);
        assert_eq!(chords[0].start_tick, t(0));
        assert_eq!(chords[0].clef, Clef::Treble);
    }

    #[test]
    fn tolerance_measured_from_first_member() {
        // 15 is within 20 of 0, but 30 is not, even though it is within 20 of 15
        let notes = make_notes(&[(0, 480, 60), (15, 480, 64), (30, 480, 67)]);
        let chords = group_chords(&notes, t(CHORD_TOLERANCE));
        assert_eq!(chords.len(), 2);
        assert_eq!(chords[0].pitches, vec![60, 64]);
        assert_eq!(chords[1].pitches, vec![67]);
        assert_eq!(chords[1].start_tick, t(30));
    }

    #[test]
    fn boundary_is_inclusive() {
        let notes = make_notes(&[(0, 480, 60), (20, 480, 64)]);
        assert_eq!(group_chords(&notes, t(CHORD_TOLERANCE)).len(), 1);
    }

    #[test]
    fn duration_is_mean_not_max() {
        let notes = make_notes(&[(0, 480, 60), (0, 960, 64), (0, 241, 67)]);
        let chords = group_chords(&notes, t(CHORD_TOLERANCE));
        assert_eq!(chords[0].duration_ticks, Tick::new(1681, 3));
    }

    #[test]
    fn bass_member_moves_chord_to_bass() {
        let notes = make_notes(&[(0, 480, 72), (0, 480, 55)]);
        let chords = group_chords(&notes, t(CHORD_TOLERANCE));
        assert_eq!(chords[0].clef, Clef::Bass);
    }

    #[test]
    fn duplicate_pitches_collapse() {
        let mut notes = make_notes(&[(0, 480, 60)]);
        notes.push(TimedNote::new(60, t(0), t(480), 1));
        let chords = group_chords(&notes, t(CHORD_TOLERANCE));
        assert_eq!(chords[0].pitches, vec![60]);
        assert_eq!(chords[0].duration_ticks, t(480));
    }
}
