//! Laying chords and rests out into fixed-capacity measures.

use crate::duration::{
    fill_exact, match_symbol, split_across_capacity, DurationSymbol, Tick, TICKS_PER_BEAT,
};
use crate::note::{Chord, Clef};
use crate::score::{Measure, MeasureItem, Score};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Gaps between chords longer than this become rests.
pub const GAP_TOLERANCE: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    /// Returns `None` for a zero numerator or denominator.
    pub fn new(numerator: u8, denominator: u8) -> Option<Self> {
        (numerator > 0 && denominator > 0).then_some(Self {
            numerator,
            denominator,
        })
    }

    /// Measure capacity: `R × numerator × 4 / denominator`.
    pub fn ticks_per_measure(&self) -> Tick {
        Tick::new(
            TICKS_PER_BEAT * i64::from(self.numerator) * 4,
            i64::from(self.denominator),
        )
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || crate::Error::InvalidTimeSignature(s.to_string());
        let (numerator, denominator) = s.trim().split_once('/').ok_or_else(bad)?;
        let numerator = numerator.trim().parse().map_err(|_| bad())?;
        let denominator = denominator.trim().parse().map_err(|_| bad())?;
        TimeSignature::new(numerator, denominator).ok_or_else(bad)
    }
}

/// What a placed item sounds like.
#[derive(Debug, Clone, PartialEq)]
enum Content<'a> {
    Rest(Clef),
    Chord(&'a [u8], Clef),
}

impl Content<'_> {
    fn item(&self, duration: DurationSymbol, measure: usize) -> MeasureItem {
        match self {
            Content::Rest(clef) => MeasureItem::rest(*clef, duration, measure),
            Content::Chord(pitches, clef) => MeasureItem::chord(pitches, *clef, duration, measure),
        }
    }
}

/// Incremental measure layout state.
///
/// Feed chords in onset order with [`MeasureBuilder::push_chord`], then call
/// [`MeasureBuilder::finish`] to pad and flush the last measure.
#[derive(Debug, Clone)]
pub struct MeasureBuilder {
    ticks_per_measure: Tick,
    time_cursor: Tick,
    current: Measure,
    current_ticks: Tick,
    measure_index: usize,
    measures: Vec<Measure>,
}

impl MeasureBuilder {
    pub fn new(time_signature: TimeSignature) -> Self {
        Self {
            ticks_per_measure: time_signature.ticks_per_measure(),
            time_cursor: Tick::from_integer(0),
            current: Vec::new(),
            current_ticks: Tick::from_integer(0),
            measure_index: 0,
            measures: Vec::new(),
        }
    }

    pub fn ticks_per_measure(&self) -> Tick {
        self.ticks_per_measure
    }

    fn remaining(&self) -> Tick {
        self.ticks_per_measure - self.current_ticks
    }

    /// Place a chord, preceded by a rest if it starts after the cursor.
    pub fn push_chord(&mut self, chord: &Chord) {
        let gap = chord.start_tick - self.time_cursor;
        if gap > Tick::from_integer(GAP_TOLERANCE) {
            self.place(Content::Rest(chord.clef), gap);
        }

        self.place(Content::Chord(&chord.pitches, chord.clef), chord.duration_ticks);
        self.time_cursor = chord.start_tick + chord.duration_ticks;
    }

    fn place(&mut self, content: Content<'_>, duration: Tick) {
        let remaining = self.remaining();
        let quantized = match_symbol(duration);
        if !quantized.within_tolerance {
            warn!(
                ticks = %duration,
                symbol = %quantized.symbol,
                "no duration symbol within tolerance, using closest"
            );
        }

        if quantized.symbol.tick_value() <= remaining {
            self.append(content.item(quantized.symbol, self.measure_index));
            return;
        }

        let split = split_across_capacity(duration, remaining, self.ticks_per_measure);
        if !split.is_complete() {
            warn!(
                ticks = %duration,
                unplaced = %split.unplaced,
                "split hit the iteration ceiling, truncating"
            );
        }

        let last = split.symbols.len().saturating_sub(1);
        for (i, symbol) in split.symbols.into_iter().enumerate() {
            if symbol.tick_value() > self.remaining() {
                self.flush();
            }
            let item = content.item(symbol, self.measure_index).with_tie(i < last);
            self.append(item);
        }
    }

    fn append(&mut self, item: MeasureItem) {
        self.current_ticks += item.duration.tick_value();
        self.current.push(item);
    }

    /// Pad the open measure with rests and close it.
    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }

        let clef = self.current.last().map(|item| item.clef).unwrap_or_default();
        for symbol in fill_exact(self.remaining()) {
            self.append(MeasureItem::rest(clef, symbol, self.measure_index));
        }

        self.measures.push(std::mem::take(&mut self.current));
        self.current_ticks = Tick::from_integer(0);
        self.measure_index += 1;
    }

    pub fn finish(mut self) -> Score {
        self.flush();
        Score::new(self.measures)
    }
}

/// Lay out chords into measures under a time signature.
pub fn build_measures(chords: &[Chord], time_signature: TimeSignature) -> Score {
    let mut builder = MeasureBuilder::new(time_signature);
    for chord in chords {
        builder.push_chord(chord);
    }

    let ticks_per_measure = builder.ticks_per_measure();
    let score = builder.finish();

    info!(
        measures = score.measures.len(),
        ticks_per_measure = %ticks_per_measure,
        time_signature = %time_signature,
        "built measures"
    );

    for (index, measure) in score.measures.iter().take(3).enumerate() {
        let filled: i64 = measure.iter().map(MeasureItem::ticks).sum();
        debug!(
            measure = index,
            items = measure.len(),
            "filled {filled}/{ticks_per_measure} ticks"
        );
        for item in measure {
            if item.is_rest {
                debug!("  rest {} measure:{}", item.duration, item.measure);
            } else {
                debug!(
                    "  note {:?} clef:{} duration:{} measure:{}",
                    item.pitches, item.clef, item.duration, item.measure
                );
            }
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(n: i64) -> Tick {
        Tick::from_integer(n)
    }

    fn chord(pitches: &[u8], start: i64, duration: i64) -> Chord {
        Chord {
            pitches: pitches.to_vec(),
            clef: Clef::for_chord(pitches),
            start_tick: t(start),
            duration_ticks: t(duration),
        }
    }

    fn measure_ticks(measure: &Measure) -> i64 {
        measure.iter().map(MeasureItem::ticks).sum()
    }

    #[test]
    fn ticks_per_measure() {
        assert_eq!(TimeSignature::COMMON.ticks_per_measure(), t(1920));
        assert_eq!(TimeSignature::new(3, 4).unwrap().ticks_per_measure(), t(1440));
        assert_eq!(TimeSignature::new(6, 8).unwrap().ticks_per_measure(), t(1440));
        assert_eq!(TimeSignature::new(2, 2).unwrap().ticks_per_measure(), t(1920));
        assert!(TimeSignature::new(0, 4).is_none());
    }

    #[test]
    fn parse_time_signature() {
        assert_eq!("3/4".parse::<TimeSignature>().unwrap(), TimeSignature::new(3, 4).unwrap());
        assert_eq!(" 6 / 8 ".parse::<TimeSignature>().unwrap().to_string(), "6/8");
        assert!("4".parse::<TimeSignature>().is_err());
        assert!("4/0".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn final_remainder_padded_with_several_rests() {
        // 1920 - 720 leaves 1200, which no single symbol covers
        let score = build_measures(&[chord(&[60], 0, 720)], TimeSignature::COMMON);
        let items = &score.measures[0];
        let layout: Vec<(DurationSymbol, bool)> =
            items.iter().map(|i| (i.duration, i.is_rest)).collect();
        assert_eq!(
            layout,
            vec![
                (DurationSymbol::DottedQuarter, false),
                (DurationSymbol::Half, true),
                (DurationSymbol::Eighth, true),
            ]
        );
        assert_eq!(measure_ticks(items), 1920);
        assert!(items[1..].iter().all(|i| i.clef == Clef::Treble && !i.tied));
    }

    #[test]
    fn empty_input_yields_empty_score() {
        assert!(build_measures(&[], TimeSignature::COMMON).is_empty());
    }

    #[test]
    fn whole_note_fills_one_measure() {
        let score = build_measures(&[chord(&[60, 64], 0, 1920)], TimeSignature::COMMON);
        assert_eq!(score.measures.len(), 1);
        assert_eq!(
            score.measures[0],
            vec![MeasureItem::chord(&[60, 64], Clef::Treble, DurationSymbol::Whole, 0)]
        );
    }

    #[test]
    fn gaps_become_rests_and_measure_is_padded() {
        let score = build_measures(
            &[chord(&[60], 0, 480), chord(&[62], 960, 480)],
            TimeSignature::COMMON,
        );
        assert_eq!(score.measures.len(), 1);
        let items = &score.measures[0];
        let shape: Vec<(bool, DurationSymbol)> =
            items.iter().map(|i| (i.is_rest, i.duration)).collect();
        assert_eq!(
            shape,
            vec![
                (false, DurationSymbol::Quarter),
                (true, DurationSymbol::Quarter),
                (false, DurationSymbol::Quarter),
                (true, DurationSymbol::Quarter),
            ]
        );
        assert!(items[1].pitches.is_empty());
        assert_eq!(measure_ticks(items), 1920);
    }

    #[test]
    fn overflow_splits_with_tie() {
        let score = build_measures(&[chord(&[60], 0, 2400)], TimeSignature::COMMON);
        assert_eq!(score.measures.len(), 2);

        let first = &score.measures[0][0];
        assert_eq!(first.duration, DurationSymbol::Whole);
        assert!(first.tied);
        assert_eq!(first.measure, 0);

        let second = &score.measures[1][0];
        assert_eq!(second.duration, DurationSymbol::Quarter);
        assert!(!second.tied);
        assert_eq!(second.measure, 1);
        assert_eq!(second.pitches, vec![60]);

        // remainder of the second measure is padded
        assert_eq!(measure_ticks(&score.measures[1]), 1920);
    }

    #[test]
    fn tiny_gaps_are_ignored() {
        let score = build_measures(
            &[chord(&[60], 0, 480), chord(&[62], 481, 479)],
            TimeSignature::COMMON,
        );
        let rests = score.items().filter(|i| i.is_rest).count();
        // only the trailing pad
        assert_eq!(rests, 1);
    }

    #[test]
    fn long_gap_spans_measures() {
        let score = build_measures(
            &[chord(&[60], 0, 480), chord(&[64], 4320, 480)],
            TimeSignature::COMMON,
        );
        for measure in &score.measures {
            assert_eq!(measure_ticks(measure), 1920);
        }
        let note_measures: Vec<usize> = score
            .items()
            .filter(|i| !i.is_rest)
            .map(|i| i.measure)
            .collect();
        assert_eq!(note_measures, vec![0, 2]);
    }

    #[test]
    fn full_measures_sum_to_capacity() {
        let chords = vec![
            chord(&[60], 0, 700),
            chord(&[62], 700, 1300),
            chord(&[64], 2000, 333),
            chord(&[65], 2400, 3000),
            chord(&[48, 55], 6000, 950),
        ];
        for signature in [
            TimeSignature::COMMON,
            TimeSignature::new(3, 4).unwrap(),
            TimeSignature::new(6, 8).unwrap(),
        ] {
            let capacity = signature.ticks_per_measure().to_integer();
            let score = build_measures(&chords, signature);
            let count = score.measures.len();
            for measure in &score.measures[..count - 1] {
                assert_eq!(measure_ticks(measure), capacity, "{signature}");
            }
            assert!(measure_ticks(&score.measures[count - 1]) <= capacity);
        }
    }

    #[test]
    fn measure_indices_non_decreasing() {
        let chords = vec![chord(&[60], 0, 5000), chord(&[67], 5000, 2100)];
        let score = build_measures(&chords, TimeSignature::new(3, 4).unwrap());
        let indices: Vec<usize> = score.items().map(|i| i.measure).collect();
        assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        for (index, measure) in score.measures.iter().enumerate() {
            assert!(measure.iter().all(|i| i.measure == index));
        }
    }

    #[test]
    fn tie_runs_end_untied() {
        let score = build_measures(&[chord(&[60], 0, 5000)], TimeSignature::new(3, 4).unwrap());
        let notes: Vec<&MeasureItem> = score.items().filter(|i| !i.is_rest).collect();
        assert!(notes.len() > 1);
        let (last, rest) = notes.split_last().unwrap();
        assert!(rest.iter().all(|i| i.tied));
        assert!(!last.tied);
    }

    #[test]
    fn exactly_full_measure_then_next_chord() {
        let score = build_measures(
            &[chord(&[60], 0, 1920), chord(&[62], 1920, 480)],
            TimeSignature::COMMON,
        );
        assert_eq!(score.measures.len(), 2);
        assert_eq!(score.measures[1][0].pitches, vec![62]);
        assert!(!score.measures[1][0].tied);
        assert!(!score.measures[0][0].tied);
    }
}
