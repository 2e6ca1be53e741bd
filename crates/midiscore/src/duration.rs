//! Duration vocabulary: symbol ↔ tick lookups, nearest-symbol quantization,
//! and splitting a duration across measure boundaries.
//!
//! All tick values are expressed at [`TICKS_PER_BEAT`] resolution. Tick
//! positions are exact rationals so that rescaling from a foreign
//! resolution and averaging chord durations never lose precision.

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exact tick count at [`TICKS_PER_BEAT`] resolution.
pub type Tick = Ratio<i64>;

/// Normalized resolution: ticks per quarter note.
pub const TICKS_PER_BEAT: i64 = 480;

/// Maximum distance (in ticks) for a duration to count as an exact match.
pub const QUANTIZE_TOLERANCE: i64 = TICKS_PER_BEAT / 32;

/// Hard ceiling on split iterations so pathological inputs terminate.
pub const MAX_SPLIT_ITERATIONS: usize = 20;

/// A notated duration. Wire names follow the VexFlow convention
/// (`w`, `h`, `q`, `8`, ... with a trailing `.` for dotted values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DurationSymbol {
    #[serde(rename = "w")]
    Whole,
    #[serde(rename = "h")]
    Half,
    #[default]
    #[serde(rename = "q")]
    Quarter,
    #[serde(rename = "8")]
    Eighth,
    #[serde(rename = "16")]
    Sixteenth,
    #[serde(rename = "32")]
    ThirtySecond,
    #[serde(rename = "w.")]
    DottedWhole,
    #[serde(rename = "h.")]
    DottedHalf,
    #[serde(rename = "q.")]
    DottedQuarter,
    #[serde(rename = "8.")]
    DottedEighth,
    #[serde(rename = "16.")]
    DottedSixteenth,
}

impl DurationSymbol {
    /// Every symbol, plain values first.
    pub const ALL: [DurationSymbol; 11] = [
        DurationSymbol::Whole,
        DurationSymbol::Half,
        DurationSymbol::Quarter,
        DurationSymbol::Eighth,
        DurationSymbol::Sixteenth,
        DurationSymbol::ThirtySecond,
        DurationSymbol::DottedWhole,
        DurationSymbol::DottedHalf,
        DurationSymbol::DottedQuarter,
        DurationSymbol::DottedEighth,
        DurationSymbol::DottedSixteenth,
    ];

    /// Every symbol, longest first.
    pub const DESCENDING: [DurationSymbol; 11] = [
        DurationSymbol::DottedWhole,
        DurationSymbol::Whole,
        DurationSymbol::DottedHalf,
        DurationSymbol::Half,
        DurationSymbol::DottedQuarter,
        DurationSymbol::Quarter,
        DurationSymbol::DottedEighth,
        DurationSymbol::Eighth,
        DurationSymbol::DottedSixteenth,
        DurationSymbol::Sixteenth,
        DurationSymbol::ThirtySecond,
    ];

    /// Integer tick length of this symbol.
    pub const fn ticks(self) -> i64 {
        match self {
            DurationSymbol::Whole => TICKS_PER_BEAT * 4,
            DurationSymbol::Half => TICKS_PER_BEAT * 2,
            DurationSymbol::Quarter => TICKS_PER_BEAT,
            DurationSymbol::Eighth => TICKS_PER_BEAT / 2,
            DurationSymbol::Sixteenth => TICKS_PER_BEAT / 4,
            DurationSymbol::ThirtySecond => TICKS_PER_BEAT / 8,
            DurationSymbol::DottedWhole => TICKS_PER_BEAT * 6,
            DurationSymbol::DottedHalf => TICKS_PER_BEAT * 3,
            DurationSymbol::DottedQuarter => TICKS_PER_BEAT * 3 / 2,
            DurationSymbol::DottedEighth => TICKS_PER_BEAT * 3 / 4,
            DurationSymbol::DottedSixteenth => TICKS_PER_BEAT * 3 / 8,
        }
    }

    pub fn tick_value(self) -> Tick {
        Tick::from_integer(self.ticks())
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DurationSymbol::Whole => "w",
            DurationSymbol::Half => "h",
            DurationSymbol::Quarter => "q",
            DurationSymbol::Eighth => "8",
            DurationSymbol::Sixteenth => "16",
            DurationSymbol::ThirtySecond => "32",
            DurationSymbol::DottedWhole => "w.",
            DurationSymbol::DottedHalf => "h.",
            DurationSymbol::DottedQuarter => "q.",
            DurationSymbol::DottedEighth => "8.",
            DurationSymbol::DottedSixteenth => "16.",
        }
    }
}

impl fmt::Display for DurationSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationSymbol {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DurationSymbol::ALL
            .iter()
            .copied()
            .find(|symbol| symbol.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownDuration(s.to_string()))
    }
}

/// Exact tick value of a symbol.
pub fn ticks_for(symbol: DurationSymbol) -> Tick {
    symbol.tick_value()
}

/// Outcome of quantizing a tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolMatch {
    pub symbol: DurationSymbol,
    /// False when no symbol was within [`QUANTIZE_TOLERANCE`] and the
    /// closest one was taken instead.
    pub within_tolerance: bool,
}

/// Quantize `ticks` to a symbol, reporting whether the match was inexact.
pub fn match_symbol(ticks: Tick) -> SymbolMatch {
    let tolerance = Tick::from_integer(QUANTIZE_TOLERANCE);

    if let Some(symbol) = DurationSymbol::DESCENDING
        .iter()
        .copied()
        .find(|symbol| distance(symbol.tick_value(), ticks) <= tolerance)
    {
        return SymbolMatch {
            symbol,
            within_tolerance: true,
        };
    }

    // min_by_key keeps the first minimum, so ties resolve to the longer symbol
    let symbol = DurationSymbol::DESCENDING
        .iter()
        .copied()
        .min_by_key(|symbol| distance(symbol.tick_value(), ticks))
        .unwrap_or_default();

    SymbolMatch {
        symbol,
        within_tolerance: false,
    }
}

/// Total nearest-symbol lookup.
pub fn nearest_symbol(ticks: Tick) -> DurationSymbol {
    match_symbol(ticks).symbol
}

/// Symbols produced by [`split_across_capacity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    pub symbols: Vec<DurationSymbol>,
    /// Duration the split could not account for before the iteration
    /// ceiling was reached. Zero on a complete split.
    pub unplaced: Tick,
}

impl SplitOutcome {
    pub fn is_complete(&self) -> bool {
        self.unplaced <= Tick::from_integer(0)
    }

    pub fn total(&self) -> Tick {
        self.symbols
            .iter()
            .fold(Tick::from_integer(0), |acc, symbol| acc + symbol.tick_value())
    }
}

/// Split `ticks` into symbols filling the current measure's remaining space
/// and then successive full measures.
///
/// Each step picks the symbol that fits the available space and lies
/// closest to `min(left, space)`, preferring the longer symbol on ties.
pub fn split_across_capacity(
    ticks: Tick,
    remaining_in_measure: Tick,
    measure_capacity: Tick,
) -> SplitOutcome {
    let zero = Tick::from_integer(0);
    let mut symbols = Vec::new();
    let mut left = ticks;
    let mut space = remaining_in_measure;
    let mut iterations = 0;

    while left > zero && iterations < MAX_SPLIT_ITERATIONS {
        iterations += 1;

        if space <= zero {
            space = measure_capacity;
            continue;
        }

        let target = left.min(space);
        let best = DurationSymbol::ALL
            .iter()
            .copied()
            .filter(|symbol| symbol.tick_value() <= space)
            .min_by(|a, b| {
                distance(a.tick_value(), target)
                    .cmp(&distance(b.tick_value(), target))
                    .then(b.ticks().cmp(&a.ticks()))
            });

        let Some(symbol) = best else {
            // Nothing fits the leftover sliver; move on to a fresh measure
            space = measure_capacity;
            continue;
        };

        symbols.push(symbol);
        left -= symbol.tick_value();
        space -= symbol.tick_value();

        if space <= zero {
            space = measure_capacity;
        }
    }

    SplitOutcome {
        symbols,
        unplaced: left.max(zero),
    }
}

/// Longest symbols that fit exactly into `space`, largest first.
///
/// Used to pad a measure; a remainder shorter than the smallest symbol
/// is left unfilled.
pub fn fill_exact(space: Tick) -> Vec<DurationSymbol> {
    let mut symbols = Vec::new();
    let mut left = space;

    while let Some(symbol) = DurationSymbol::DESCENDING
        .iter()
        .copied()
        .find(|symbol| symbol.tick_value() <= left)
    {
        symbols.push(symbol);
        left -= symbol.tick_value();
    }

    symbols
}

fn distance(a: Tick, b: Tick) -> Tick {
    if a > b {
        a - b
    } else {
        b - a
    }
}
