//! Measure-structured score model and its JSON wire form.
//!
//! The wire form is an array of measures, each an array of item objects:
//!
//! ```json
//! [[{"midiNotes": [60, 64], "clef": "treble", "duration": "w", "isRest": false, "measure": 0}]]
//! ```
//!
//! Reading is strict about shape and lenient about content: a score that is
//! not an array of arrays of objects is rejected, while unknown fields are
//! ignored and missing or odd field values fall back to defaults.

use crate::duration::DurationSymbol;
use crate::note::Clef;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// One note, chord, or rest placed in a measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasureItem {
    /// Sounding pitches; empty for rests. Kept wide so that out-of-range
    /// values from hand-written scores survive until emission.
    #[serde(rename = "midiNotes")]
    pub pitches: Vec<i64>,
    pub clef: Clef,
    pub duration: DurationSymbol,
    #[serde(rename = "isRest")]
    pub is_rest: bool,
    /// Continues into the next fragment of the same split duration.
    #[serde(skip_serializing_if = "is_false")]
    pub tied: bool,
    /// Zero-based measure index.
    pub measure: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MeasureItem {
    pub fn rest(clef: Clef, duration: DurationSymbol, measure: usize) -> Self {
        Self {
            pitches: Vec::new(),
            clef,
            duration,
            is_rest: true,
            tied: false,
            measure,
            velocity: None,
        }
    }

    pub fn chord(pitches: &[u8], clef: Clef, duration: DurationSymbol, measure: usize) -> Self {
        Self {
            pitches: pitches.iter().map(|&p| i64::from(p)).collect(),
            clef,
            duration,
            is_rest: false,
            tied: false,
            measure,
            velocity: None,
        }
    }

    pub fn with_tie(mut self, tied: bool) -> Self {
        self.tied = tied;
        self
    }

    pub fn ticks(&self) -> i64 {
        self.duration.ticks()
    }

    fn from_object(object: &Map<String, Value>, measure_index: usize) -> Self {
        let is_rest = object
            .get("isRest")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let clef = match object.get("clef").and_then(Value::as_str) {
            Some("bass") => Clef::Bass,
            _ => Clef::Treble,
        };

        let duration = match object.get("duration").and_then(Value::as_str) {
            Some(text) => text.parse().unwrap_or_else(|_| {
                debug!(duration = text, "unknown duration symbol, using a quarter note");
                DurationSymbol::Quarter
            }),
            None => DurationSymbol::Quarter,
        };

        let pitches = object
            .get("midiNotes")
            .and_then(Value::as_array)
            .map(|notes| notes.iter().filter_map(numeric).collect())
            .unwrap_or_default();

        let tied = object.get("tied").and_then(Value::as_bool).unwrap_or(false);

        let measure = object
            .get("measure")
            .and_then(Value::as_u64)
            .map(|m| m as usize)
            .unwrap_or(measure_index);

        let velocity = object
            .get("velocity")
            .and_then(numeric)
            .map(|v| v.clamp(0, 127) as u8);

        Self {
            pitches,
            clef,
            duration,
            is_rest,
            tied,
            measure,
            velocity,
        }
    }
}

/// Integer value of a JSON number; floats truncate toward zero.
fn numeric(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

pub type Measure = Vec<MeasureItem>;

/// Ordered measures of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Score {
    pub measures: Vec<Measure>,
}

impl Score {
    pub fn new(measures: Vec<Measure>) -> Self {
        Self { measures }
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Items in measure order.
    pub fn items(&self) -> impl Iterator<Item = &MeasureItem> {
        self.measures.iter().flatten()
    }

    /// Validate the wire shape and read a score.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let measures = value
            .as_array()
            .ok_or_else(|| invalid("score must be an array of measures"))?;

        let measures = measures
            .iter()
            .enumerate()
            .map(|(measure_index, measure)| {
                let items = measure.as_array().ok_or_else(|| {
                    invalid(format!("measure {measure_index} is not an array"))
                })?;

                items
                    .iter()
                    .enumerate()
                    .map(|(item_index, item)| {
                        item.as_object()
                            .map(|object| MeasureItem::from_object(object, measure_index))
                            .ok_or_else(|| {
                                invalid(format!(
                                    "item {item_index} of measure {measure_index} is not an object"
                                ))
                            })
                    })
                    .collect::<Result<Measure>>()
            })
            .collect::<Result<Vec<Measure>>>()?;

        Ok(Self { measures })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json_value(&value)
    }

    pub fn to_json_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary::from_score(self)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Score::from_json_value(&value).map_err(serde::de::Error::custom)
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidScore {
        reason: reason.into(),
    }
}

/// Counts describing a score, for logs and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub measures: usize,
    pub items: usize,
    pub notes: usize,
    pub rests: usize,
    pub tied: usize,
    pub total_ticks: i64,
    pub pitch_min: Option<i64>,
    pub pitch_max: Option<i64>,
}

impl ScoreSummary {
    pub fn from_score(score: &Score) -> Self {
        let mut summary = ScoreSummary {
            measures: score.measures.len(),
            ..Default::default()
        };

        for item in score.items() {
            summary.items += 1;
            summary.total_ticks += item.ticks();
            if item.is_rest {
                summary.rests += 1;
            } else {
                summary.notes += 1;
            }
            if item.tied {
                summary.tied += 1;
            }
            for &pitch in &item.pitches {
                summary.pitch_min = Some(summary.pitch_min.map_or(pitch, |m| m.min(pitch)));
                summary.pitch_max = Some(summary.pitch_max.map_or(pitch, |m| m.max(pitch)));
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn serializes_wire_shape() {
        let score = Score::new(vec![vec![
            MeasureItem::chord(&[60, 64], Clef::Treble, DurationSymbol::Whole, 0).with_tie(true),
            MeasureItem::rest(Clef::Bass, DurationSymbol::Quarter, 0),
        ]]);

        let value = score.to_json_value().unwrap();
        assert_eq!(
            value,
            json!([[
                {"midiNotes": [60, 64], "clef": "treble", "duration": "w", "isRest": false, "tied": true, "measure": 0},
                {"midiNotes": [], "clef": "bass", "duration": "q", "isRest": true, "measure": 0}
            ]])
        );
    }

    #[test]
    fn reads_back_what_it_writes() {
        let score = Score::new(vec![
            vec![MeasureItem::chord(&[48], Clef::Bass, DurationSymbol::DottedHalf, 0)],
            vec![MeasureItem::rest(Clef::Treble, DurationSymbol::Eighth, 1)],
        ]);
        let json = score.to_json_string(false).unwrap();
        assert_eq!(Score::from_json_str(&json).unwrap(), score);
    }

    #[test]
    fn rejects_non_array_score() {
        let err = Score::from_json_value(&json!({"measures": []})).unwrap_err();
        assert!(matches!(err, Error::InvalidScore { .. }));
    }

    #[test]
    fn rejects_non_array_measure() {
        let err = Score::from_json_value(&json!([[], {"a": 1}])).unwrap_err();
        assert!(err.to_string().contains("measure 1"));
    }

    #[test]
    fn rejects_non_object_item() {
        let err = Score::from_json_value(&json!([[{"duration": "q"}, 5]])).unwrap_err();
        assert!(err.to_string().contains("item 1 of measure 0"));
    }

    #[test]
    fn defaults_missing_fields() {
        let score = Score::from_json_value(&json!([[{}], [{"unknown": true}]])).unwrap();
        let item = &score.measures[0][0];
        assert_eq!(item.duration, DurationSymbol::Quarter);
        assert_eq!(item.clef, Clef::Treble);
        assert!(!item.is_rest);
        assert!(item.pitches.is_empty());
        assert_eq!(item.velocity, None);
        assert_eq!(score.measures[1][0].measure, 1);
    }

    #[test]
    fn lenient_field_values() {
        let score = Score::from_json_value(&json!([[{
            "midiNotes": [60.7, "x", 200, -3],
            "clef": "alto",
            "duration": "zz",
            "velocity": 300
        }]]))
        .unwrap();
        let item = &score.measures[0][0];
        assert_eq!(item.pitches, vec![60, 200, -3]);
        assert_eq!(item.clef, Clef::Treble);
        assert_eq!(item.duration, DurationSymbol::Quarter);
        assert_eq!(item.velocity, Some(127));
    }

    #[test]
    fn serde_deserialize_validates() {
        let score: Score = serde_json::from_str(r#"[[{"duration": "h", "isRest": true}]]"#).unwrap();
        assert!(score.measures[0][0].is_rest);
        assert!(serde_json::from_str::<Score>(r#"{"not": "a score"}"#).is_err());
    }

    #[test]
    fn summary_counts() {
        let score = Score::new(vec![vec![
            MeasureItem::chord(&[60, 67], Clef::Treble, DurationSymbol::Half, 0).with_tie(true),
            MeasureItem::chord(&[43], Clef::Bass, DurationSymbol::Quarter, 0),
            MeasureItem::rest(Clef::Treble, DurationSymbol::Quarter, 0),
        ]]);
        let summary = score.summary();
        assert_eq!(summary.measures, 1);
        assert_eq!(summary.items, 3);
        assert_eq!(summary.notes, 2);
        assert_eq!(summary.rests, 1);
        assert_eq!(summary.tied, 1);
        assert_eq!(summary.total_ticks, 1920);
        assert_eq!(summary.pitch_min, Some(43));
        assert_eq!(summary.pitch_max, Some(67));
    }
}
