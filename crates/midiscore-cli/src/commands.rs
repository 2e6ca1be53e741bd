//! CLI command implementations

use anyhow::{Context, Result};
use midiscore::{
    events_to_score, midi, midi_to_score, score_to_midi, ConvertParams, EncodeOptions, Score,
    ScoreSummary, TickClock, TimeSignature,
};
use scoreconf::{ConfigSources, ScoreConfig};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::staging::write_atomic;

/// Every Standard MIDI File starts with this chunk tag.
const SMF_MAGIC: &[u8] = b"MThd";

/// Build conversion parameters from the loaded configuration.
pub fn params_from(config: &ScoreConfig) -> Result<ConvertParams> {
    let time_signature: TimeSignature = config
        .convert
        .time_signature
        .parse()
        .context("convert.time_signature must look like \"3/4\"")?;

    Ok(ConvertParams {
        default_velocity: config.convert.default_velocity,
        chord_tolerance: config.convert.chord_tolerance,
        default_time_signature: time_signature,
        encode: EncodeOptions {
            track_name: config.output.track_name.clone(),
            tempo_bpm: config.output.tempo_bpm,
            program: config.output.program,
            time_signature: Some(time_signature),
        },
    })
}

pub fn to_score(
    input: &Path,
    output: Option<&Path>,
    pretty: bool,
    params: &ConvertParams,
) -> Result<()> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let score = midi_to_score(&bytes, params)
        .with_context(|| format!("Failed to convert {}", input.display()))?;
    let json = score.to_json_string(pretty)?;

    match output {
        Some(path) => {
            write_atomic(path, json.as_bytes())?;
            info!(path = %path.display(), measures = score.measures.len(), "wrote score");
        }
        None => println!("{}", json),
    }

    Ok(())
}

pub fn to_midi(input: &Path, output: Option<&Path>, params: &ConvertParams) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let score = Score::from_json_str(&json)
        .with_context(|| format!("Failed to load score from {}", input.display()))?;
    let bytes = score_to_midi(&score, params)?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_midi_path(input));
    write_atomic(&path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote MIDI");

    Ok(())
}

fn default_midi_path(input: &Path) -> PathBuf {
    input.with_extension("mid")
}

/// Print a summary of a MIDI file or a score, detected by content.
pub fn inspect(input: &Path, params: &ConvertParams) -> Result<()> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if bytes.starts_with(SMF_MAGIC) {
        let decoded = midi::decode(&bytes)
            .with_context(|| format!("Failed to parse {}", input.display()))?;
        let time_signature = decoded
            .time_signature
            .unwrap_or(params.default_time_signature);

        println!("File:            {}", input.display());
        println!("Format:          MIDI");
        println!("Tracks:          {}", decoded.track_count);
        match decoded.resolution {
            Some(ticks) => println!("Resolution:      {} ticks/quarter", ticks),
            None => println!("Resolution:      timecode"),
        }
        println!(
            "Time signature:  {}{}",
            time_signature,
            if decoded.time_signature.is_none() { " (default)" } else { "" }
        );
        println!("Note events:     {}", decoded.events.len());

        let score = events_to_score(
            &decoded.events,
            decoded.resolution,
            TickClock::Absolute,
            time_signature,
            params,
        );
        print_summary(&score.summary());
    } else {
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is neither MIDI nor UTF-8 JSON", input.display()))?;
        let score = Score::from_json_str(&text)
            .with_context(|| format!("Failed to load score from {}", input.display()))?;

        println!("File:            {}", input.display());
        println!("Format:          score JSON");
        print_summary(&score.summary());
    }

    Ok(())
}

fn print_summary(summary: &ScoreSummary) {
    println!("Measures:        {}", summary.measures);
    println!("Items:           {}", summary.items);
    println!("  sounding:      {}", summary.notes);
    println!("  rests:         {}", summary.rests);
    println!("  tied:          {}", summary.tied);
    println!("Total ticks:     {}", summary.total_ticks);
    if let (Some(low), Some(high)) = (summary.pitch_min, summary.pitch_max) {
        println!("Pitch range:     {}..={}", low, high);
    }
}

pub fn show_config(config: &ScoreConfig, sources: &ConfigSources) {
    print!("{}", config.to_toml());

    println!();
    if sources.files.is_empty() {
        println!("# no config files found, using defaults");
    }
    for file in &sources.files {
        println!("# loaded: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# env: {}", var);
    }
}
