//! midiscore - convert between MIDI files and measure-structured score JSON
//!
//! Subcommands:
//! - `midiscore to-score <in.mid>` - MIDI → score JSON
//! - `midiscore to-midi <in.json>` - score JSON → MIDI
//! - `midiscore inspect <file>` - summarize a MIDI file or score
//! - `midiscore config` - show the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scoreconf::ScoreConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod staging;

#[derive(Parser)]
#[command(name = "midiscore")]
#[command(about = "Convert between MIDI files and measure-structured score JSON")]
#[command(version)]
struct Cli {
    /// Config file, replacing ./midiscore.toml
    #[arg(long, global = true, env = "MIDISCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a MIDI file to score JSON
    ToScore {
        /// Input .mid file
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Indent the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Convert score JSON to a MIDI file
    ToMidi {
        /// Input score JSON
        input: PathBuf,

        /// Output file (defaults to the input with a .mid extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a MIDI file or score JSON
    Inspect {
        /// A .mid file or score JSON
        input: PathBuf,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = ScoreConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_logging(&config.logging.log_level, cli.verbose);
    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::ToScore {
            input,
            output,
            pretty,
        } => {
            let params = commands::params_from(&config)?;
            commands::to_score(&input, output.as_deref(), pretty, &params)?;
        }
        Commands::ToMidi { input, output } => {
            let params = commands::params_from(&config)?;
            commands::to_midi(&input, output.as_deref(), &params)?;
        }
        Commands::Inspect { input } => {
            let params = commands::params_from(&config)?;
            commands::inspect(&input, &params)?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources);
        }
    }

    Ok(())
}

/// Logs go to stderr so JSON on stdout stays clean.
fn init_logging(level: &str, verbose: bool) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = if verbose {
        filter.add_directive(tracing::Level::DEBUG.into())
    } else {
        filter
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
