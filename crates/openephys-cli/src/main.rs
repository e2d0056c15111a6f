//! oephys - Open Ephys recording inspector
//!
//! Lists the streams and recordings of an experiment index, dumps decoded
//! samples and events, and prints the text header of any data file.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openephys_playback::PlaybackConfig;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "oephys")]
#[command(about = "Inspect Open Ephys format recordings")]
#[command(version)]
#[command(long_about = "
oephys reads recordings in the Open Ephys data format: the structure.xml
index, block-framed .continuous files, .events and .spikes files.

Every recording of a stream is played back as one concatenated timeline.
Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Skip text header validation of channel files
    #[arg(long, global = true)]
    no_validate: bool,

    /// Fail when a legacy index cannot be probed cleanly
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List streams, recordings and messages of an experiment
    Info {
        /// Path to structure.xml
        index: PathBuf,
    },

    /// Print decoded samples of one stream
    Dump {
        /// Path to structure.xml
        index: PathBuf,
        /// Stream number as listed by `info`
        #[arg(short, long, default_value_t = 0)]
        stream: usize,
        /// First sample; wraps past the end of the stream
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Samples per channel
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Print events of one stream within a sample window
    Events {
        /// Path to structure.xml
        index: PathBuf,
        /// Stream number as listed by `info`
        #[arg(short, long, default_value_t = 0)]
        stream: usize,
        /// Window start
        #[arg(long, default_value_t = 0)]
        start: i64,
        /// Window end, inclusive
        #[arg(long)]
        stop: i64,
    },

    /// Print the text header of a data file
    Header {
        /// Any .continuous, .events, .spikes or .timestamps file
        file: PathBuf,
        /// Check format name and header size
        #[arg(long)]
        validate: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("oephys={log_level},openephys={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    let config = PlaybackConfig::default()
        .with_header_validation(!cli.no_validate)
        .with_strict_probe(cli.strict);

    match &cli.command {
        Commands::Info { index } => commands::info::execute(index, config, cli.json),
        Commands::Dump {
            index,
            stream,
            start,
            count,
        } => commands::dump::execute(index, *stream, *start, *count, config, cli.json),
        Commands::Events {
            index,
            stream,
            start,
            stop,
        } => commands::events::execute(index, *stream, *start, *stop, config, cli.json),
        Commands::Header { file, validate } => commands::header::execute(file, *validate, cli.json),
    }
}
