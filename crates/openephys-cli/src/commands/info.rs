//! `oephys info`: records, recordings and the message log.

use std::path::Path;

use serde::Serialize;

use openephys_index::FormatVariant;
use openephys_playback::{Message, PlaybackConfig, ReaderSession, RecordInfo, RecordingExtent};

use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct InfoReport<'a> {
    variant: FormatVariant,
    experiment: u32,
    records: &'a [RecordInfo],
    recordings: &'a [RecordingExtent],
    messages: Vec<Message>,
}

pub fn execute(index: &Path, config: PlaybackConfig, json: bool) -> anyhow::Result<()> {
    let reader = ReaderSession::open_with(index, config).map_err(CliError::from)?;
    let catalog = reader.catalog();
    let report = InfoReport {
        variant: reader.variant(),
        experiment: catalog.experiment,
        records: reader.records(),
        recordings: &catalog.recordings,
        messages: reader.read_messages().map_err(CliError::from)?,
    };

    if json {
        return output::print_json("info", &report);
    }

    println!(
        "Experiment {} ({:?} index, {} recordings)",
        report.experiment,
        report.variant,
        report.recordings.len()
    );
    for (i, record) in report.records.iter().enumerate() {
        println!(
            "  [{i}] {} @ {} Hz: {}",
            record.key,
            record.sample_rate,
            output::duration(record.num_samples, record.sample_rate)
        );
        for channel in &record.channels {
            println!("      {} ({} V/bit)", channel.name, channel.bit_volts);
        }
    }
    for recording in report.recordings {
        for stream in &recording.streams {
            println!(
                "  recording {} {}: start {} at byte {}, {} samples",
                recording.number,
                stream.key,
                stream.start_timestamp,
                stream.start_position,
                stream.sample_count
            );
        }
    }
    if !report.messages.is_empty() {
        println!("Messages:");
        for message in &report.messages {
            println!("  {}, {}", message.timestamp, message.text);
        }
    }
    Ok(())
}
