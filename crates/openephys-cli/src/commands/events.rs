//! `oephys events`: TTL events in a sample window.

use std::path::Path;

use openephys_playback::PlaybackConfig;

use crate::commands::open_stream;
use crate::error::CliError;
use crate::output;

pub fn execute(
    index: &Path,
    stream: usize,
    start: i64,
    stop: i64,
    config: PlaybackConfig,
    json: bool,
) -> anyhow::Result<()> {
    if stop < start {
        return Err(CliError::InvalidArgument(format!("stop {stop} is before start {start}")).into());
    }
    let reader = open_stream(index, stream, config)?;
    let events = reader.events_in_range(start, stop).map_err(CliError::from)?;

    if json {
        return output::print_json("events", &events);
    }
    if events.is_empty() {
        println!("No events between {start} and {stop}");
        return Ok(());
    }
    println!("timestamp\tline\tstate\tsource\trecording");
    for event in &events {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            event.timestamp, event.line, event.state, event.source_id, event.recording_number
        );
    }
    Ok(())
}
