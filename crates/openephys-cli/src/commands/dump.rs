//! `oephys dump`: decoded samples of one stream.

use std::path::Path;

use serde::Serialize;

use openephys_playback::PlaybackConfig;

use crate::commands::open_stream;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Dump {
    start: u64,
    channels: Vec<String>,
    /// Volts, one row per channel
    samples: Vec<Vec<f32>>,
}

pub fn execute(
    index: &Path,
    stream: usize,
    start: u64,
    count: usize,
    config: PlaybackConfig,
    json: bool,
) -> anyhow::Result<()> {
    let mut reader = open_stream(index, stream, config)?;
    let channels: Vec<String> = reader
        .records()
        .get(stream)
        .map(|r| r.channels.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    if channels.is_empty() {
        return Err(CliError::InvalidArgument(format!("stream {stream} has no channels")).into());
    }

    reader.seek_to(start).map_err(CliError::from)?;
    let first = reader.position().map_err(CliError::from)?;
    let mut raw = vec![0i16; count.saturating_mul(channels.len())];
    let read = reader.read(&mut raw, count).map_err(CliError::from)?;

    let mut samples = Vec::with_capacity(channels.len());
    for channel in 0..channels.len() {
        let mut volts = vec![0.0f32; read];
        reader
            .convert_channel(&raw, channel, &mut volts)
            .map_err(CliError::from)?;
        samples.push(volts);
    }

    let dump = Dump {
        start: first,
        channels,
        samples,
    };
    if json {
        return output::print_json("dump", &dump);
    }

    println!("sample\t{}", dump.channels.join("\t"));
    for i in 0..read {
        let row: Vec<String> = dump
            .samples
            .iter()
            .map(|c| c.get(i).map(|v| format!("{v:.3}")).unwrap_or_default())
            .collect();
        println!("{}\t{}", first + i as u64, row.join("\t"));
    }
    Ok(())
}
