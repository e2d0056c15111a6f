//! Subcommand implementations

pub mod dump;
pub mod events;
pub mod header;
pub mod info;

use std::path::Path;

use openephys_playback::{PlaybackConfig, ReaderSession};

use crate::error::CliError;

/// Open the index and select record `stream`.
pub(crate) fn open_stream(
    index: &Path,
    stream: usize,
    config: PlaybackConfig,
) -> Result<ReaderSession, CliError> {
    let mut reader = ReaderSession::open_with(index, config)?;
    if stream >= reader.records().len() {
        return Err(CliError::NotFound(format!(
            "stream {stream} (index lists {} streams)",
            reader.records().len()
        )));
    }
    reader.select_stream(stream)?;
    Ok(reader)
}
