//! Recording extents derived from an index and its data files.
//!
//! Built in two passes: the first collects every recording's start position
//! and start timestamp per stream, the second derives sample counts from the
//! distance to the next recording holding the same stream (or to the end of
//! the file for the last one).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use openephys_codec::layout::samples_between;
use openephys_errors::{FormatError, Result};
use openephys_index::{ExperimentIndex, FormatVariant, IndexChannel, IndexSpikeChannel};

use crate::config::PlaybackConfig;
use crate::mapped::MappedFile;
use crate::probe::probe_start_timestamp;

/// One stream within one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamExtent {
    /// `<source id>_<stream name>`
    pub key: String,
    /// Stream name
    pub name: String,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Byte position of the recording's first block in the reference channel file
    pub start_position: u64,
    /// Absolute timestamp of the recording's first sample
    pub start_timestamp: i64,
    /// Samples recorded
    pub sample_count: u64,
    /// Continuous channels
    pub channels: Vec<IndexChannel>,
    /// Spike electrodes
    pub spike_channels: Vec<IndexSpikeChannel>,
    /// Event file, when listed
    pub events_file: Option<String>,
}

/// Streams of one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingExtent {
    /// One-based recording number
    pub number: u32,
    /// Streams with at least one continuous channel, in document order
    pub streams: Vec<StreamExtent>,
}

impl RecordingExtent {
    /// Stream with the given key.
    pub fn stream(&self, key: &str) -> Option<&StreamExtent> {
        self.streams.iter().find(|s| s.key == key)
    }
}

/// Every recording of an experiment, sorted by number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Directory holding the index and data files
    pub root: PathBuf,
    /// Experiment number
    pub experiment: u32,
    /// Index shape
    pub variant: FormatVariant,
    /// Recordings in ascending number order
    pub recordings: Vec<RecordingExtent>,
}

impl Catalog {
    /// Build the catalog for `index`, whose data files live under `root`.
    pub fn build(root: &Path, index: &ExperimentIndex, config: &PlaybackConfig) -> Result<Self> {
        let variant = index.variant();
        info!(
            root = ?root,
            variant = ?variant,
            recordings = index.recordings.len(),
            "building catalog"
        );

        let mut recordings = Vec::with_capacity(index.recordings.len());
        for recording in index.recordings_sorted() {
            let mut streams = Vec::with_capacity(recording.streams.len());
            for stream in &recording.streams {
                let Some(reference) = stream.channels.first() else {
                    debug!(stream = %stream.key(), "stream has no continuous channels, skipping");
                    continue;
                };
                let start_timestamp = match stream.start_timestamp {
                    Some(ts) if variant == FormatVariant::Stamped => ts,
                    _ => {
                        let file = MappedFile::open(&root.join(&reference.filename))?;
                        probe_start_timestamp(
                            file.bytes(),
                            reference.position,
                            recording.number,
                            config.strict_probe,
                        )?
                    }
                };
                streams.push(StreamExtent {
                    key: stream.key(),
                    name: stream.name.clone(),
                    sample_rate: stream.sample_rate,
                    start_position: reference.position,
                    start_timestamp,
                    sample_count: 0,
                    channels: stream.channels.clone(),
                    spike_channels: stream.spike_channels.clone(),
                    events_file: stream.events_file.clone(),
                });
            }
            recordings.push(RecordingExtent {
                number: recording.number,
                streams,
            });
        }

        let counts = sample_counts(root, &recordings)?;
        for (recording, counts) in recordings.iter_mut().zip(counts) {
            for (stream, count) in recording.streams.iter_mut().zip(counts) {
                stream.sample_count = count;
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            experiment: index.number,
            variant,
            recordings,
        })
    }

    /// The first recording, whose streams define the playback records.
    pub fn first(&self) -> Option<&RecordingExtent> {
        self.recordings.first()
    }

    /// Recording with the given one-based number.
    pub fn recording(&self, number: u32) -> Option<&RecordingExtent> {
        self.recordings.iter().find(|r| r.number == number)
    }

    /// Samples of `key` across every recording.
    pub fn total_samples(&self, key: &str) -> u64 {
        self.recordings
            .iter()
            .filter_map(|r| r.stream(key))
            .map(|s| s.sample_count)
            .sum()
    }

    /// Amount to subtract from an event timestamp recorded under the
    /// zero-based `recording_number` so it lands on the concatenated timeline
    /// of stream `key`.
    ///
    /// Block and event headers number recordings from zero; the catalog
    /// numbers them from one, so the event belongs to catalog recording
    /// `recording_number + 1`. The offset is the first recording's start
    /// timestamp plus every gap between consecutive recordings holding the
    /// stream, up to and including that one.
    pub fn event_offset(&self, key: &str, recording_number: u16) -> i64 {
        let target = u32::from(recording_number).saturating_add(1);
        let mut extents = self
            .recordings
            .iter()
            .filter_map(|r| r.stream(key).map(|s| (r.number, s)));

        let Some((_, first)) = extents.next() else {
            return 0;
        };
        let mut offset = first.start_timestamp;
        let mut previous = first;
        for (number, current) in extents.take_while(|(number, _)| *number <= target) {
            let end = previous
                .start_timestamp
                .saturating_add(i64::try_from(previous.sample_count).unwrap_or(i64::MAX));
            offset = offset.saturating_add(current.start_timestamp.saturating_sub(end));
            trace!(recording = number, offset, "accumulated recording gap");
            previous = current;
        }
        offset
    }
}

/// Second pass: per recording, per stream sample counts.
fn sample_counts(root: &Path, recordings: &[RecordingExtent]) -> Result<Vec<Vec<u64>>> {
    let mut counts = Vec::with_capacity(recordings.len());
    for (index, recording) in recordings.iter().enumerate() {
        let mut stream_counts = Vec::with_capacity(recording.streams.len());
        for stream in &recording.streams {
            let next_position = recordings
                .iter()
                .skip(index + 1)
                .find_map(|r| r.stream(&stream.key))
                .map(|s| s.start_position);

            let end = match next_position {
                Some(position) => position,
                None => reference_file_len(root, stream)?,
            };
            if end < stream.start_position {
                warn!(
                    stream = %stream.key,
                    recording = recording.number,
                    "next recording starts before this one"
                );
                return Err(FormatError::inconsistent(format!(
                    "stream {} recording {} ends at byte {end} before it starts at {}",
                    stream.key, recording.number, stream.start_position
                )));
            }
            stream_counts.push(samples_between(stream.start_position, end));
        }
        counts.push(stream_counts);
    }
    Ok(counts)
}

fn reference_file_len(root: &Path, stream: &StreamExtent) -> Result<u64> {
    let filename = stream
        .channels
        .first()
        .map(|c| c.filename.as_str())
        .unwrap_or_default();
    let path = root.join(filename);
    fs::metadata(&path)
        .map(|m| m.len())
        .map_err(|e| FormatError::file_not_found(&path, e.to_string()))
}
