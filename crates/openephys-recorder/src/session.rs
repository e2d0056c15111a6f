//! Writer session: `Closed -> Open -> Closed`.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use openephys_codec::continuous::encode_samples_into;
use openephys_codec::header::date_string;
use openephys_codec::layout::{BLOCK_LENGTH, BYTES_PER_SAMPLE, RECORD_MARKER};
use openephys_codec::naming::{
    continuous_file_name, events_file_name, messages_file_name, spikes_file_name,
    timestamps_file_name,
};
use openephys_codec::spike::encode_spike;
use openephys_codec::{
    BlockHeader, ChannelKind, EventRecord, SpikeChannelMeta, SpikeEvent, generate_header,
};
use openephys_errors::{FormatError, Result};
use openephys_index::{IndexChannel, IndexRecording, IndexSpikeChannel, IndexStream};

use crate::config::{RecorderConfig, RecordingLayout, StreamDescriptor};
use crate::files::DataFile;

/// An event handed to [`WriterSession::write_event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPacket {
    /// TTL line transition, stored in the event file
    Ttl {
        /// Absolute sample timestamp
        timestamp: i64,
        /// Source node id (one byte on disk)
        source_id: u8,
        /// TTL line
        line: u8,
        /// New line state
        state: bool,
    },
    /// Text message, stored in the message log
    Text {
        /// Absolute sample timestamp
        timestamp: i64,
        /// Source node id
        source_id: u16,
        /// Message text
        text: String,
    },
}

/// Per-channel outcome of a closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Data file name
    pub filename: String,
    /// Blocks written during the session, padded block included
    pub blocks: u64,
    /// Zero samples appended to complete the last block
    pub padded_samples: usize,
}

/// Result of [`WriterSession::close`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSummary {
    /// Index the recording was appended to
    pub index_path: PathBuf,
    /// One-based recording number written to the index
    pub recording_number: u32,
    /// Continuous channels in layout order
    pub channels: Vec<ChannelSummary>,
}

/// Single-recording writer.
///
/// Every file operation runs under one lock, so a session can be shared
/// between producer threads. A write failure poisons the session: further
/// writes fail with [`FormatError::SessionPoisoned`] until it is closed.
#[derive(Debug, Default)]
pub struct WriterSession {
    inner: Mutex<Option<OpenSession>>,
}

impl WriterSession {
    /// Create a closed session.
    pub fn new() -> Self {
        Self::default()
    }

    /// True between [`open`](Self::open) and [`close`](Self::close).
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Open every data file of `layout` under `config.root_dir`.
    ///
    /// Existing files are appended to; new files get their text header.
    pub fn open(&self, config: RecorderConfig, layout: &RecordingLayout) -> Result<()> {
        config.validate()?;
        layout.validate()?;

        let mut guard = self.inner.lock();
        if guard.is_some() {
            return Err(FormatError::SessionState {
                expected: "closed",
                actual: "open",
            });
        }

        fs::create_dir_all(&config.root_dir)
            .map_err(|e| FormatError::write_failed(&config.root_dir, e))?;
        let session = OpenSession::create(config, layout)?;
        info!(
            root = ?session.config.root_dir,
            experiment = session.config.experiment_number,
            recording = session.config.recording_number,
            channels = session.continuous.len(),
            electrodes = session.spikes.len(),
            "writer session opened"
        );
        *guard = Some(session);
        Ok(())
    }

    /// Append samples to continuous channel `channel`.
    ///
    /// `first_sample_number` is the absolute timestamp of `samples[0]`.
    /// `sync_timestamps`, when given, holds one synchronized timestamp per
    /// sample; the value at each block start is recorded for the stream's
    /// reference channel.
    pub fn write_continuous(
        &self,
        channel: usize,
        samples: &[f32],
        first_sample_number: i64,
        sync_timestamps: Option<&[f64]>,
    ) -> Result<()> {
        self.with_open(|session| {
            session.write_continuous(channel, samples, first_sample_number, sync_timestamps)
        })
    }

    /// Append one event; text events go to the message log.
    pub fn write_event(&self, packet: &EventPacket) -> Result<()> {
        self.with_open(|session| session.write_event(packet))
    }

    /// Append one spike to electrode `electrode`.
    pub fn write_spike(&self, electrode: usize, spike: &SpikeEvent) -> Result<()> {
        self.with_open(|session| session.write_spike(electrode, spike))
    }

    /// Append `"<timestamp>, <text>"` to the message log.
    pub fn write_message(&self, timestamp: i64, text: &str) -> Result<()> {
        self.with_open(|session| session.write_message(timestamp, text))
    }

    /// Record a synchronization message for `stream_id` in the message log.
    pub fn write_timestamp_sync_text(
        &self,
        stream_id: u16,
        timestamp: i64,
        text: &str,
    ) -> Result<()> {
        trace!(stream_id, timestamp, "sync text");
        self.with_open(|session| session.write_message(timestamp, text))
    }

    /// Pad partial blocks, release every file and append the index entry.
    ///
    /// The session is closed afterwards whatever the outcome. A poisoned
    /// session releases its files without padding or indexing and reports
    /// [`FormatError::SessionPoisoned`].
    pub fn close(&self) -> Result<CloseSummary> {
        let mut guard = self.inner.lock();
        let session = guard.take().ok_or(FormatError::SessionState {
            expected: "open",
            actual: "closed",
        })?;
        session.finish()
    }

    fn with_open<T>(&self, op: impl FnOnce(&mut OpenSession) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let session = guard.as_mut().ok_or(FormatError::SessionState {
            expected: "open",
            actual: "closed",
        })?;
        if session.poisoned {
            return Err(FormatError::SessionPoisoned);
        }

        let result = op(session);
        if let Err(FormatError::WriteFailed { path, source }) = &result {
            error!(path = ?path, error = %source, "write failed, session poisoned");
            session.poisoned = true;
        }
        result
    }
}

#[derive(Debug)]
struct ContinuousWriter {
    stream: usize,
    name: String,
    bit_volts: f32,
    sample_rate: f32,
    file: DataFile,
    fill: usize,
    is_reference: bool,
    first_block_timestamp: Option<i64>,
    block_sync: f64,
    blocks: u64,
}

impl ContinuousWriter {
    fn begin_block(
        &mut self,
        timestamp: i64,
        recording_number: u16,
        sync: Option<f64>,
    ) -> Result<()> {
        self.file
            .append(&BlockHeader::new(timestamp, recording_number).to_bytes())?;
        if self.first_block_timestamp.is_none() {
            self.first_block_timestamp = Some(timestamp);
        }
        self.block_sync = sync.unwrap_or(timestamp as f64 / f64::from(self.sample_rate));
        Ok(())
    }

    fn finish_block(&mut self, timestamps: &mut DataFile) -> Result<()> {
        self.file.append(&RECORD_MARKER)?;
        self.fill = 0;
        self.blocks = self.blocks.saturating_add(1);
        if self.is_reference {
            timestamps.append(&self.block_sync.to_le_bytes())?;
        }
        Ok(())
    }

    /// Zero-fill a partially written block; returns the padded sample count.
    fn pad(&mut self, timestamps: &mut DataFile) -> Result<usize> {
        if self.fill == 0 {
            return Ok(0);
        }
        let missing = BLOCK_LENGTH - self.fill;
        debug!(
            channel = %self.name,
            missing,
            position = self.file.position(),
            "padding final block"
        );
        self.file.append(&vec![0u8; missing * BYTES_PER_SAMPLE])?;
        self.finish_block(timestamps)?;
        Ok(missing)
    }
}

#[derive(Debug)]
struct StreamFiles {
    descriptor: StreamDescriptor,
    timestamps: DataFile,
}

#[derive(Debug)]
struct SpikeWriter {
    stream: usize,
    name: String,
    meta: SpikeChannelMeta,
    file: DataFile,
}

#[derive(Debug)]
struct OpenSession {
    config: RecorderConfig,
    streams: Vec<StreamFiles>,
    continuous: Vec<ContinuousWriter>,
    spikes: Vec<SpikeWriter>,
    events: DataFile,
    messages: DataFile,
    poisoned: bool,
    scratch: Vec<u8>,
}

impl OpenSession {
    fn create(config: RecorderConfig, layout: &RecordingLayout) -> Result<Self> {
        let date = config
            .date_created
            .clone()
            .unwrap_or_else(|| date_string(&Local::now()));
        let exp = config.experiment_number;
        let root = config.root_dir.clone();

        let events = DataFile::open(
            root.join(events_file_name(exp)),
            Some(&generate_header(&ChannelKind::Event, &date)?),
        )?;
        let messages = DataFile::open(root.join(messages_file_name(exp)), None)?;

        let mut streams = Vec::with_capacity(layout.streams.len());
        let mut continuous = Vec::with_capacity(layout.continuous_count());
        let mut spikes = Vec::with_capacity(layout.spike_count());

        for (stream_index, stream) in layout.streams.iter().enumerate() {
            let timestamps = DataFile::open(
                root.join(timestamps_file_name(stream.source_node_id, &stream.name, exp)),
                Some(&generate_header(
                    &ChannelKind::Timestamps {
                        stream: stream.name.clone(),
                        sample_rate: stream.sample_rate,
                    },
                    &date,
                )?),
            )?;

            for (position, channel) in stream.continuous.iter().enumerate() {
                let kind = ChannelKind::Continuous {
                    name: channel.name.clone(),
                    sample_rate: stream.sample_rate,
                    bit_volts: channel.bit_volts,
                };
                let path = root.join(continuous_file_name(
                    stream.source_node_id,
                    &stream.name,
                    &channel.name,
                    exp,
                ));
                continuous.push(ContinuousWriter {
                    stream: stream_index,
                    name: channel.name.clone(),
                    bit_volts: channel.bit_volts,
                    sample_rate: stream.sample_rate,
                    file: DataFile::open(path, Some(&generate_header(&kind, &date)?))?,
                    fill: 0,
                    is_reference: position == 0,
                    first_block_timestamp: None,
                    block_sync: 0.0,
                    blocks: 0,
                });
            }

            for spike in &stream.spikes {
                let layout = spike.meta.layout();
                let kind = ChannelKind::Spike {
                    electrode: spike.name.clone(),
                    num_channels: layout.num_channels,
                    sample_rate: spike.meta.sample_rate,
                    samples_per_spike: layout.samples_per_channel,
                };
                let path = root.join(spikes_file_name(&spike.name, &stream.name, exp));
                spikes.push(SpikeWriter {
                    stream: stream_index,
                    name: spike.name.clone(),
                    meta: spike.meta.clone(),
                    file: DataFile::open(path, Some(&generate_header(&kind, &date)?))?,
                });
            }

            streams.push(StreamFiles {
                descriptor: stream.clone(),
                timestamps,
            });
        }

        Ok(Self {
            config,
            streams,
            continuous,
            spikes,
            events,
            messages,
            poisoned: false,
            scratch: Vec::with_capacity(BLOCK_LENGTH * BYTES_PER_SAMPLE),
        })
    }

    fn write_continuous(
        &mut self,
        channel: usize,
        samples: &[f32],
        first_sample_number: i64,
        sync_timestamps: Option<&[f64]>,
    ) -> Result<()> {
        let channel_count = self.continuous.len();
        let writer = self.continuous.get_mut(channel).ok_or_else(|| {
            FormatError::out_of_range("continuous channel", channel as u64, channel_count as u64)
        })?;
        let stream = self.streams.get_mut(writer.stream).ok_or_else(|| {
            FormatError::inconsistent(format!("channel {} has no stream", writer.name))
        })?;
        let recording_number = self.config.recording_number;

        let mut written = 0usize;
        while written < samples.len() {
            let take = (BLOCK_LENGTH - writer.fill).min(samples.len() - written);
            if writer.fill == 0 {
                let offset = i64::try_from(written).unwrap_or(i64::MAX);
                let sync = sync_timestamps.and_then(|ts| ts.get(written)).copied();
                writer.begin_block(
                    first_sample_number.saturating_add(offset),
                    recording_number,
                    sync,
                )?;
            }

            self.scratch.clear();
            let chunk = samples.get(written..written + take).unwrap_or_default();
            encode_samples_into(chunk, writer.bit_volts, &mut self.scratch);
            writer.file.append(&self.scratch)?;
            writer.fill += take;
            written += take;

            if writer.fill == BLOCK_LENGTH {
                writer.finish_block(&mut stream.timestamps)?;
            }
        }
        Ok(())
    }

    fn write_event(&mut self, packet: &EventPacket) -> Result<()> {
        match packet {
            EventPacket::Ttl {
                timestamp,
                source_id,
                line,
                state,
            } => {
                let record = EventRecord::ttl(
                    *timestamp,
                    *source_id,
                    *line,
                    *state,
                    self.config.recording_number,
                );
                self.events.append(&record.encode())
            }
            EventPacket::Text {
                timestamp, text, ..
            } => self.write_message(*timestamp, text),
        }
    }

    fn write_spike(&mut self, electrode: usize, spike: &SpikeEvent) -> Result<()> {
        let electrode_count = self.spikes.len();
        let writer = self.spikes.get_mut(electrode).ok_or_else(|| {
            FormatError::out_of_range("spike electrode", electrode as u64, electrode_count as u64)
        })?;
        let bytes = encode_spike(&writer.meta, spike, self.config.recording_number)?;
        writer.file.append(&bytes)
    }

    fn write_message(&mut self, timestamp: i64, text: &str) -> Result<()> {
        self.messages
            .append(format!("{timestamp}, {text}\n").as_bytes())
    }

    fn finish(mut self) -> Result<CloseSummary> {
        if self.poisoned {
            warn!(
                root = ?self.config.root_dir,
                "closing poisoned session without padding or indexing"
            );
            return Err(FormatError::SessionPoisoned);
        }

        let mut first_error: Option<FormatError> = None;
        let mut summaries = Vec::with_capacity(self.continuous.len());
        for writer in &mut self.continuous {
            let padded = match self.streams.get_mut(writer.stream) {
                Some(stream) => writer.pad(&mut stream.timestamps),
                None => Ok(0),
            };
            let padded = match padded {
                Ok(padded) => padded,
                Err(e) => {
                    first_error = first_error.or(Some(e));
                    0
                }
            };
            if let Err(e) = writer.file.flush() {
                first_error = first_error.or(Some(e));
            }
            summaries.push(ChannelSummary {
                filename: writer.file.file_name(),
                blocks: writer.blocks,
                padded_samples: padded,
            });
        }

        let other_files = self
            .spikes
            .iter_mut()
            .map(|s| &mut s.file)
            .chain(self.streams.iter_mut().map(|s| &mut s.timestamps))
            .chain([&mut self.events, &mut self.messages]);
        for file in other_files {
            if let Err(e) = file.flush() {
                first_error = first_error.or(Some(e));
            }
        }

        if let Some(e) = first_error {
            error!(error = %e, "close failed, index not updated");
            return Err(e);
        }

        let recording = self.index_recording();
        let index_path = self.config.index_path();
        let experiment = self.config.experiment_number;
        let recording_number = recording.number;
        drop(self);

        openephys_index::append_recording(&index_path, experiment, recording)?;
        info!(index = ?index_path, recording = recording_number, "writer session closed");

        Ok(CloseSummary {
            index_path,
            recording_number,
            channels: summaries,
        })
    }

    fn index_recording(&self) -> IndexRecording {
        let exp = self.config.experiment_number;
        let streams = self
            .streams
            .iter()
            .enumerate()
            .map(|(index, stream)| {
                let descriptor = &stream.descriptor;
                let writers: Vec<&ContinuousWriter> =
                    self.continuous.iter().filter(|w| w.stream == index).collect();
                let start_timestamp = writers
                    .iter()
                    .find(|w| w.is_reference)
                    .and_then(|w| w.first_block_timestamp)
                    .unwrap_or(0);

                IndexStream {
                    source_node_id: descriptor.source_node_id,
                    source_node_name: descriptor.source_node_name.clone(),
                    name: descriptor.name.clone(),
                    sample_rate: descriptor.sample_rate,
                    start_timestamp: Some(start_timestamp),
                    channels: writers
                        .iter()
                        .map(|w| IndexChannel {
                            name: w.name.clone(),
                            bit_volts: w.bit_volts,
                            filename: w.file.file_name(),
                            position: w.file.start_position(),
                        })
                        .collect(),
                    spike_channels: self
                        .spikes
                        .iter()
                        .filter(|s| s.stream == index)
                        .map(|s| {
                            let layout = s.meta.layout();
                            IndexSpikeChannel {
                                name: s.name.clone(),
                                filename: s.file.file_name(),
                                num_channels: layout.num_channels,
                                num_samples: layout.samples_per_channel,
                                bit_volts: s.meta.channel_bit_volts.clone(),
                            }
                        })
                        .collect(),
                    events_file: Some(events_file_name(exp)),
                    timestamps_file: Some(stream.timestamps.file_name()),
                }
            })
            .collect();

        IndexRecording {
            number: self.config.index_recording_number(),
            streams,
        }
    }
}
