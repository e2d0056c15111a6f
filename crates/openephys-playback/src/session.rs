//! Reader session: `Closed -> Open -> [select/seek/read]* -> Closed`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use openephys_codec::continuous::{decode_raw_word, read_block};
use openephys_codec::event::decode_events;
use openephys_codec::layout::BLOCK_LENGTH;
use openephys_codec::naming::messages_file_name;
use openephys_codec::spike::decode_spike_stream;
use openephys_codec::{EventRecord, SpikeLayout, SpikeRecord, parse_header};
use openephys_errors::{FormatError, Result, ResultExt};
use openephys_index::{FormatVariant, IndexSpikeChannel, load_index};

use crate::catalog::Catalog;
use crate::config::PlaybackConfig;
use crate::mapped::MappedFile;

/// Name and scale of one channel of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedChannel {
    /// Channel name
    pub name: String,
    /// Volts per stored step
    pub bit_volts: f32,
}

/// One playable stream: every recording of it concatenated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// `<source id>_<stream name>`
    pub key: String,
    /// Stream name
    pub name: String,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Samples across all recordings
    pub num_samples: u64,
    /// Continuous channels in acquisition order
    pub channels: Vec<RecordedChannel>,
}

/// Decoded spikes of one electrode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeTrain {
    /// Electrode name
    pub electrode: String,
    /// Volts per step for each sub-channel
    pub bit_volts: Vec<f32>,
    /// Records in file order
    pub records: Vec<SpikeRecord>,
}

/// One line of the message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Absolute sample timestamp
    pub timestamp: i64,
    /// Message text
    pub text: String,
}

#[derive(Debug)]
struct MappedChannel {
    file: MappedFile,
    start: u64,
    bit_volts: f32,
}

#[derive(Debug)]
struct ActiveStream {
    record: usize,
    channels: Vec<MappedChannel>,
    total_samples: u64,
    total_blocks: u64,
    cursor: u64,
    events: Vec<EventRecord>,
    spike_channels: Vec<IndexSpikeChannel>,
}

impl ActiveStream {
    /// Copy `count` samples per channel starting `within` samples into block
    /// `block_index` into the interleaved `frames`.
    fn copy_block(
        &self,
        block_index: u64,
        within: usize,
        count: usize,
        frames: &mut [i16],
    ) -> Result<()> {
        let channel_count = self.channels.len();
        for (c, channel) in self.channels.iter().enumerate() {
            let block = read_block(channel.file.bytes(), channel.start, block_index)?;
            if !block.marker_intact() {
                warn!(block = block_index, channel = c, "record marker damaged");
            }
            for (frame, word) in frames
                .chunks_exact_mut(channel_count)
                .zip(block.raw_words().skip(within).take(count))
            {
                if let Some(slot) = frame.get_mut(c) {
                    *slot = word;
                }
            }
        }
        Ok(())
    }
}

/// Random-access playback of a recorded experiment.
///
/// Opening parses the index and builds the recording catalog; no channel data
/// is mapped until a stream is selected. Every recording of a stream plays as
/// one timeline, and the read cursor wraps at its end.
#[derive(Debug)]
pub struct ReaderSession {
    config: PlaybackConfig,
    index_path: PathBuf,
    catalog: Catalog,
    records: Vec<RecordInfo>,
    active: Option<ActiveStream>,
}

impl ReaderSession {
    /// Open the index at `index_path` with default options.
    pub fn open(index_path: &Path) -> Result<Self> {
        Self::open_with(index_path, PlaybackConfig::default())
    }

    /// Open the index at `index_path`.
    pub fn open_with(index_path: &Path, config: PlaybackConfig) -> Result<Self> {
        let index = load_index(index_path)?;
        let root = index_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let catalog = Catalog::build(&root, &index, &config)?;
        let records = build_records(&catalog);

        info!(
            index = ?index_path,
            records = records.len(),
            recordings = catalog.recordings.len(),
            "reader session opened"
        );
        Ok(Self {
            config,
            index_path: index_path.to_path_buf(),
            catalog,
            records,
            active: None,
        })
    }

    /// Playable streams.
    pub fn records(&self) -> &[RecordInfo] {
        &self.records
    }

    /// Recording catalog built at open.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Index shape the experiment was written in.
    pub fn variant(&self) -> FormatVariant {
        self.catalog.variant
    }

    /// Map record `index` and reset the cursor to its first sample.
    ///
    /// Mappings of the previously selected stream are released first.
    pub fn select_stream(&mut self, index: usize) -> Result<()> {
        let record = self.records.get(index).ok_or_else(|| {
            FormatError::out_of_range("record", index as u64, self.records.len() as u64)
        })?;
        self.active = None;

        let first = self
            .catalog
            .first()
            .and_then(|r| r.stream(&record.key))
            .ok_or_else(|| {
                FormatError::inconsistent(format!(
                    "stream {} missing from first recording",
                    record.key
                ))
            })?;

        let mut channels = Vec::with_capacity(first.channels.len());
        for channel in &first.channels {
            let path = self.catalog.root.join(&channel.filename);
            let file = MappedFile::open(&path)?;
            if self.config.validate_headers {
                parse_header(file.bytes())
                    .and_then(|fields| fields.validate())
                    .with_context(format!("validating {}", channel.filename))?;
            }
            channels.push(MappedChannel {
                file,
                start: channel.position,
                bit_volts: channel.bit_volts,
            });
        }

        let events = match &self.events_file(&record.key) {
            Some(name) => self.load_events(&record.key, name)?,
            None => Vec::new(),
        };

        let total_samples = record.num_samples;
        let total_blocks = total_samples / BLOCK_LENGTH as u64;
        debug!(
            stream = %record.key,
            channels = channels.len(),
            total_samples,
            total_blocks,
            events = events.len(),
            "stream selected"
        );

        self.active = Some(ActiveStream {
            record: index,
            channels,
            total_samples,
            total_blocks,
            cursor: 0,
            events,
            spike_channels: first.spike_channels.clone(),
        });
        Ok(())
    }

    /// Index of the selected record.
    pub fn active_record(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.record)
    }

    /// Samples in the selected stream across all recordings.
    pub fn total_samples(&self) -> Result<u64> {
        Ok(self.active()?.total_samples)
    }

    /// Complete blocks in the selected stream across all recordings.
    pub fn total_blocks(&self) -> Result<u64> {
        Ok(self.active()?.total_blocks)
    }

    /// Current cursor position.
    pub fn position(&self) -> Result<u64> {
        Ok(self.active()?.cursor)
    }

    /// Move the cursor to `sample`, wrapping past the end of the stream.
    pub fn seek_to(&mut self, sample: u64) -> Result<()> {
        let active = self.active_mut()?;
        active.cursor = sample.checked_rem(active.total_samples).unwrap_or(0);
        trace!(sample, cursor = active.cursor, "seek");
        Ok(())
    }

    /// Read up to `n` samples per channel into `buffer`, interleaved by
    /// channel, and return the samples per channel read.
    ///
    /// Words are returned as a little-endian reader sees them; pass them to
    /// [`convert_channel`](Self::convert_channel) for volts. The count is
    /// clamped to the end of the stream and to the buffer size; once the end
    /// is reached the cursor wraps to the first sample.
    pub fn read(&mut self, buffer: &mut [i16], n: usize) -> Result<usize> {
        let active = self.active_mut()?;
        let channel_count = active.channels.len();
        if channel_count == 0 || active.total_blocks == 0 {
            return Ok(0);
        }

        let remaining = active.total_samples.saturating_sub(active.cursor);
        let capacity = (buffer.len() / channel_count) as u64;
        let count = usize::try_from((n as u64).min(remaining).min(capacity))
            .map_err(|e| FormatError::other(format!("read size does not fit in memory: {e}")))?;

        // Rest of the current block, then whole blocks, then a partial one.
        let mut done = 0;
        while done < count {
            let sample = active.cursor + done as u64;
            let block_index = (sample / BLOCK_LENGTH as u64) % active.total_blocks;
            let within = (sample % BLOCK_LENGTH as u64) as usize;
            let take = (BLOCK_LENGTH - within).min(count - done);

            let frames = buffer
                .get_mut(done * channel_count..(done + take) * channel_count)
                .ok_or_else(|| {
                    FormatError::out_of_range("buffer sample", (done + take) as u64, capacity)
                })?;
            active.copy_block(block_index, within, take, frames)?;
            done += take;
        }

        active.cursor += count as u64;
        if active.cursor >= active.total_samples {
            trace!("end of stream reached, wrapping");
            active.cursor = 0;
        }
        Ok(count)
    }

    /// Convert channel `channel` of an interleaved `raw` buffer into volts.
    ///
    /// Returns the number of samples written to `out`.
    pub fn convert_channel(&self, raw: &[i16], channel: usize, out: &mut [f32]) -> Result<usize> {
        let active = self.active()?;
        let channel_count = active.channels.len();
        let bit_volts = active
            .channels
            .get(channel)
            .map(|c| c.bit_volts)
            .ok_or_else(|| {
                FormatError::out_of_range("channel", channel as u64, channel_count as u64)
            })?;

        let mut written = 0;
        for (slot, frame) in out.iter_mut().zip(raw.chunks_exact(channel_count)) {
            if let Some(&word) = frame.get(channel) {
                *slot = decode_raw_word(word, bit_volts);
                written += 1;
            }
        }
        Ok(written)
    }

    /// Events whose stream-local timestamp falls in
    /// `[start mod N, stop mod N]`, reported in the caller's timeline.
    ///
    /// `N` is the stream's total sample count; matches are shifted by
    /// `floor(start / N) * N`.
    pub fn events_in_range(&self, start: i64, stop: i64) -> Result<Vec<EventRecord>> {
        let active = self.active()?;
        let Ok(total) = i64::try_from(active.total_samples) else {
            return Err(FormatError::other("stream too long for event timestamps"));
        };
        if total == 0 {
            return Ok(Vec::new());
        }

        let local_start = start.rem_euclid(total);
        let local_stop = stop.rem_euclid(total);
        let shift = start.div_euclid(total).saturating_mul(total);

        Ok(active
            .events
            .iter()
            .filter(|e| (local_start..=local_stop).contains(&e.timestamp))
            .map(|e| EventRecord {
                timestamp: e.timestamp.saturating_add(shift),
                ..*e
            })
            .collect())
    }

    /// Every event of the selected stream on the concatenated timeline.
    pub fn events(&self) -> Result<&[EventRecord]> {
        Ok(&self.active()?.events)
    }

    /// Decode every spike file of the selected stream.
    pub fn read_spikes(&self) -> Result<Vec<SpikeTrain>> {
        let active = self.active()?;
        let mut trains = Vec::with_capacity(active.spike_channels.len());
        for electrode in &active.spike_channels {
            let path = self.catalog.root.join(&electrode.filename);
            let file = MappedFile::open(&path)?;
            let layout = SpikeLayout {
                num_channels: electrode.num_channels,
                samples_per_channel: electrode.num_samples,
            };
            let records = decode_spike_stream(file.bytes(), layout)
                .with_context(format!("decoding {}", electrode.filename))?;
            debug!(electrode = %electrode.name, spikes = records.len(), "spikes decoded");
            trains.push(SpikeTrain {
                electrode: electrode.name.clone(),
                bit_volts: electrode.bit_volts.clone(),
                records,
            });
        }
        Ok(trains)
    }

    /// Parse the experiment's message log.
    ///
    /// A missing log reads as empty; unparsable lines are skipped.
    pub fn read_messages(&self) -> Result<Vec<Message>> {
        let path = self
            .catalog
            .root
            .join(messages_file_name(self.catalog.experiment));
        if !path.exists() {
            debug!(path = ?path, "no message log");
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| FormatError::file_not_found(&path, e.to_string()))?;

        let mut messages = Vec::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let parsed = line
                .split_once(", ")
                .and_then(|(ts, text)| Some((ts.trim().parse::<i64>().ok()?, text)));
            match parsed {
                Some((timestamp, text)) => messages.push(Message {
                    timestamp,
                    text: text.to_owned(),
                }),
                None => warn!(line, "skipping malformed message line"),
            }
        }
        Ok(messages)
    }

    /// Release the selected stream's mappings.
    pub fn close(&mut self) {
        if self.active.take().is_some() {
            debug!(index = ?self.index_path, "stream released");
        }
    }

    fn active(&self) -> Result<&ActiveStream> {
        self.active.as_ref().ok_or(FormatError::SessionState {
            expected: "stream selected",
            actual: "no stream selected",
        })
    }

    fn active_mut(&mut self) -> Result<&mut ActiveStream> {
        self.active.as_mut().ok_or(FormatError::SessionState {
            expected: "stream selected",
            actual: "no stream selected",
        })
    }

    fn events_file(&self, key: &str) -> Option<String> {
        self.catalog
            .recordings
            .iter()
            .filter_map(|r| r.stream(key))
            .find_map(|s| s.events_file.clone())
    }

    fn load_events(&self, key: &str, name: &str) -> Result<Vec<EventRecord>> {
        let path = self.catalog.root.join(name);
        if !path.exists() {
            warn!(path = ?path, "event file listed in index is missing");
            return Ok(Vec::new());
        }
        let file = MappedFile::open(&path)?;
        let mut events = decode_events(file.bytes()).with_context(format!("decoding {name}"))?;
        for event in &mut events {
            let offset = self.catalog.event_offset(key, event.recording_number);
            event.timestamp = event.timestamp.saturating_sub(offset);
        }
        Ok(events)
    }
}

fn build_records(catalog: &Catalog) -> Vec<RecordInfo> {
    let Some(first) = catalog.first() else {
        return Vec::new();
    };
    first
        .streams
        .iter()
        .map(|stream| RecordInfo {
            key: stream.key.clone(),
            name: stream.name.clone(),
            sample_rate: stream.sample_rate,
            num_samples: catalog.total_samples(&stream.key),
            channels: stream
                .channels
                .iter()
                .map(|c| RecordedChannel {
                    name: c.name.clone(),
                    bit_volts: c.bit_volts,
                })
                .collect(),
        })
        .collect()
}
