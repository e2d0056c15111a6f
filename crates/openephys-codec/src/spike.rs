//! Variable-length spike records.
//!
//! The record does not describe its own shape: channel and sample counts come
//! from the electrode's index entry and are passed in as a [`SpikeLayout`].

use openephys_errors::{FormatError, Result};
use serde::{Deserialize, Serialize};

use crate::bytes::{ByteReader, ByteWriter};
use crate::layout::{HEADER_SIZE, SPIKE_HEADER_SIZE};

/// Offset applied to spike samples to store them unsigned.
pub const SPIKE_SAMPLE_OFFSET: f32 = 32768.0;

/// Shape of every record in one spike file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeLayout {
    /// Sub-channels per electrode
    pub num_channels: u16,
    /// Samples per sub-channel waveform
    pub samples_per_channel: u16,
}

impl SpikeLayout {
    /// Total waveform samples per record.
    pub fn total_samples(&self) -> usize {
        usize::from(self.num_channels) * usize::from(self.samples_per_channel)
    }

    /// Encoded size of one record, trailing recording number included.
    pub fn record_size(&self) -> usize {
        let channels = usize::from(self.num_channels);
        SPIKE_HEADER_SIZE + self.total_samples() * 2 + channels * 4 + channels * 2 + 2
    }
}

/// Static description of a spike electrode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeChannelMeta {
    /// Electrode index written into every record
    pub electrode_index: u16,
    /// Channel type code written as the first record byte
    pub channel_type: u8,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Volts per step for each sub-channel
    pub channel_bit_volts: Vec<f32>,
    /// Samples per sub-channel waveform
    pub samples_per_channel: u16,
}

impl SpikeChannelMeta {
    /// Record shape for this electrode.
    pub fn layout(&self) -> SpikeLayout {
        SpikeLayout {
            num_channels: u16::try_from(self.channel_bit_volts.len()).unwrap_or(u16::MAX),
            samples_per_channel: self.samples_per_channel,
        }
    }
}

/// One spike as handed to the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    /// Absolute sample timestamp of the waveform start
    pub timestamp: i64,
    /// Source node id
    pub source_id: u16,
    /// Sorted unit id, 0 when unsorted
    pub sorted_id: u16,
    /// Waveform in volts, channel-major (`num_channels * samples_per_channel`)
    pub waveform: Vec<f32>,
    /// Detection threshold per sub-channel
    pub thresholds: Vec<i16>,
}

/// One decoded spike record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeRecord {
    /// Channel type code
    pub event_type: u8,
    /// Absolute sample timestamp
    pub timestamp: i64,
    /// Legacy software timestamp, written as 0
    pub software_timestamp: i64,
    /// Source node id
    pub source_id: u16,
    /// Sub-channel count stored in the record
    pub num_channels: u16,
    /// Samples per sub-channel stored in the record
    pub num_samples: u16,
    /// Sorted unit id
    pub sorted_id: u16,
    /// Electrode index
    pub electrode_index: u16,
    /// Legacy channel field
    pub channel: u16,
    /// Legacy color bytes
    pub color: [u8; 3],
    /// Legacy component projections
    pub projections: [f32; 2],
    /// Sample rate truncated to an integer
    pub sample_rate: u16,
    /// Offset-binary waveform samples, channel-major
    pub samples: Vec<u16>,
    /// Legacy fixed-point gain per sub-channel
    pub gains: Vec<f32>,
    /// Threshold per sub-channel
    pub thresholds: Vec<i16>,
    /// Zero-based recording number
    pub recording_number: u16,
}

impl SpikeRecord {
    /// Waveform in volts given the electrode's per-channel scale.
    ///
    /// Sub-channels without a scale in `bit_volts` decode with a scale of 1.
    pub fn waveform_volts(&self, bit_volts: &[f32]) -> Vec<f32> {
        let per_channel = usize::from(self.num_samples).max(1);
        self.samples
            .iter()
            .enumerate()
            .map(|(i, &raw)| {
                let scale = bit_volts.get(i / per_channel).copied().unwrap_or(1.0);
                (f32::from(raw) - SPIKE_SAMPLE_OFFSET) * scale
            })
            .collect()
    }
}

/// Quantize one spike sample to offset-binary.
pub fn quantize_spike_sample(volts: f32, bit_volts: f32) -> u16 {
    let value = (volts / bit_volts).round() + SPIKE_SAMPLE_OFFSET;
    value.clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Legacy fixed-point gain field for one sub-channel.
pub fn legacy_gain_field(bit_volts: f32) -> f32 {
    (1.0 / bit_volts * 1000.0).round()
}

/// Encode one spike record for `meta`.
pub fn encode_spike(
    meta: &SpikeChannelMeta,
    spike: &SpikeEvent,
    recording_number: u16,
) -> Result<Vec<u8>> {
    let layout = meta.layout();
    let channels = usize::from(layout.num_channels);
    if spike.waveform.len() != layout.total_samples() {
        return Err(FormatError::malformed(
            "spike waveform",
            layout.total_samples(),
            spike.waveform.len(),
        ));
    }
    if spike.thresholds.len() != channels {
        return Err(FormatError::malformed(
            "spike thresholds",
            channels,
            spike.thresholds.len(),
        ));
    }

    let mut writer = ByteWriter::with_capacity(layout.record_size());
    writer
        .write_u8(meta.channel_type)
        .write_i64_le(spike.timestamp)
        .write_i64_le(0)
        .write_u16_le(spike.source_id)
        .write_u16_le(layout.num_channels)
        .write_u16_le(layout.samples_per_channel)
        .write_u16_le(spike.sorted_id)
        .write_u16_le(meta.electrode_index)
        .write_u16_le(0)
        .write_zeros(3)
        .write_zeros(8)
        .write_u16_le(meta.sample_rate as u16);

    let per_channel = usize::from(layout.samples_per_channel);
    for (channel, &bit_volts) in meta.channel_bit_volts.iter().enumerate() {
        let start = channel * per_channel;
        let waveform = spike
            .waveform
            .get(start..start + per_channel)
            .unwrap_or_default();
        for &volts in waveform {
            writer.write_u16_le(quantize_spike_sample(volts, bit_volts));
        }
    }
    for &bit_volts in &meta.channel_bit_volts {
        writer.write_f32_le(legacy_gain_field(bit_volts));
    }
    for &threshold in &spike.thresholds {
        writer.write_i16_le(threshold);
    }
    writer.write_u16_le(recording_number);

    Ok(writer.into_inner())
}

/// Decode one record of exactly `layout.record_size()` bytes.
pub fn decode_spike(bytes: &[u8], layout: SpikeLayout) -> Result<SpikeRecord> {
    if bytes.len() != layout.record_size() {
        return Err(FormatError::malformed(
            "spike record",
            layout.record_size(),
            bytes.len(),
        ));
    }
    let mut reader = ByteReader::new(bytes, "spike record");
    let event_type = reader.read_u8()?;
    let timestamp = reader.read_i64_le()?;
    let software_timestamp = reader.read_i64_le()?;
    let source_id = reader.read_u16_le()?;
    let num_channels = reader.read_u16_le()?;
    let num_samples = reader.read_u16_le()?;
    let sorted_id = reader.read_u16_le()?;
    let electrode_index = reader.read_u16_le()?;
    let channel = reader.read_u16_le()?;
    let color = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
    let projections = [reader.read_f32_le()?, reader.read_f32_le()?];
    let sample_rate = reader.read_u16_le()?;

    let samples = (0..layout.total_samples())
        .map(|_| reader.read_u16_le())
        .collect::<Result<Vec<_>>>()?;
    let gains = (0..layout.num_channels)
        .map(|_| reader.read_f32_le())
        .collect::<Result<Vec<_>>>()?;
    let thresholds = (0..layout.num_channels)
        .map(|_| reader.read_i16_le())
        .collect::<Result<Vec<_>>>()?;
    let recording_number = reader.read_u16_le()?;

    Ok(SpikeRecord {
        event_type,
        timestamp,
        software_timestamp,
        source_id,
        num_channels,
        num_samples,
        sorted_id,
        electrode_index,
        channel,
        color,
        projections,
        sample_rate,
        samples,
        gains,
        thresholds,
        recording_number,
    })
}

/// Decode every complete record of a spike file, header included in `file`.
pub fn decode_spike_stream(file: &[u8], layout: SpikeLayout) -> Result<Vec<SpikeRecord>> {
    let body = file.get(HEADER_SIZE..).unwrap_or_default();
    body.chunks_exact(layout.record_size())
        .map(|chunk| decode_spike(chunk, layout))
        .collect()
}
