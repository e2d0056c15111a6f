//! Continuous block codec.
//!
//! A block is framed as:
//!
//! ```text
//! | i64 LE timestamp | u16 LE sample count | u16 LE recording | 1024 x i16 BE | marker (10) |
//! ```
//!
//! Samples are scaled by the channel's `bit_volts` before quantization. The
//! big-endian sample order is a fixed property of the files and does not
//! depend on the host.

use openephys_errors::{FormatError, Result};
use serde::{Deserialize, Serialize};

use crate::bytes::{ByteReader, ByteWriter};
use crate::layout::{
    BLOCK_DATA_SIZE, BLOCK_HEADER_SIZE, BLOCK_LENGTH, BLOCK_SIZE_BYTES, BYTES_PER_SAMPLE,
    RECORD_MARKER, block_count, block_offset,
};

/// Largest magnitude of a stored sample.
pub const SAMPLE_FULL_SCALE: f32 = 32767.0;

/// Quantize one sample to the stored integer value.
///
/// The sample is normalized by `32767 * bit_volts`, clamped to `[-1, 1]` and
/// rescaled to the 16-bit range, so the effective quantum is `bit_volts`.
pub fn encode_sample(sample: f32, bit_volts: f32) -> i16 {
    let normalized = (sample / (SAMPLE_FULL_SCALE * bit_volts)).clamp(-1.0, 1.0);
    (normalized * SAMPLE_FULL_SCALE).round() as i16
}

/// Quantize one sample to its on-disk big-endian bytes.
pub fn encode_sample_bytes(sample: f32, bit_volts: f32) -> [u8; BYTES_PER_SAMPLE] {
    encode_sample(sample, bit_volts).to_be_bytes()
}

/// Scale a stored integer sample back to volts.
pub fn decode_sample(value: i16, bit_volts: f32) -> f32 {
    f32::from(value) * bit_volts
}

/// Read the on-disk bytes of one sample the way a native little-endian reader does.
///
/// Raw words are what [`ContinuousBlock::raw_words`] yields; they still carry
/// swapped bytes and must go through [`decode_raw_word`].
pub fn raw_word(bytes: [u8; BYTES_PER_SAMPLE]) -> i16 {
    i16::from_le_bytes(bytes)
}

/// Swap a raw word back to the stored value and scale it to volts.
pub fn decode_raw_word(raw: i16, bit_volts: f32) -> f32 {
    decode_sample(raw.swap_bytes(), bit_volts)
}

/// Encode `samples` as big-endian words appended to `out`.
pub fn encode_samples_into(samples: &[f32], bit_volts: f32, out: &mut Vec<u8>) {
    out.reserve(samples.len().saturating_mul(BYTES_PER_SAMPLE));
    for &sample in samples {
        out.extend_from_slice(&encode_sample_bytes(sample, bit_volts));
    }
}

/// Header at the start of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Absolute timestamp (sample number) of the first sample.
    pub timestamp: i64,
    /// Sample count; always the block capacity, including for a padded last block.
    pub sample_count: u16,
    /// Zero-based recording number the block belongs to.
    pub recording_number: u16,
}

impl BlockHeader {
    /// Header for a full block.
    pub fn new(timestamp: i64, recording_number: u16) -> Self {
        Self {
            timestamp,
            sample_count: BLOCK_LENGTH as u16,
            recording_number,
        }
    }

    /// Encode to the 12 on-disk bytes.
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut out = [0u8; BLOCK_HEADER_SIZE];
        let mut writer = ByteWriter::with_capacity(BLOCK_HEADER_SIZE);
        writer
            .write_i64_le(self.timestamp)
            .write_u16_le(self.sample_count)
            .write_u16_le(self.recording_number);
        out.copy_from_slice(writer.as_slice());
        out
    }

    /// Decode from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes, "block header");
        Ok(Self {
            timestamp: reader.read_i64_le()?,
            sample_count: reader.read_u16_le()?,
            recording_number: reader.read_u16_le()?,
        })
    }
}

/// Encode a complete framed block.
///
/// Fewer than [`BLOCK_LENGTH`] samples are zero-padded to capacity.
pub fn encode_block(header: &BlockHeader, samples: &[f32], bit_volts: f32) -> Result<Vec<u8>> {
    if samples.len() > BLOCK_LENGTH {
        return Err(FormatError::out_of_range(
            "block sample",
            samples.len() as u64,
            BLOCK_LENGTH as u64 + 1,
        ));
    }

    let mut out = Vec::with_capacity(BLOCK_SIZE_BYTES);
    out.extend_from_slice(&header.to_bytes());
    encode_samples_into(samples, bit_volts, &mut out);
    let padding = BLOCK_LENGTH.saturating_sub(samples.len()) * BYTES_PER_SAMPLE;
    out.resize(out.len() + padding, 0);
    out.extend_from_slice(&RECORD_MARKER);
    Ok(out)
}

/// Zero-copy view of one framed block.
#[derive(Debug, Clone, Copy)]
pub struct ContinuousBlock<'a> {
    /// Decoded block header.
    pub header: BlockHeader,
    data: &'a [u8],
    marker: &'a [u8],
}

impl<'a> ContinuousBlock<'a> {
    /// Parse a block from exactly [`BLOCK_SIZE_BYTES`] bytes.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() != BLOCK_SIZE_BYTES {
            return Err(FormatError::malformed(
                "continuous block",
                BLOCK_SIZE_BYTES,
                bytes.len(),
            ));
        }
        let mut reader = ByteReader::new(bytes, "continuous block");
        let header = BlockHeader::parse(reader.read_bytes(BLOCK_HEADER_SIZE)?)?;
        let data = reader.read_bytes(BLOCK_DATA_SIZE)?;
        let marker = reader.read_bytes(RECORD_MARKER.len())?;
        Ok(Self {
            header,
            data,
            marker,
        })
    }

    /// True when the trailing record marker is intact.
    pub fn marker_intact(&self) -> bool {
        self.marker == RECORD_MARKER
    }

    /// Stored sample values in order.
    pub fn samples(&self) -> impl Iterator<Item = i16> + 'a {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_be_bytes(word_bytes(pair)))
    }

    /// Raw words as a native little-endian reader sees them.
    pub fn raw_words(&self) -> impl Iterator<Item = i16> + 'a {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| raw_word(word_bytes(pair)))
    }

    /// Stored value of sample `index`.
    pub fn sample(&self, index: usize) -> Option<i16> {
        let start = index.checked_mul(BYTES_PER_SAMPLE)?;
        let pair = self.data.get(start..start.checked_add(BYTES_PER_SAMPLE)?)?;
        Some(i16::from_be_bytes(word_bytes(pair)))
    }

    /// Decode every sample to volts into `out`, returning the count written.
    pub fn decode_into(&self, bit_volts: f32, out: &mut [f32]) -> usize {
        let mut written = 0;
        for (slot, value) in out.iter_mut().zip(self.samples()) {
            *slot = decode_sample(value, bit_volts);
            written += 1;
        }
        written
    }
}

fn word_bytes(pair: &[u8]) -> [u8; BYTES_PER_SAMPLE] {
    let mut out = [0u8; BYTES_PER_SAMPLE];
    for (dst, src) in out.iter_mut().zip(pair) {
        *dst = *src;
    }
    out
}

/// Locate block `block_index` in a channel file mapped as `data`.
///
/// `header_offset` is the byte offset of the first block. Fails with
/// [`FormatError::OutOfRange`] when the index is past the last complete block.
pub fn read_block(
    data: &[u8],
    header_offset: u64,
    block_index: u64,
) -> Result<ContinuousBlock<'_>> {
    let total = block_count(data.len() as u64, header_offset);
    if block_index >= total {
        return Err(FormatError::out_of_range("block", block_index, total));
    }
    let start = usize::try_from(block_offset(header_offset, block_index))
        .map_err(|e| FormatError::other(format!("block offset does not fit in memory: {e}")))?;
    let bytes = data
        .get(start..start + BLOCK_SIZE_BYTES)
        .ok_or_else(|| FormatError::out_of_range("block", block_index, total))?;
    ContinuousBlock::parse(bytes)
}
