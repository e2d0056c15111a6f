//! 16-byte event records.

use openephys_errors::{FormatError, Result};
use serde::{Deserialize, Serialize};

use crate::bytes::{ByteReader, ByteWriter};
use crate::layout::{EVENT_HEADER_SIZE, EVENT_RECORD_SIZE};

/// Event type code for TTL transitions.
pub const TTL_EVENT: u8 = 3;

/// Event type code for text messages.
pub const MESSAGE_EVENT: u8 = 5;

/// One decoded event record.
///
/// ```text
/// | i64 timestamp | i16 sample position | u8 type | u8 source | u8 state | u8 line | u16 recording |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRecord {
    /// Absolute sample timestamp
    pub timestamp: i64,
    /// Legacy in-block sample position, always written as 0
    pub sample_position: i16,
    /// Event type code
    pub event_type: u8,
    /// Source node id (truncated to one byte)
    pub source_id: u8,
    /// TTL state, 1 for rising and 0 for falling
    pub state: u8,
    /// TTL line
    pub line: u8,
    /// Zero-based recording number
    pub recording_number: u16,
}

impl EventRecord {
    /// Build a TTL event record.
    pub fn ttl(timestamp: i64, source_id: u8, line: u8, state: bool, recording_number: u16) -> Self {
        Self {
            timestamp,
            sample_position: 0,
            event_type: TTL_EVENT,
            source_id,
            state: u8::from(state),
            line,
            recording_number,
        }
    }

    /// True for TTL records.
    pub fn is_ttl(&self) -> bool {
        self.event_type == TTL_EVENT
    }

    /// Encode to exactly [`EVENT_RECORD_SIZE`] bytes.
    pub fn encode(&self) -> [u8; EVENT_RECORD_SIZE] {
        let mut writer = ByteWriter::with_capacity(EVENT_RECORD_SIZE);
        writer
            .write_i64_le(self.timestamp)
            .write_i16_le(self.sample_position)
            .write_u8(self.event_type)
            .write_u8(self.source_id)
            .write_u8(self.state)
            .write_u8(self.line)
            .write_u16_le(self.recording_number);
        let mut out = [0u8; EVENT_RECORD_SIZE];
        out.copy_from_slice(writer.as_slice());
        out
    }

    /// Decode one record; the buffer must be exactly [`EVENT_RECORD_SIZE`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != EVENT_RECORD_SIZE {
            return Err(FormatError::malformed(
                "event record",
                EVENT_RECORD_SIZE,
                bytes.len(),
            ));
        }
        let mut reader = ByteReader::new(bytes, "event record");
        Ok(Self {
            timestamp: reader.read_i64_le()?,
            sample_position: reader.read_i16_le()?,
            event_type: reader.read_u8()?,
            source_id: reader.read_u8()?,
            state: reader.read_u8()?,
            line: reader.read_u8()?,
            recording_number: reader.read_u16_le()?,
        })
    }
}

/// Decode every complete record of an event file, header included in `file`.
///
/// A trailing partial record (a torn final write) is ignored.
pub fn decode_events(file: &[u8]) -> Result<Vec<EventRecord>> {
    let body = file.get(EVENT_HEADER_SIZE..).unwrap_or_default();
    body.chunks_exact(EVENT_RECORD_SIZE)
        .map(EventRecord::decode)
        .collect()
}
