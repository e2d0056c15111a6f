//! Fixed sizes and field offsets of the on-disk format.

/// Samples per continuous block.
pub const BLOCK_LENGTH: usize = 1024;

/// Size of the text header at the start of every data file.
pub const HEADER_SIZE: usize = 1024;

/// Size of the text header at the start of the event file.
pub const EVENT_HEADER_SIZE: usize = HEADER_SIZE;

/// Bytes per stored continuous sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Block header: `i64` timestamp, `u16` sample count, `u16` recording number.
pub const BLOCK_HEADER_SIZE: usize = 12;

/// Offset of the first-sample timestamp inside a block.
pub const BLOCK_TIMESTAMP_OFFSET: usize = 0;

/// Offset of the sample count inside a block.
pub const BLOCK_SAMPLE_COUNT_OFFSET: usize = 8;

/// Offset of the recording number inside a block.
pub const BLOCK_RECORDING_OFFSET: usize = 10;

/// Trailer written after the samples of every block.
pub const RECORD_MARKER: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 255];

/// Size of [`RECORD_MARKER`].
pub const RECORD_MARKER_SIZE: usize = RECORD_MARKER.len();

/// Payload bytes of one full block.
pub const BLOCK_DATA_SIZE: usize = BLOCK_LENGTH * BYTES_PER_SAMPLE;

/// Total bytes of one framed block (2070).
pub const BLOCK_SIZE_BYTES: usize = BLOCK_HEADER_SIZE + BLOCK_DATA_SIZE + RECORD_MARKER_SIZE;

/// Size of one event record.
pub const EVENT_RECORD_SIZE: usize = 16;

/// Fixed part of a spike record before the waveform samples.
pub const SPIKE_HEADER_SIZE: usize = 42;

/// Format name written into every text header.
pub const FORMAT_NAME: &str = "Open Ephys Data Format";

/// Format version written into every text header and the index root.
pub const VERSION_STRING: &str = "0.4";

/// Byte offset of `block_index` in a file whose first block starts at `header_offset`.
pub const fn block_offset(header_offset: u64, block_index: u64) -> u64 {
    header_offset + block_index * BLOCK_SIZE_BYTES as u64
}

/// Number of complete blocks between `header_offset` and `file_len`.
pub const fn block_count(file_len: u64, header_offset: u64) -> u64 {
    file_len.saturating_sub(header_offset) / BLOCK_SIZE_BYTES as u64
}

/// Samples stored between two byte offsets of the same channel file.
pub const fn samples_between(start: u64, end: u64) -> u64 {
    end.saturating_sub(start) / BLOCK_SIZE_BYTES as u64 * BLOCK_LENGTH as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_matches_legacy_stride() {
        assert_eq!(BLOCK_SIZE_BYTES, 2070);
        // legacy readers step in 16-bit words
        assert_eq!(BLOCK_SIZE_BYTES / 2, 1035);
        assert_eq!(HEADER_SIZE / 2 + BLOCK_RECORDING_OFFSET / 2, 517);
    }

    #[test]
    fn test_block_offset_and_count() {
        assert_eq!(block_offset(1024, 0), 1024);
        assert_eq!(block_offset(1024, 3), 1024 + 3 * 2070);
        assert_eq!(block_count(1024 + 2 * 2070, 1024), 2);
        assert_eq!(block_count(1024 + 2 * 2070 + 100, 1024), 2);
        assert_eq!(block_count(10, 1024), 0);
    }

    #[test]
    fn test_samples_between() {
        assert_eq!(samples_between(1024, 1024 + 2 * 2070), 2048);
        assert_eq!(samples_between(5000, 1024), 0);
    }
}
