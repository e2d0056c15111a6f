//! Start-timestamp probing for indexes that do not record it.
//!
//! Legacy indexes only store each channel's byte position. The recording's
//! first timestamp is recovered from the first block whose recording number
//! matches: the block at the indexed position is tried first, then the file
//! is scanned from its first block with a fixed block stride.

use tracing::{debug, warn};

use openephys_codec::BlockHeader;
use openephys_codec::layout::{BLOCK_HEADER_SIZE, BLOCK_SIZE_BYTES, HEADER_SIZE};
use openephys_errors::{FormatError, Result};

fn header_at(data: &[u8], offset: u64) -> Option<BlockHeader> {
    let start = usize::try_from(offset).ok()?;
    let bytes = data.get(start..start.checked_add(BLOCK_HEADER_SIZE)?)?;
    BlockHeader::parse(bytes).ok()
}

/// Find the first timestamp of index recording `recording` (one-based) in a
/// continuous file mapped as `data`.
///
/// With `strict` set, a recording number sequence that goes backwards or a
/// recording that cannot be found is [`FormatError::IndexInconsistent`].
/// Otherwise the scan stops with a warning and the block at `position` is
/// used.
pub fn probe_start_timestamp(
    data: &[u8],
    position: u64,
    recording: u32,
    strict: bool,
) -> Result<i64> {
    let target = recording.saturating_sub(1);

    let at_position = header_at(data, position);
    if let Some(header) = at_position
        && u32::from(header.recording_number) == target
    {
        return Ok(header.timestamp);
    }

    debug!(position, recording, "start block not at indexed position, scanning");
    let mut offset = HEADER_SIZE as u64;
    let mut previous: Option<u16> = None;
    let failure = loop {
        let Some(header) = header_at(data, offset) else {
            break format!("recording {recording} not found in file");
        };
        if previous.is_some_and(|p| header.recording_number < p) {
            break format!(
                "recording numbers decrease at byte {offset} ({} after {})",
                header.recording_number,
                previous.unwrap_or_default()
            );
        }
        match u32::from(header.recording_number).cmp(&target) {
            std::cmp::Ordering::Equal => return Ok(header.timestamp),
            std::cmp::Ordering::Greater => {
                break format!(
                    "recording {recording} missing, found {} first",
                    u32::from(header.recording_number) + 1
                );
            }
            std::cmp::Ordering::Less => {}
        }
        previous = Some(header.recording_number);
        offset = offset.saturating_add(BLOCK_SIZE_BYTES as u64);
    };

    if strict {
        return Err(FormatError::inconsistent(failure));
    }
    match at_position {
        Some(header) => {
            warn!(
                recording,
                position,
                reason = %failure,
                "probe failed, using the block at the indexed position"
            );
            Ok(header.timestamp)
        }
        None => Err(FormatError::inconsistent(format!(
            "{failure}; no block at indexed position {position}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openephys_codec::continuous::encode_block;

    fn file_with(blocks: &[(i64, u16)]) -> Result<Vec<u8>> {
        let mut data = vec![b' '; HEADER_SIZE];
        for &(timestamp, recording) in blocks {
            data.extend(encode_block(&BlockHeader::new(timestamp, recording), &[], 1.0)?);
        }
        Ok(data)
    }

    fn position(block: u64) -> u64 {
        HEADER_SIZE as u64 + block * BLOCK_SIZE_BYTES as u64
    }

    #[test]
    fn test_block_at_position_matches() -> Result<()> {
        let data = file_with(&[(0, 0), (1024, 0), (9000, 1)])?;
        assert_eq!(probe_start_timestamp(&data, position(2), 2, true)?, 9000);
        Ok(())
    }

    #[test]
    fn test_scan_finds_recording() -> Result<()> {
        let data = file_with(&[(0, 0), (1024, 0), (9000, 1), (10024, 1)])?;
        // Position points at the wrong block; the scan recovers it.
        assert_eq!(probe_start_timestamp(&data, position(0), 2, true)?, 9000);
        Ok(())
    }

    #[test]
    fn test_decreasing_numbers_are_rejected_when_strict() -> Result<()> {
        let data = file_with(&[(0, 0), (5000, 2), (1024, 0), (9000, 1)])?;
        let result = probe_start_timestamp(&data, position(0), 2, true);
        assert!(matches!(result, Err(FormatError::IndexInconsistent(_))));
        Ok(())
    }

    #[test]
    fn test_lenient_probe_falls_back_to_position() -> Result<()> {
        let data = file_with(&[(0, 0), (3000, 2), (1024, 0)])?;
        assert_eq!(probe_start_timestamp(&data, position(1), 2, false)?, 3000);
        Ok(())
    }

    #[test]
    fn test_position_outside_file() -> Result<()> {
        let data = file_with(&[(0, 0)])?;
        let result = probe_start_timestamp(&data, position(5), 3, false);
        assert!(matches!(result, Err(FormatError::IndexInconsistent(_))));
        Ok(())
    }
}
