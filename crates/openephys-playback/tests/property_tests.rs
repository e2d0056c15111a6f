//! Property tests for cursor arithmetic and sample values over written recordings.

use openephys_playback::{FormatError, ReaderSession};
use openephys_recorder::{
    ContinuousChannel, RecorderConfig, RecordingLayout, StreamDescriptor, WriterSession,
};
use proptest::prelude::*;

const TOTAL: usize = 3 * 1024;
const GAIN: f32 = 0.5;

fn fixture() -> Result<(tempfile::TempDir, Vec<i16>), FormatError> {
    let dir = tempfile::tempdir()?;
    let layout = RecordingLayout {
        streams: vec![StreamDescriptor {
            source_node_id: 7,
            source_node_name: "Source".into(),
            name: "s".into(),
            sample_rate: 1000.0,
            continuous: vec![ContinuousChannel::new("A", 1.0), ContinuousChannel::new("B", 1.0)],
            spikes: Vec::new(),
        }],
    };
    let session = WriterSession::new();
    session.open(RecorderConfig::new(dir.path()).with_date("01-Jan-2026 000000"), &layout)?;
    let a: Vec<f32> = (0..TOTAL).map(|i| (i % 3000) as f32).collect();
    let b: Vec<f32> = (0..TOTAL).map(|i| -((i % 3000) as f32)).collect();
    session.write_continuous(0, &a, 0, None)?;
    session.write_continuous(1, &b, 0, None)?;
    session.close()?;

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    reader.select_stream(0)?;
    let mut all = vec![0i16; 2 * TOTAL];
    reader.read(&mut all, TOTAL)?;
    Ok((dir, all))
}

/// Write `values` to a one-channel stream in chunks of `cuts` (cycled) and
/// read every stored sample back in volts.
fn chunked_round_trip(values: &[f32], cuts: &[usize]) -> Result<Vec<f32>, FormatError> {
    let dir = tempfile::tempdir()?;
    let layout = RecordingLayout {
        streams: vec![StreamDescriptor {
            source_node_id: 9,
            source_node_name: "Source".into(),
            name: "chunks".into(),
            sample_rate: 1000.0,
            continuous: vec![ContinuousChannel::new("A", GAIN)],
            spikes: Vec::new(),
        }],
    };
    let session = WriterSession::new();
    session.open(RecorderConfig::new(dir.path()).with_date("01-Jan-2026 000000"), &layout)?;
    let mut written = 0;
    for &cut in cuts.iter().cycle() {
        if written >= values.len() {
            break;
        }
        let end = (written + cut).min(values.len());
        session.write_continuous(0, &values[written..end], written as i64, None)?;
        written = end;
    }
    session.close()?;

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    reader.select_stream(0)?;
    let total = usize::try_from(reader.total_samples()?)
        .map_err(|e| FormatError::other(e.to_string()))?;
    let mut raw = vec![0i16; total];
    let read = reader.read(&mut raw, total)?;
    let mut volts = vec![0.0f32; read];
    reader.convert_channel(&raw[..read], 0, &mut volts)?;
    Ok(volts)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_chunking_preserves_sample_values(
        values in prop::collection::vec(-1500.0f32..1500.0, 1..4000),
        cuts in prop::collection::vec(1usize..1500, 1..8),
    ) {
        let volts = chunked_round_trip(&values, &cuts)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(volts.len(), values.len().div_ceil(1024) * 1024);
        for (got, want) in volts.iter().zip(&values) {
            prop_assert!((got - want).abs() <= GAIN / 2.0 + 1e-3, "{} vs {}", got, want);
        }
        for padded in &volts[values.len()..] {
            prop_assert_eq!(*padded, 0.0);
        }
    }

    #[test]
    fn prop_chunked_reads_match_single_read(
        chunks in prop::collection::vec(1usize..1500, 1..8),
        start in 0usize..TOTAL,
        loops in 0u64..3,
    ) {
        let (dir, all) = fixture().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        reader.select_stream(0).map_err(|e| TestCaseError::fail(e.to_string()))?;
        reader
            .seek_to(loops * TOTAL as u64 + start as u64)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut expected_pos = start;
        for len in chunks {
            let mut buf = vec![0i16; 2 * len];
            let read = reader
                .read(&mut buf, len)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(read, len.min(TOTAL - expected_pos));
            prop_assert_eq!(&buf[..2 * read], &all[2 * expected_pos..2 * (expected_pos + read)]);
            expected_pos = (expected_pos + read) % TOTAL;
        }
    }
}
