//! Playback of recordings produced by the writer session.

use std::fs;
use std::path::Path;

use openephys_codec::layout::{BLOCK_SIZE_BYTES, HEADER_SIZE};
use openephys_codec::{SpikeChannelMeta, SpikeEvent};
use openephys_index::{FormatVariant, load_index, write_index};
use openephys_playback::{FormatError, PlaybackConfig, ReaderSession, Result};
use openephys_recorder::{
    ContinuousChannel, EventPacket, RecorderConfig, RecordingLayout, SpikeChannel,
    StreamDescriptor, WriterSession,
};

const GAIN: f32 = 0.195;

fn layout() -> RecordingLayout {
    RecordingLayout {
        streams: vec![StreamDescriptor {
            source_node_id: 100,
            source_node_name: "Acquisition Board".into(),
            name: "example_data".into(),
            sample_rate: 30000.0,
            continuous: vec![
                ContinuousChannel::new("CH1", GAIN),
                ContinuousChannel::new("CH2", GAIN),
            ],
            spikes: vec![SpikeChannel {
                name: "Tetrode 1".into(),
                meta: SpikeChannelMeta {
                    electrode_index: 0,
                    channel_type: 0,
                    sample_rate: 30000.0,
                    channel_bit_volts: vec![GAIN],
                    samples_per_channel: 8,
                },
            }],
        }],
    }
}

fn steps(start: usize, len: usize) -> Vec<f32> {
    (start..start + len)
        .map(|i| (i % 1000) as f32 * GAIN)
        .collect()
}

/// Record `len` samples per channel starting at absolute sample `first`.
fn record(root: &Path, recording: u16, first: i64, values_from: usize, len: usize) -> Result<()> {
    let session = WriterSession::new();
    session.open(
        RecorderConfig::new(root)
            .with_recording(recording)
            .with_date("19-Oct-2026 120000"),
        &layout(),
    )?;
    session.write_continuous(0, &steps(values_from, len), first, None)?;
    session.write_continuous(1, &steps(values_from + 500, len), first, None)?;
    session.close()?;
    Ok(())
}

#[test]
fn test_two_block_example_reads_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 2048)?;

    let size = fs::metadata(dir.path().join("100_example-data_CH1.continuous"))?.len();
    assert_eq!(size as usize, HEADER_SIZE + 2 * (8 + 2 + 2 + 2048 + 10));
    assert_eq!(size as usize, HEADER_SIZE + 2 * BLOCK_SIZE_BYTES);

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    assert_eq!(reader.variant(), FormatVariant::Stamped);
    assert_eq!(reader.records().len(), 1);
    assert_eq!(reader.records()[0].num_samples, 2048);
    assert_eq!(reader.records()[0].channels[1].name, "CH2");

    reader.select_stream(0)?;
    assert_eq!(reader.total_blocks()?, 2);

    let mut raw = vec![0i16; 2 * 2048];
    assert_eq!(reader.read(&mut raw, 2048)?, 2048);

    let mut ch1 = vec![0.0f32; 2048];
    let mut ch2 = vec![0.0f32; 2048];
    assert_eq!(reader.convert_channel(&raw, 0, &mut ch1)?, 2048);
    assert_eq!(reader.convert_channel(&raw, 1, &mut ch2)?, 2048);

    for (got, want) in ch1.iter().zip(steps(0, 2048)) {
        assert!((got - want).abs() <= GAIN / 2.0);
    }
    for (got, want) in ch2.iter().zip(steps(500, 2048)) {
        assert!((got - want).abs() <= GAIN / 2.0);
    }
    Ok(())
}

#[test]
fn test_read_clamps_and_wraps() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 2048)?;
    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    reader.select_stream(0)?;

    reader.seek_to(2000)?;
    let mut raw = vec![0i16; 2 * 100];
    assert_eq!(reader.read(&mut raw, 100)?, 48);
    assert_eq!(reader.position()?, 0);

    // The buffer bounds the count as well.
    let mut small = vec![0i16; 2 * 10];
    assert_eq!(reader.read(&mut small, 100)?, 10);
    assert_eq!(reader.position()?, 10);
    Ok(())
}

#[test]
fn test_seek_wraps_around_total() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 2048)?;
    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    reader.select_stream(0)?;

    for k in [0u64, 1, 1023, 1024, 2047] {
        let mut direct = vec![0i16; 2 * 16];
        let mut wrapped = vec![0i16; 2 * 16];

        reader.seek_to(k)?;
        let first = reader.read(&mut direct, 16)?;
        reader.seek_to(2048 + k)?;
        let second = reader.read(&mut wrapped, 16)?;

        assert_eq!(first, second);
        assert_eq!(direct, wrapped);
    }
    Ok(())
}

#[test]
fn test_recordings_are_concatenated() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 2048)?;
    record(dir.path(), 1, 10_000, 300, 1024)?;

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    assert_eq!(reader.records()[0].num_samples, 3072);
    let catalog = reader.catalog();
    assert_eq!(catalog.recordings.len(), 2);
    assert_eq!(catalog.recordings[0].streams[0].sample_count, 2048);
    assert_eq!(catalog.recordings[1].streams[0].sample_count, 1024);
    assert_eq!(catalog.recordings[1].streams[0].start_timestamp, 10_000);

    reader.select_stream(0)?;
    reader.seek_to(2048)?;
    let mut raw = vec![0i16; 2];
    assert_eq!(reader.read(&mut raw, 1)?, 1);
    let mut volts = [0.0f32; 1];
    reader.convert_channel(&raw, 0, &mut volts)?;
    assert!((volts[0] - 300.0 * GAIN).abs() <= GAIN / 2.0);
    Ok(())
}

#[test]
fn test_event_timestamps_skip_recording_gaps() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let session = WriterSession::new();
    let config = |recording| {
        RecorderConfig::new(dir.path())
            .with_recording(recording)
            .with_date("19-Oct-2026 120000")
    };

    session.open(config(0), &layout())?;
    session.write_continuous(0, &steps(0, 2048), 0, None)?;
    session.write_continuous(1, &steps(0, 2048), 0, None)?;
    session.write_event(&EventPacket::Ttl {
        timestamp: 100,
        source_id: 100,
        line: 1,
        state: true,
    })?;
    session.close()?;

    session.open(config(1), &layout())?;
    session.write_continuous(0, &steps(0, 1024), 10_000, None)?;
    session.write_continuous(1, &steps(0, 1024), 10_000, None)?;
    session.write_event(&EventPacket::Ttl {
        timestamp: 10_100,
        source_id: 100,
        line: 2,
        state: false,
    })?;
    session.close()?;

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    reader.select_stream(0)?;
    assert_eq!(reader.events()?.len(), 2);

    let hits = reader.events_in_range(2100, 2200)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].timestamp, 2148);
    assert_eq!(hits[0].line, 2);
    assert_eq!(hits[0].state, 0);

    // One full loop later the same event is reported shifted by the total.
    let looped = reader.events_in_range(3072 + 2100, 3072 + 2200)?;
    assert_eq!(looped.len(), 1);
    assert_eq!(looped[0].timestamp, 3072 + 2148);

    let early = reader.events_in_range(0, 200)?;
    assert_eq!(early.len(), 1);
    assert_eq!(early[0].timestamp, 100);
    Ok(())
}

#[test]
fn test_spikes_and_messages() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = WriterSession::new();
    session.open(
        RecorderConfig::new(dir.path()).with_date("19-Oct-2026 120000"),
        &layout(),
    )?;
    session.write_continuous(0, &steps(0, 1024), 0, None)?;
    session.write_continuous(1, &steps(0, 1024), 0, None)?;
    session.write_spike(
        0,
        &SpikeEvent {
            timestamp: 512,
            source_id: 100,
            sorted_id: 3,
            waveform: vec![GAIN * 4.0; 8],
            thresholds: vec![-40],
        },
    )?;
    session.write_message(0, "recording started")?;
    session.write_message(900, "note, with a comma")?;
    session.close()?;

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    let messages = reader.read_messages()?;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].timestamp, 900);
    assert_eq!(messages[1].text, "note, with a comma");

    reader.select_stream(0)?;
    let trains = reader.read_spikes()?;
    assert_eq!(trains.len(), 1);
    assert_eq!(trains[0].electrode, "Tetrode 1");
    assert_eq!(trains[0].records.len(), 1);

    let spike = &trains[0].records[0];
    assert_eq!(spike.timestamp, 512);
    assert_eq!(spike.sorted_id, 3);
    for volts in spike.waveform_volts(&trains[0].bit_volts) {
        assert!((volts - GAIN * 4.0).abs() <= GAIN / 2.0);
    }
    Ok(())
}

#[test]
fn test_stream_must_be_selected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 1024)?;
    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;

    let mut raw = vec![0i16; 8];
    assert!(matches!(
        reader.read(&mut raw, 4),
        Err(FormatError::SessionState { .. })
    ));
    assert!(matches!(
        reader.select_stream(3),
        Err(FormatError::OutOfRange { index: 3, limit: 1, .. })
    ));

    reader.select_stream(0)?;
    assert_eq!(reader.active_record(), Some(0));
    reader.close();
    assert_eq!(reader.active_record(), None);
    Ok(())
}

#[test]
fn test_missing_index_is_not_found() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = ReaderSession::open(&dir.path().join("structure.xml"));
    assert!(matches!(result, Err(FormatError::FileNotFound { .. })));
    Ok(())
}

#[test]
fn test_corrupt_header_rejected_when_validating() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 1024)?;

    let path = dir.path().join("100_example-data_CH2.continuous");
    let mut data = fs::read(&path)?;
    data[..8].copy_from_slice(b"garbage!");
    fs::write(&path, data)?;

    let index = dir.path().join("structure.xml");
    let mut reader = ReaderSession::open(&index)?;
    assert!(matches!(
        reader.select_stream(0),
        Err(FormatError::Other(_) | FormatError::IndexInconsistent(_))
    ));

    let mut lenient =
        ReaderSession::open_with(&index, PlaybackConfig::default().with_header_validation(false))?;
    lenient.select_stream(0)?;
    Ok(())
}

#[test]
fn test_index_without_start_timestamps_is_probed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 40, 0, 2048)?;
    record(dir.path(), 1, 9000, 0, 1024)?;

    let index_path = dir.path().join("structure.xml");
    let mut index = load_index(&index_path)?;
    for stream in index.recordings.iter_mut().flat_map(|r| r.streams.iter_mut()) {
        stream.start_timestamp = None;
    }
    write_index(&index_path, &index)?;

    let reader = ReaderSession::open_with(&index_path, PlaybackConfig::default().with_strict_probe(true))?;
    assert_eq!(reader.variant(), FormatVariant::Legacy);
    let catalog = reader.catalog();
    assert_eq!(catalog.recordings[0].streams[0].start_timestamp, 40);
    assert_eq!(catalog.recordings[1].streams[0].start_timestamp, 9000);
    assert_eq!(reader.records()[0].num_samples, 3072);
    Ok(())
}

#[test]
fn test_processor_shaped_index() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 1024)?;

    let index_path = dir.path().join("structure.xml");
    fs::write(
        &index_path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<EXPERIMENT version="0.4" number="1">
  <RECORDING number="0" samplerate="30000">
    <PROCESSOR id="100">
      <CHANNEL name="CH1" bitVolts="0.195" filename="100_example-data_CH1.continuous" position="1024"/>
      <CHANNEL name="CH2" bitVolts="0.195" filename="100_example-data_CH2.continuous" position="1024.0"/>
    </PROCESSOR>
  </RECORDING>
</EXPERIMENT>
"#,
    )?;

    let mut reader = ReaderSession::open(&index_path)?;
    assert_eq!(reader.variant(), FormatVariant::Legacy);
    let record = &reader.records()[0];
    assert_eq!(record.key, "100_100");
    assert_eq!(record.num_samples, 1024);
    assert!((record.sample_rate - 30000.0).abs() < f32::EPSILON);

    reader.select_stream(0)?;
    let mut raw = vec![0i16; 2 * 4];
    assert_eq!(reader.read(&mut raw, 4)?, 4);
    let mut volts = [0.0f32; 4];
    reader.convert_channel(&raw, 0, &mut volts)?;
    assert!((volts[3] - 3.0 * GAIN).abs() <= GAIN / 2.0);
    Ok(())
}

#[test]
fn test_processor_recordings_resolve_start_and_events() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = WriterSession::new();
    let config = |recording| {
        RecorderConfig::new(dir.path())
            .with_recording(recording)
            .with_date("19-Oct-2026 120000")
    };

    session.open(config(0), &layout())?;
    session.write_continuous(0, &steps(0, 2048), 40, None)?;
    session.write_continuous(1, &steps(0, 2048), 40, None)?;
    session.write_event(&EventPacket::Ttl {
        timestamp: 140,
        source_id: 100,
        line: 1,
        state: true,
    })?;
    session.close()?;

    session.open(config(1), &layout())?;
    session.write_continuous(0, &steps(0, 1024), 9000, None)?;
    session.write_continuous(1, &steps(0, 1024), 9000, None)?;
    session.write_event(&EventPacket::Ttl {
        timestamp: 9100,
        source_id: 100,
        line: 2,
        state: false,
    })?;
    session.close()?;

    // Replace the index with the processor-shaped document older writers
    // produce: zero-based recording numbers and no EVENTS entry.
    let index_path = dir.path().join("structure.xml");
    fs::write(
        &index_path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<EXPERIMENT version="0.4" number="1">
  <RECORDING number="0" samplerate="30000">
    <PROCESSOR id="100">
      <CHANNEL name="CH1" bitVolts="0.195" filename="100_example-data_CH1.continuous" position="1024"/>
      <CHANNEL name="CH2" bitVolts="0.195" filename="100_example-data_CH2.continuous" position="1024"/>
    </PROCESSOR>
  </RECORDING>
  <RECORDING number="1" samplerate="30000">
    <PROCESSOR id="100">
      <CHANNEL name="CH1" bitVolts="0.195" filename="100_example-data_CH1.continuous" position="5164"/>
      <CHANNEL name="CH2" bitVolts="0.195" filename="100_example-data_CH2.continuous" position="5164"/>
    </PROCESSOR>
  </RECORDING>
</EXPERIMENT>
"#,
    )?;

    let mut reader =
        ReaderSession::open_with(&index_path, PlaybackConfig::default().with_strict_probe(true))?;
    let starts: Vec<i64> = reader
        .catalog()
        .recordings
        .iter()
        .map(|r| r.streams[0].start_timestamp)
        .collect();
    assert_eq!(starts, vec![40, 9000]);
    assert_eq!(reader.records()[0].num_samples, 3072);

    reader.select_stream(0)?;
    assert_eq!(reader.events()?.len(), 2);

    let early = reader.events_in_range(0, 200)?;
    assert_eq!(early.len(), 1);
    assert_eq!(early[0].timestamp, 100);

    // 9100 less the first start (40) and the gap (9000 - 2088).
    let late = reader.events_in_range(2100, 2200)?;
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].timestamp, 2148);
    assert_eq!(late[0].line, 2);
    Ok(())
}

#[test]
fn test_read_goes_block_by_block() -> Result<()> {
    let dir = tempfile::tempdir()?;
    record(dir.path(), 0, 0, 0, 2048)?;

    // Cut the second channel down to its first block.
    let path = dir.path().join("100_example-data_CH2.continuous");
    let mut data = fs::read(&path)?;
    data.truncate(HEADER_SIZE + BLOCK_SIZE_BYTES);
    fs::write(&path, data)?;

    let mut reader = ReaderSession::open(&dir.path().join("structure.xml"))?;
    reader.select_stream(0)?;
    assert_eq!(reader.total_blocks()?, 2);

    // A read spanning the block boundary is served up to the damaged block.
    reader.seek_to(1000)?;
    let mut raw = vec![0i16; 2 * 24];
    assert_eq!(reader.read(&mut raw, 24)?, 24);

    let mut raw = vec![0i16; 2 * 8];
    assert!(matches!(
        reader.read(&mut raw, 8),
        Err(FormatError::OutOfRange { index: 1, limit: 1, .. })
    ));
    Ok(())
}
