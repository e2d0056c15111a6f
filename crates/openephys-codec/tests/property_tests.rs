//! Property-based tests for the sample, event and spike codecs.

use openephys_codec::continuous::{decode_raw_word, encode_block, encode_sample_bytes, raw_word};
use openephys_codec::event::decode_events;
use openephys_codec::layout::{BLOCK_LENGTH, BLOCK_SIZE_BYTES, EVENT_HEADER_SIZE};
use openephys_codec::spike::{decode_spike, encode_spike};
use openephys_codec::{
    BlockHeader, ContinuousBlock, EventRecord, SpikeChannelMeta, SpikeEvent, decode_sample,
    encode_sample,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Quantization error never exceeds half a step inside the representable range.
    #[test]
    fn prop_sample_quantization_within_half_step(
        gain in 0.01f32..10.0,
        fraction in -0.999f32..0.999,
    ) {
        let sample = fraction * 32767.0 * gain;
        let decoded = decode_sample(encode_sample(sample, gain), gain);
        let tolerance = gain * 0.5 + sample.abs() * 1e-5;
        prop_assert!(
            (decoded - sample).abs() <= tolerance,
            "sample {} decoded as {} at gain {}", sample, decoded, gain
        );
    }

    /// The native-endian raw word path decodes to the same value as the direct path.
    #[test]
    fn prop_raw_word_path_agrees(gain in 0.01f32..10.0, fraction in -1.0f32..1.0) {
        let sample = fraction * 32767.0 * gain;
        let bytes = encode_sample_bytes(sample, gain);
        let direct = decode_sample(i16::from_be_bytes(bytes), gain);
        let swapped = decode_raw_word(raw_word(bytes), gain);
        prop_assert!((direct - swapped).abs() <= f32::EPSILON * direct.abs().max(1.0));
    }

    /// Every encoded block has the fixed size and an intact marker.
    #[test]
    fn prop_block_is_fixed_size(
        timestamp in any::<i64>(),
        recording in any::<u16>(),
        samples in proptest::collection::vec(-100.0f32..100.0, 0..=BLOCK_LENGTH),
    ) {
        let header = BlockHeader::new(timestamp, recording);
        let bytes = encode_block(&header, &samples, 0.195)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(bytes.len(), BLOCK_SIZE_BYTES);
        let block = ContinuousBlock::parse(&bytes)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(block.marker_intact());
        prop_assert_eq!(block.header, header);
    }

    /// Event records survive an encode/decode pass through a full event file.
    #[test]
    fn prop_event_file_decodes_every_record(
        records in proptest::collection::vec(
            (any::<i64>(), any::<u8>(), any::<u8>(), any::<bool>(), any::<u16>()),
            0..32,
        ),
    ) {
        let events: Vec<EventRecord> = records
            .iter()
            .map(|&(ts, source, line, state, rec)| EventRecord::ttl(ts, source, line, state, rec))
            .collect();
        let mut file = vec![b' '; EVENT_HEADER_SIZE];
        for event in &events {
            file.extend_from_slice(&event.encode());
        }
        let decoded = decode_events(&file).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, events);
    }

    /// Event decoding rejects every length but 16.
    #[test]
    fn prop_event_decode_rejects_wrong_length(len in 0usize..64) {
        prop_assume!(len != 16);
        let buf = vec![0u8; len];
        prop_assert!(EventRecord::decode(&buf).is_err());
    }

    /// Spike records decode with the counts they were written with.
    #[test]
    fn prop_spike_shape_survives(
        channels in 1usize..8,
        samples in 1u16..64,
        timestamp in any::<i64>(),
        recording in any::<u16>(),
    ) {
        let meta = SpikeChannelMeta {
            electrode_index: 0,
            channel_type: 2,
            sample_rate: 30000.0,
            channel_bit_volts: vec![0.195; channels],
            samples_per_channel: samples,
        };
        let spike = SpikeEvent {
            timestamp,
            source_id: 100,
            sorted_id: 0,
            waveform: vec![0.0; channels * usize::from(samples)],
            thresholds: vec![-40; channels],
        };
        let bytes = encode_spike(&meta, &spike, recording)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let record = decode_spike(&bytes, meta.layout())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(record.timestamp, timestamp);
        prop_assert_eq!(usize::from(record.num_channels), channels);
        prop_assert_eq!(record.num_samples, samples);
        prop_assert_eq!(record.recording_number, recording);
        prop_assert!(record.samples.iter().all(|&s| s == 32768));
    }
}
