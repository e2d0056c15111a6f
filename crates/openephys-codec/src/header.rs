//! Fixed-size text headers.
//!
//! Every data file starts with a [`HEADER_SIZE`] byte block of
//! `header.<key> = <value>;` statements padded with spaces. The text is
//! reproduced byte for byte, including the legacy spacing quirks, so that
//! existing loaders keep working.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use openephys_errors::{FormatError, Result};
use serde::{Deserialize, Serialize};

use crate::layout::{BLOCK_LENGTH, FORMAT_NAME, HEADER_SIZE, VERSION_STRING};

const CONTINUOUS_DESCRIPTION: &str = "header.description = 'each record contains one 64-bit timestamp, \
one 16-bit sample count (N), 1 uint16 recordingNumber, N 16-bit samples, \
and one 10-byte record marker (0 1 2 3 4 5 6 7 8 255)'; \n";

const EVENT_DESCRIPTION: &str = "header.description = 'each record contains one 64-bit timestamp, \
one 16-bit sample position, one uint8 event type, one uint8 processor ID, \
one uint8 event ID, one uint8 event channel, and one uint16 recordingNumber'; \n";

const SPIKE_DESCRIPTION: &str = "header.description = 'Each record contains 1 uint8 eventType, \
1 int64 timestamp, 1 int64 software timestamp, 1 uint16 sourceID, 1 uint16 numChannels (n), \
1 uint16 numSamples (m), 1 uint16 sortedID, 1 uint16 electrodeID, 1 uint16 channel, \
3 uint8 color codes, 2 float32 component projections, n*m uint16 samples, \
n float32 channelGains, n uint16 thresholds, and 1 uint16 recordingNumber'; \n";

const TIMESTAMPS_DESCRIPTION: &str = "header.description = 'each record contains one 64-bit \
floating point synchronized timestamp for the first sample of a completed block'; \n";

/// What a data file holds, with the metadata its header records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// One continuous channel
    Continuous {
        /// Channel name
        name: String,
        /// Sample rate in Hz
        sample_rate: f32,
        /// Volts per stored step
        bit_volts: f32,
    },
    /// The shared TTL event file
    Event,
    /// One spike electrode
    Spike {
        /// Electrode name
        electrode: String,
        /// Sub-channels per record
        num_channels: u16,
        /// Sample rate in Hz
        sample_rate: f32,
        /// Samples per sub-channel waveform
        samples_per_spike: u16,
    },
    /// Per-stream synchronized block timestamps
    Timestamps {
        /// Stream name
        stream: String,
        /// Sample rate in Hz
        sample_rate: f32,
    },
}

impl ChannelKind {
    fn description(&self) -> &'static str {
        match self {
            ChannelKind::Continuous { .. } => CONTINUOUS_DESCRIPTION,
            ChannelKind::Event => EVENT_DESCRIPTION,
            ChannelKind::Spike { .. } => SPIKE_DESCRIPTION,
            ChannelKind::Timestamps { .. } => TIMESTAMPS_DESCRIPTION,
        }
    }

    fn fields_text(&self) -> String {
        match self {
            ChannelKind::Continuous {
                name,
                sample_rate,
                bit_volts,
            } => {
                format!(
                    "header.channel = '{name}';\n\
                     header.channelType = 'Continuous';\n\
                     header.sampleRate = {};\n\
                     header.blockLength = {BLOCK_LENGTH};\n\
                     header.bitVolts = {};\n",
                    format_number(*sample_rate),
                    format_number(*bit_volts),
                )
            }
            ChannelKind::Event => {
                format!(
                    "header.channel = 'Events';\n\
                     header.channelType = 'Event';\n\
                     ;\n\
                     header.blockLength = {BLOCK_LENGTH};\n"
                )
            }
            ChannelKind::Spike {
                electrode,
                num_channels,
                sample_rate,
                samples_per_spike,
            } => {
                format!(
                    "header.electrode = '{electrode}';\n\
                     header.num_channels = {num_channels};\n\
                     header.sampleRate = {};\n\
                     header.samplesPerSpike = {samples_per_spike};\n",
                    format_number(*sample_rate),
                )
            }
            ChannelKind::Timestamps {
                stream,
                sample_rate,
            } => {
                format!(
                    "header.channel = '{stream}';\n\
                     header.channelType = 'Timestamps';\n\
                     header.sampleRate = {};\n\
                     header.blockLength = {BLOCK_LENGTH};\n",
                    format_number(*sample_rate),
                )
            }
        }
    }
}

/// Render a float the way header values have always been written.
///
/// Integral values keep one decimal (`30000.0`); others use the shortest
/// representation that round-trips (`0.195`).
pub fn format_number(value: f32) -> String {
    if value.is_finite() && value.fract().abs() < f32::EPSILON {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Format a creation timestamp as `dd-Mon-yyyy HHMMSS`.
pub fn date_string<Tz>(date: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    date.format("%d-%b-%Y %H%M%S").to_string()
}

/// Generate the padded header for a file of the given kind.
///
/// Fails with [`FormatError::HeaderOverflow`] when channel names push the text
/// past [`HEADER_SIZE`] bytes.
pub fn generate_header(kind: &ChannelKind, date_created: &str) -> Result<Vec<u8>> {
    let mut text = String::with_capacity(HEADER_SIZE);
    text.push_str(&format!(
        "header.format = '{FORMAT_NAME}'; \n\
         header.version = {VERSION_STRING}; \n\
         header.header_bytes = {HEADER_SIZE};\n"
    ));
    text.push_str(kind.description());
    text.push_str(&format!("header.date_created = '{date_created}';\n"));
    text.push_str(&kind.fields_text());

    if text.len() > HEADER_SIZE {
        return Err(FormatError::HeaderOverflow { len: text.len() });
    }

    let mut bytes = text.into_bytes();
    bytes.resize(HEADER_SIZE, b' ');
    Ok(bytes)
}

/// Key/value pairs parsed from a text header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderFields {
    fields: BTreeMap<String, String>,
}

impl HeaderFields {
    /// Raw value for `key` with surrounding quotes removed.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value for `key` parsed as a float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Declared header size in bytes.
    pub fn header_bytes(&self) -> Option<usize> {
        self.get("header_bytes").and_then(|v| v.parse().ok())
    }

    /// All fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no field was found.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the format name and declared header size.
    pub fn validate(&self) -> Result<()> {
        if self.get("format") != Some(FORMAT_NAME) {
            return Err(FormatError::inconsistent(format!(
                "unexpected header format {:?}",
                self.get("format")
            )));
        }
        match self.header_bytes() {
            Some(HEADER_SIZE) => Ok(()),
            other => Err(FormatError::inconsistent(format!(
                "unexpected header size {other:?}"
            ))),
        }
    }
}

/// Parse the `header.<key> = <value>;` statements at the start of `bytes`.
///
/// Only the first [`HEADER_SIZE`] bytes are considered. Statements without a
/// `header.` prefix are skipped.
pub fn parse_header(bytes: &[u8]) -> Result<HeaderFields> {
    let head = bytes.get(..HEADER_SIZE).ok_or_else(|| {
        FormatError::malformed("text header", HEADER_SIZE, bytes.len())
    })?;
    let text = String::from_utf8_lossy(head);

    let mut fields = BTreeMap::new();
    for statement in text.split(';') {
        let statement = statement.trim();
        let Some(rest) = statement.strip_prefix("header.") else {
            continue;
        };
        let Some((key, value)) = rest.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .unwrap_or(value);
        fields.insert(key.trim().to_owned(), value.to_owned());
    }
    Ok(HeaderFields { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const DATE: &str = "19-Oct-2026 142501";

    #[test]
    fn test_continuous_header_text() -> Result<()> {
        let kind = ChannelKind::Continuous {
            name: "CH1".into(),
            sample_rate: 30000.0,
            bit_volts: 0.195,
        };
        let bytes = generate_header(&kind, DATE)?;
        assert_eq!(bytes.len(), HEADER_SIZE);

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with(
            "header.format = 'Open Ephys Data Format'; \n\
             header.version = 0.4; \n\
             header.header_bytes = 1024;\n\
             header.description = 'each record contains one 64-bit timestamp, "
        ));
        assert!(text.contains(
            "(0 1 2 3 4 5 6 7 8 255)'; \n\
             header.date_created = '19-Oct-2026 142501';\n\
             header.channel = 'CH1';\n\
             header.channelType = 'Continuous';\n\
             header.sampleRate = 30000.0;\n\
             header.blockLength = 1024;\n\
             header.bitVolts = 0.195;\n"
        ));
        assert!(text.ends_with(' '));
        Ok(())
    }

    #[test]
    fn test_event_header_keeps_stray_statement() -> Result<()> {
        let bytes = generate_header(&ChannelKind::Event, DATE)?;
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains(
            "header.channel = 'Events';\n\
             header.channelType = 'Event';\n\
             ;\n\
             header.blockLength = 1024;\n"
        ));
        Ok(())
    }

    #[test]
    fn test_spike_header_fields() -> Result<()> {
        let kind = ChannelKind::Spike {
            electrode: "Tetrode1".into(),
            num_channels: 4,
            sample_rate: 30000.0,
            samples_per_spike: 40,
        };
        let fields = parse_header(&generate_header(&kind, DATE)?)?;
        assert_eq!(fields.get("electrode"), Some("Tetrode1"));
        assert_eq!(fields.get("num_channels"), Some("4"));
        assert_eq!(fields.get("samplesPerSpike"), Some("40"));
        fields.validate()?;
        Ok(())
    }

    #[test]
    fn test_parse_continuous_header() -> Result<()> {
        let kind = ChannelKind::Continuous {
            name: "CH 2".into(),
            sample_rate: 2500.0,
            bit_volts: 0.5,
        };
        let fields = parse_header(&generate_header(&kind, DATE)?)?;
        assert_eq!(fields.get("format"), Some(FORMAT_NAME));
        assert_eq!(fields.get("version"), Some("0.4"));
        assert_eq!(fields.header_bytes(), Some(HEADER_SIZE));
        assert_eq!(fields.get("channel"), Some("CH 2"));
        assert_eq!(fields.get("date_created"), Some(DATE));
        assert_eq!(fields.get_f64("bitVolts"), Some(0.5));
        Ok(())
    }

    #[test]
    fn test_overflow_is_rejected() {
        let kind = ChannelKind::Continuous {
            name: "x".repeat(HEADER_SIZE),
            sample_rate: 1.0,
            bit_volts: 1.0,
        };
        assert!(matches!(
            generate_header(&kind, DATE),
            Err(FormatError::HeaderOverflow { .. })
        ));
    }

    #[test]
    fn test_parse_short_buffer() {
        assert!(matches!(
            parse_header(b"header.format = 'x';"),
            Err(FormatError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_foreign_text() -> Result<()> {
        let fields = parse_header(&[b' '; HEADER_SIZE])?;
        assert!(fields.is_empty());
        assert!(matches!(
            fields.validate(),
            Err(FormatError::IndexInconsistent(_))
        ));
        Ok(())
    }

    #[test]
    fn test_date_string_format() {
        let date = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).single();
        let text = date.map(|d| date_string(&d));
        assert_eq!(text.as_deref(), Some("07-Mar-2026 090501"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(30000.0), "30000.0");
        assert_eq!(format_number(0.195), "0.195");
    }
}
