//! Typed view of the structural index.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use openephys_codec::layout::VERSION_STRING;
use openephys_codec::naming::{events_file_name, stream_key};
use openephys_errors::{FormatError, Result};

use crate::tree::XmlElement;

/// Root tag of every index document.
pub const EXPERIMENT_TAG: &str = "EXPERIMENT";
/// One recording inside an experiment.
pub const RECORDING_TAG: &str = "RECORDING";
/// One stream inside a recording.
pub const STREAM_TAG: &str = "STREAM";
/// Per-processor grouping used by older writers in place of streams.
pub const PROCESSOR_TAG: &str = "PROCESSOR";
/// One continuous channel.
pub const CHANNEL_TAG: &str = "CHANNEL";
/// One spike electrode.
pub const SPIKE_CHANNEL_TAG: &str = "SPIKECHANNEL";
/// The stream's event file.
pub const EVENTS_TAG: &str = "EVENTS";
/// The stream's synchronized timestamp file.
pub const TIMESTAMPS_TAG: &str = "TIMESTAMPS";

/// Which on-disk shape an index was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatVariant {
    /// Streams carry no start timestamp; it is probed from the first channel file.
    Legacy,
    /// Streams record their start timestamp directly.
    Stamped,
}

/// One continuous channel entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChannel {
    /// Channel name
    pub name: String,
    /// Volts per stored step
    pub bit_volts: f32,
    /// Data file name relative to the index
    pub filename: String,
    /// Byte offset of the recording's first block
    pub position: u64,
}

/// One spike electrode entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpikeChannel {
    /// Electrode name
    pub name: String,
    /// Spike file name relative to the index
    pub filename: String,
    /// Sub-channels per record
    pub num_channels: u16,
    /// Samples per sub-channel waveform
    pub num_samples: u16,
    /// Volts per step for each sub-channel
    pub bit_volts: Vec<f32>,
}

/// One stream of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStream {
    /// Source node id
    pub source_node_id: u16,
    /// Source node name
    pub source_node_name: String,
    /// Stream name
    pub name: String,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Timestamp of the first sample, when the writer recorded it
    pub start_timestamp: Option<i64>,
    /// Continuous channels in acquisition order
    pub channels: Vec<IndexChannel>,
    /// Spike electrodes
    pub spike_channels: Vec<IndexSpikeChannel>,
    /// Event file name
    pub events_file: Option<String>,
    /// Synchronized timestamp file name
    pub timestamps_file: Option<String>,
}

impl IndexStream {
    /// Key identifying this stream across recordings.
    pub fn key(&self) -> String {
        stream_key(self.source_node_id, &self.name)
    }

    fn from_stream_element(element: &XmlElement) -> Result<Self> {
        let mut stream = Self {
            source_node_id: parse_attr(element, "source_node_id")?.unwrap_or(0),
            source_node_name: element.attr("source_node_name").unwrap_or_default().to_owned(),
            name: element.attr("name").unwrap_or_default().to_owned(),
            sample_rate: parse_attr(element, "sample_rate")?.unwrap_or(0.0),
            start_timestamp: parse_attr(element, "start_timestamp")?,
            channels: Vec::new(),
            spike_channels: Vec::new(),
            events_file: None,
            timestamps_file: None,
        };
        stream.read_children(element)?;
        Ok(stream)
    }

    /// Processors always wrote the experiment's event file, listed or not.
    fn from_processor_element(element: &XmlElement, sample_rate: f32, experiment: u32) -> Result<Self> {
        let id: u16 = parse_attr(element, "id")?.unwrap_or(0);
        let mut stream = Self {
            source_node_id: id,
            source_node_name: String::new(),
            name: id.to_string(),
            sample_rate,
            start_timestamp: None,
            channels: Vec::new(),
            spike_channels: Vec::new(),
            events_file: None,
            timestamps_file: None,
        };
        stream.read_children(element)?;
        if stream.events_file.is_none() {
            stream.events_file = Some(events_file_name(experiment));
        }
        Ok(stream)
    }

    fn read_children(&mut self, element: &XmlElement) -> Result<()> {
        for child in &element.children {
            match child.tag.as_str() {
                CHANNEL_TAG => self.channels.push(IndexChannel {
                    name: child.attr("name").unwrap_or_default().to_owned(),
                    bit_volts: parse_attr(child, "bitVolts")?.unwrap_or(1.0),
                    filename: required_attr(child, "filename")?.to_owned(),
                    position: parse_position(child)?,
                }),
                SPIKE_CHANNEL_TAG => self.spike_channels.push(IndexSpikeChannel {
                    name: child.attr("name").unwrap_or_default().to_owned(),
                    filename: required_attr(child, "filename")?.to_owned(),
                    num_channels: parse_attr(child, "num_channels")?.unwrap_or(0),
                    num_samples: parse_attr(child, "num_samples")?.unwrap_or(0),
                    bit_volts: child
                        .attr("bitVolts")
                        .map(parse_float_list)
                        .transpose()?
                        .unwrap_or_default(),
                }),
                EVENTS_TAG => self.events_file = child.attr("filename").map(str::to_owned),
                TIMESTAMPS_TAG => self.timestamps_file = child.attr("filename").map(str::to_owned),
                other => debug!(tag = other, "ignoring unknown stream child"),
            }
        }
        Ok(())
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new(STREAM_TAG)
            .with_attr("source_node_id", self.source_node_id)
            .with_attr("source_node_name", &self.source_node_name)
            .with_attr("name", &self.name)
            .with_attr("sample_rate", self.sample_rate);
        if let Some(ts) = self.start_timestamp {
            element.set_attr("start_timestamp", ts);
        }

        for channel in &self.channels {
            element.push_child(
                XmlElement::new(CHANNEL_TAG)
                    .with_attr("name", &channel.name)
                    .with_attr("bitVolts", channel.bit_volts)
                    .with_attr("filename", &channel.filename)
                    .with_attr("position", channel.position),
            );
        }
        for spike in &self.spike_channels {
            let scales: Vec<String> = spike.bit_volts.iter().map(f32::to_string).collect();
            element.push_child(
                XmlElement::new(SPIKE_CHANNEL_TAG)
                    .with_attr("name", &spike.name)
                    .with_attr("filename", &spike.filename)
                    .with_attr("num_channels", spike.num_channels)
                    .with_attr("num_samples", spike.num_samples)
                    .with_attr("bitVolts", scales.join(" ")),
            );
        }
        if let Some(events) = &self.events_file {
            element.push_child(XmlElement::new(EVENTS_TAG).with_attr("filename", events));
        }
        if let Some(timestamps) = &self.timestamps_file {
            element.push_child(XmlElement::new(TIMESTAMPS_TAG).with_attr("filename", timestamps));
        }
        element
    }
}

/// One recording of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecording {
    /// One-based recording number
    pub number: u32,
    /// Streams in index order
    pub streams: Vec<IndexStream>,
}

impl IndexRecording {
    /// Stream with the given key.
    pub fn stream(&self, key: &str) -> Option<&IndexStream> {
        self.streams.iter().find(|s| s.key() == key)
    }

    fn from_element(element: &XmlElement, experiment: u32) -> Result<Self> {
        let mut number: u32 = parse_attr(element, "number")?
            .ok_or_else(|| FormatError::inconsistent("RECORDING without a number"))?;
        let legacy_rate: f32 = parse_attr(element, "samplerate")?.unwrap_or(0.0);

        // Processor-shaped recordings carry the zero-based block header number.
        if element.children.iter().any(|c| c.has_tag(PROCESSOR_TAG)) {
            number = number.checked_add(1).ok_or_else(|| {
                FormatError::inconsistent(format!("RECORDING number {number} out of range"))
            })?;
        }

        let mut streams = Vec::new();
        for child in &element.children {
            match child.tag.as_str() {
                STREAM_TAG => streams.push(IndexStream::from_stream_element(child)?),
                PROCESSOR_TAG => {
                    streams.push(IndexStream::from_processor_element(
                        child,
                        legacy_rate,
                        experiment,
                    )?);
                }
                other => debug!(tag = other, "ignoring unknown recording child"),
            }
        }
        Ok(Self { number, streams })
    }

    /// Convert to an index element.
    pub fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new(RECORDING_TAG).with_attr("number", self.number);
        for stream in &self.streams {
            element.push_child(stream.to_element());
        }
        element
    }
}

/// A whole index document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentIndex {
    /// Format version of the writer that created the document
    pub version: String,
    /// Experiment number
    pub number: u32,
    /// Recordings in document order
    pub recordings: Vec<IndexRecording>,
}

impl ExperimentIndex {
    /// Empty index for a new experiment.
    pub fn new(number: u32) -> Self {
        Self {
            version: VERSION_STRING.to_owned(),
            number,
            recordings: Vec::new(),
        }
    }

    /// Build from a parsed root element.
    ///
    /// A root that is not `EXPERIMENT` is reported as a missing index.
    pub fn from_element(root: &XmlElement) -> Result<Self> {
        if !root.has_tag(EXPERIMENT_TAG) {
            return Err(FormatError::file_not_found(
                "",
                format!("root element is {}, not {EXPERIMENT_TAG}", root.tag),
            ));
        }
        let number = parse_attr(root, "number")?.unwrap_or(1);
        let recordings = root
            .children_named(RECORDING_TAG)
            .map(|element| IndexRecording::from_element(element, number))
            .collect::<Result<Vec<_>>>()?;

        let mut numbers: Vec<u32> = recordings.iter().map(|r| r.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        if numbers.len() != recordings.len() {
            warn!("index lists the same recording number more than once");
        }

        Ok(Self {
            version: root.attr("version").unwrap_or(VERSION_STRING).to_owned(),
            number,
            recordings,
        })
    }

    /// Convert to a root element.
    pub fn to_element(&self) -> XmlElement {
        let mut root = XmlElement::new(EXPERIMENT_TAG)
            .with_attr("version", &self.version)
            .with_attr("number", self.number);
        for recording in &self.recordings {
            root.push_child(recording.to_element());
        }
        root
    }

    /// Shape the document was written in.
    ///
    /// Any stream carrying a start timestamp marks the whole document as
    /// [`FormatVariant::Stamped`].
    pub fn variant(&self) -> FormatVariant {
        let stamped = self
            .recordings
            .iter()
            .flat_map(|r| &r.streams)
            .any(|s| s.start_timestamp.is_some());
        if stamped {
            FormatVariant::Stamped
        } else {
            FormatVariant::Legacy
        }
    }

    /// Recording with the given one-based number.
    pub fn recording(&self, number: u32) -> Option<&IndexRecording> {
        self.recordings.iter().find(|r| r.number == number)
    }

    /// Recordings sorted by number.
    pub fn recordings_sorted(&self) -> Vec<&IndexRecording> {
        let mut sorted: Vec<&IndexRecording> = self.recordings.iter().collect();
        sorted.sort_by_key(|r| r.number);
        sorted
    }

    /// Next free recording number.
    pub fn next_recording_number(&self) -> u32 {
        self.recordings
            .iter()
            .map(|r| r.number)
            .max()
            .map_or(1, |n| n.saturating_add(1))
    }
}

fn required_attr<'a>(element: &'a XmlElement, key: &str) -> Result<&'a str> {
    element.attr(key).ok_or_else(|| {
        FormatError::inconsistent(format!("{} element without {key}", element.tag))
    })
}

fn parse_attr<T: std::str::FromStr>(element: &XmlElement, key: &str) -> Result<Option<T>> {
    match element.attr(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_parse_error| {
            FormatError::inconsistent(format!(
                "{} attribute {key}={raw:?} is not a valid number",
                element.tag
            ))
        }),
    }
}

/// Byte positions may have been written as floating point text (`1024.0`).
fn parse_position(element: &XmlElement) -> Result<u64> {
    let raw = required_attr(element, "position")?.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract().abs() < f64::EPSILON => {
            Ok(value as u64)
        }
        _ => Err(FormatError::inconsistent(format!(
            "CHANNEL position {raw:?} is not a byte offset"
        ))),
    }
}

fn parse_float_list(raw: &str) -> Result<Vec<f32>> {
    raw.split_whitespace()
        .map(|part| {
            part.parse::<f32>().map_err(|_parse_error| {
                FormatError::inconsistent(format!("invalid scale {part:?}"))
            })
        })
        .collect()
}
