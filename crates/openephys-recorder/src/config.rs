//! Writer configuration and recording layout.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use openephys_codec::SpikeChannelMeta;
use openephys_codec::naming::index_file_name;
use openephys_errors::{FormatError, Result};

/// Where and under which numbers a writer session records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory receiving every data file and the index
    pub root_dir: PathBuf,
    /// Experiment number, starting at 1
    pub experiment_number: u32,
    /// Zero-based recording number written into every record
    pub recording_number: u16,
    /// Fixed creation date for text headers (`dd-Mon-yyyy HHMMSS`)
    pub date_created: Option<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            experiment_number: 1,
            recording_number: 0,
            date_created: None,
        }
    }
}

impl RecorderConfig {
    /// Config rooted at `root_dir` with default numbering.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Set the experiment number.
    pub fn with_experiment(mut self, experiment_number: u32) -> Self {
        self.experiment_number = experiment_number;
        self
    }

    /// Set the zero-based recording number.
    pub fn with_recording(mut self, recording_number: u16) -> Self {
        self.recording_number = recording_number;
        self
    }

    /// Pin the header creation date.
    pub fn with_date(mut self, date_created: impl Into<String>) -> Self {
        self.date_created = Some(date_created.into());
        self
    }

    /// Reject configurations the format cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.experiment_number == 0 {
            return Err(FormatError::other("experiment number starts at 1"));
        }
        Ok(())
    }

    /// Path of this experiment's index document.
    pub fn index_path(&self) -> PathBuf {
        self.root_dir.join(index_file_name(self.experiment_number))
    }

    /// Recording number as written to the index.
    pub fn index_recording_number(&self) -> u32 {
        u32::from(self.recording_number) + 1
    }
}

/// One continuous channel of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousChannel {
    /// Channel name
    pub name: String,
    /// Volts per stored step
    pub bit_volts: f32,
}

impl ContinuousChannel {
    /// Create a channel description.
    pub fn new(name: impl Into<String>, bit_volts: f32) -> Self {
        Self {
            name: name.into(),
            bit_volts,
        }
    }
}

/// One spike electrode of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeChannel {
    /// Electrode name
    pub name: String,
    /// Record shape and scaling
    pub meta: SpikeChannelMeta,
}

/// A group of channels sharing a clock and source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Source node id
    pub source_node_id: u16,
    /// Source node name
    pub source_node_name: String,
    /// Stream name
    pub name: String,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Continuous channels; the first one is the stream's reference channel
    pub continuous: Vec<ContinuousChannel>,
    /// Spike electrodes
    pub spikes: Vec<SpikeChannel>,
}

/// Everything a writer session records.
///
/// Continuous channels and spike electrodes are addressed by their position
/// across all streams, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingLayout {
    /// Streams in recording order
    pub streams: Vec<StreamDescriptor>,
}

impl RecordingLayout {
    /// Total continuous channels across streams.
    pub fn continuous_count(&self) -> usize {
        self.streams.iter().map(|s| s.continuous.len()).sum()
    }

    /// Total spike electrodes across streams.
    pub fn spike_count(&self) -> usize {
        self.streams.iter().map(|s| s.spikes.len()).sum()
    }

    /// Check names and scales before any file is created.
    pub fn validate(&self) -> Result<()> {
        for stream in &self.streams {
            if !is_positive(stream.sample_rate) {
                return Err(FormatError::other(format!(
                    "stream {} has a non-positive sample rate",
                    stream.name
                )));
            }
            for channel in &stream.continuous {
                if !is_positive(channel.bit_volts) {
                    return Err(FormatError::other(format!(
                        "channel {} has an invalid bit_volts {}",
                        channel.name, channel.bit_volts
                    )));
                }
            }
            for spike in &stream.spikes {
                if spike.meta.channel_bit_volts.iter().any(|g| !is_positive(*g)) {
                    return Err(FormatError::other(format!(
                        "electrode {} has a non-positive channel scale",
                        spike.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
