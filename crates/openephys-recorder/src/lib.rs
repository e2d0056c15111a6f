//! Writer session for the Open Ephys data format
//!
//! A [`WriterSession`] owns every file of one recording while it is open:
//!
//! - one continuous file per channel, framed into 1024-sample blocks
//! - the experiment's shared event file and message log
//! - one spike file per electrode
//! - one synchronized timestamp file per stream
//!
//! Files that already exist (from earlier recordings of the same experiment)
//! are appended to; new files receive their text header first. Closing the
//! session zero-pads partial blocks and appends a `RECORDING` entry to the
//! experiment index, holding each channel's starting byte offset.
//!
//! # Example
//!
//! ```no_run
//! use openephys_recorder::{
//!     ContinuousChannel, RecorderConfig, RecordingLayout, StreamDescriptor, WriterSession,
//! };
//!
//! # fn main() -> openephys_recorder::Result<()> {
//! let layout = RecordingLayout {
//!     streams: vec![StreamDescriptor {
//!         source_node_id: 100,
//!         source_node_name: "Acquisition Board".into(),
//!         name: "example_data".into(),
//!         sample_rate: 30000.0,
//!         continuous: vec![ContinuousChannel::new("CH1", 0.195)],
//!         spikes: Vec::new(),
//!     }],
//! };
//!
//! let session = WriterSession::new();
//! session.open(RecorderConfig::new("/data/session"), &layout)?;
//! session.write_continuous(0, &[0.0; 2048], 0, None)?;
//! let summary = session.close()?;
//! assert_eq!(summary.channels[0].blocks, 2);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
mod files;
pub mod session;

pub use config::{
    ContinuousChannel, RecorderConfig, RecordingLayout, SpikeChannel, StreamDescriptor,
};
pub use session::{ChannelSummary, CloseSummary, EventPacket, WriterSession};

pub use openephys_errors::{FormatError, Result};
