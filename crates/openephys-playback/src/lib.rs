//! Reader session for the Open Ephys data format
//!
//! Playback treats every recording of an experiment as one continuous
//! timeline per stream:
//!
//! - [`catalog`]: recording boundaries, start timestamps and sample counts
//! - [`probe`]: start-timestamp recovery for indexes that do not store it
//! - [`mapped`]: read-only memory maps of channel files
//! - [`session`]: stream selection, wrapping cursor, sample and event access
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use openephys_playback::ReaderSession;
//!
//! # fn main() -> openephys_playback::Result<()> {
//! let mut reader = ReaderSession::open(Path::new("/data/session/structure.xml"))?;
//! reader.select_stream(0)?;
//!
//! let channels = reader.records()[0].channels.len();
//! let mut raw = vec![0i16; 1024 * channels];
//! let read = reader.read(&mut raw, 1024)?;
//!
//! let mut volts = vec![0.0f32; read];
//! reader.convert_channel(&raw, 0, &mut volts)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod catalog;
pub mod config;
pub mod mapped;
pub mod probe;
pub mod session;

pub use catalog::{Catalog, RecordingExtent, StreamExtent};
pub use config::PlaybackConfig;
pub use mapped::MappedFile;
pub use probe::probe_start_timestamp;
pub use session::{Message, ReaderSession, RecordInfo, RecordedChannel, SpikeTrain};

pub use openephys_errors::{FormatError, Result};
