//! Structural index for Open Ephys recordings
//!
//! The index (`structure.xml`, or `structure_<n>.xml` for later experiments)
//! maps logical streams and channels to data files and byte offsets. The
//! writer appends one `RECORDING` element per closed session; the reader
//! parses the whole document before touching any data file.
//!
//! ```text
//! EXPERIMENT version number
//! └── RECORDING number
//!     └── STREAM source_node_id source_node_name name sample_rate [start_timestamp]
//!         ├── CHANNEL name bitVolts filename position
//!         ├── SPIKECHANNEL name filename num_channels num_samples bitVolts
//!         ├── EVENTS filename
//!         └── TIMESTAMPS filename
//! ```
//!
//! Documents from older writers group channels under `PROCESSOR id` and keep
//! the sample rate on the recording; they load as [`FormatVariant::Legacy`].

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod model;
pub mod store;
pub mod tree;

pub use model::{
    ExperimentIndex, FormatVariant, IndexChannel, IndexRecording, IndexSpikeChannel, IndexStream,
};
pub use store::{append_recording, load_index, write_index};
pub use tree::XmlElement;

pub use openephys_errors::{FormatError, Result};
