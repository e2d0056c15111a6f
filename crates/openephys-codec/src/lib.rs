//! Binary codecs for the Open Ephys data format
//!
//! The format stores each continuous channel, the shared event stream and each
//! spike electrode in its own file. Every file starts with a fixed-size text
//! header followed by fixed-layout binary records:
//!
//! - [`continuous`]: 1024-sample blocks with a timestamp/count/recording header and a 10-byte marker
//! - [`event`]: 16-byte TTL event records
//! - [`spike`]: variable-length waveform records whose shape comes from the index
//! - [`header`]: the versioned text header written at the start of every file
//! - [`naming`]: file naming conventions shared by the writer and reader
//! - [`layout`]: named constants for every size and offset above
//!
//! Sample words inside continuous blocks are big-endian; every other
//! multi-byte field is little-endian. Both conventions are fixed regardless of
//! the host platform.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bytes;
pub mod continuous;
pub mod event;
pub mod header;
pub mod layout;
pub mod naming;
pub mod spike;

pub use bytes::{ByteReader, ByteWriter};
pub use continuous::{BlockHeader, ContinuousBlock, decode_sample, encode_sample, read_block};
pub use event::EventRecord;
pub use header::{ChannelKind, HeaderFields, generate_header, parse_header};
pub use spike::{SpikeChannelMeta, SpikeEvent, SpikeLayout, SpikeRecord};

pub use openephys_errors::{FormatError, Result};
