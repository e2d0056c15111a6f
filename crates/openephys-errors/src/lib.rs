//! Centralized error types for the Open Ephys format crates
//!
//! Every fallible operation in the codec, index, recorder and playback crates
//! returns [`FormatError`]. The variants mirror the failure kinds of the
//! on-disk format:
//!
//! - [`FormatError::FileNotFound`]: index or data file missing, or the index root tag is wrong
//! - [`FormatError::MalformedRecord`]: a decode buffer has the wrong length
//! - [`FormatError::OutOfRange`]: a block or sample index beyond the recorded extent
//! - [`FormatError::WriteFailed`]: an I/O error while appending to a data file
//! - [`FormatError::IndexInconsistent`]: data and index disagree
//!
//! # Recovery
//!
//! Read-path errors are recoverable at the call site: the caller may skip a
//! stream or retry. A write failure is fatal for the current writer session
//! because a partial block cannot be repaired after the fact.
//!
//! # Example
//!
//! ```
//! use openephys_errors::prelude::*;
//!
//! fn block(index: u64, total: u64) -> Result<u64> {
//!     if index >= total {
//!         return Err(FormatError::out_of_range("block", index, total));
//!     }
//!     Ok(index)
//! }
//!
//! assert!(block(3, 2).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod prelude;

pub use common::{ErrorCategory, ErrorContext, ErrorSeverity, FormatError, ResultExt};

/// A specialized `Result` type for Open Ephys format operations.
pub type Result<T> = std::result::Result<T, FormatError>;
