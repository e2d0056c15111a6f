//! Convenience re-exports for common error types

pub use crate::Result;
pub use crate::common::{ErrorCategory, ErrorContext, ErrorSeverity, FormatError, ResultExt};
