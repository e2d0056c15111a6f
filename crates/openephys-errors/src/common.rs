//! Top-level error type, classification and context helpers.

use core::fmt;
use std::path::PathBuf;

/// Top-level error type for every Open Ephys format operation.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Index or data file is missing, unreadable, or has the wrong root tag
    #[error("File not found: {path}: {reason}")]
    FileNotFound {
        /// The path that could not be used
        path: PathBuf,
        /// Why the file was rejected
        reason: String,
    },

    /// A record buffer does not have the length its layout requires
    #[error("Malformed {what}: expected {expected} bytes, got {actual}")]
    MalformedRecord {
        /// The kind of record being decoded
        what: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// A block or sample index lies beyond the recorded extent
    #[error("{what} index {index} out of range (limit {limit})")]
    OutOfRange {
        /// The kind of index
        what: &'static str,
        /// The requested index
        index: u64,
        /// The exclusive upper bound
        limit: u64,
    },

    /// An I/O error occurred while appending to a data file
    #[error("Write failed for {path}: {source}")]
    WriteFailed {
        /// The file being written
        path: PathBuf,
        /// Source error
        #[source]
        source: std::io::Error,
    },

    /// Data files and the structural index disagree
    #[error("Index inconsistent: {0}")]
    IndexInconsistent(String),

    /// A generated text header does not fit in the fixed header size
    #[error("Header of {len} bytes exceeds the fixed header size")]
    HeaderOverflow {
        /// Length of the generated header text
        len: usize,
    },

    /// An operation was called in the wrong session state
    #[error("Invalid session state: expected {expected}, was {actual}")]
    SessionState {
        /// The state the operation needs
        expected: &'static str,
        /// The state the session is in
        actual: &'static str,
    },

    /// A previous write failure left the writer session unusable
    #[error("Session poisoned by an earlier write failure; close it")]
    SessionPoisoned,

    /// Structural index document could not be parsed or written
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O errors outside the write path
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl FormatError {
    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FormatError::FileNotFound { .. } | FormatError::Io(_) => ErrorCategory::IO,
            FormatError::WriteFailed { .. } | FormatError::SessionPoisoned => ErrorCategory::Write,
            FormatError::MalformedRecord { .. } | FormatError::HeaderOverflow { .. } => {
                ErrorCategory::Codec
            }
            FormatError::OutOfRange { .. } => ErrorCategory::Range,
            FormatError::IndexInconsistent(_) | FormatError::Xml(_) => ErrorCategory::Index,
            FormatError::SessionState { .. } => ErrorCategory::Session,
            FormatError::Other(_) => ErrorCategory::Other,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FormatError::WriteFailed { .. } | FormatError::SessionPoisoned => {
                ErrorSeverity::Critical
            }
            FormatError::OutOfRange { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Check if this error is recoverable at the call site.
    ///
    /// Write failures are never recoverable: the session has to be closed and
    /// the affected file tail repaired externally.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Create a missing-file error.
    pub fn file_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FormatError::FileNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a wrong-length decode error.
    pub fn malformed(what: &'static str, expected: usize, actual: usize) -> Self {
        FormatError::MalformedRecord {
            what,
            expected,
            actual,
        }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(what: &'static str, index: u64, limit: u64) -> Self {
        FormatError::OutOfRange { what, index, limit }
    }

    /// Create a write failure for a specific file.
    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FormatError::WriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Create an index consistency error.
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        FormatError::IndexInconsistent(msg.into())
    }

    /// Create a generic error with a message.
    pub fn other(msg: impl Into<String>) -> Self {
        FormatError::Other(msg.into())
    }
}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        FormatError::Io(e)
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// File access errors
    IO = 0,
    /// Write-path errors
    Write = 1,
    /// Record encode/decode errors
    Codec = 2,
    /// Index bound errors
    Range = 3,
    /// Structural index errors
    Index = 4,
    /// Session lifecycle errors
    Session = 5,
    /// Other errors
    Other = 255,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::IO => write!(f, "IO"),
            ErrorCategory::Write => write!(f, "Write"),
            ErrorCategory::Codec => write!(f, "Codec"),
            ErrorCategory::Range => write!(f, "Range"),
            ErrorCategory::Index => write!(f, "Index"),
            ErrorCategory::Session => write!(f, "Session"),
            ErrorCategory::Other => write!(f, "Other"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, may require attention
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, the session must be closed
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Context information for errors.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// The operation that was being performed
    pub operation: String,
    /// Additional context key-value pairs
    pub context: Vec<(String, String)>,
}

impl ErrorContext {
    /// Create a new error context for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            context: Vec::new(),
        }
    }

    /// Add a context key-value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation: {}", self.operation)?;
        for (key, value) in &self.context {
            write!(f, ", {key}: {value}")?;
        }
        Ok(())
    }
}

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, ctx: ErrorContext) -> Result<T, FormatError>;

    /// Add context with an operation name.
    fn with_context(self, operation: impl Into<String>) -> Result<T, FormatError>;
}

impl<T, E: Into<FormatError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, ctx: ErrorContext) -> Result<T, FormatError> {
        self.map_err(|e| {
            let err: FormatError = e.into();
            FormatError::Other(format!("{ctx}: {err}"))
        })
    }

    fn with_context(self, operation: impl Into<String>) -> Result<T, FormatError> {
        self.context(ErrorContext::new(operation))
    }
}
