//! Error types for oephys

use openephys_errors::FormatError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::NotFound(_) => 2,
            CliError::InvalidArgument(_) => 3,
            CliError::Format(FormatError::FileNotFound { .. }) => 2,
            CliError::Format(e) if e.is_recoverable() => 4,
            CliError::Format(_) => 5,
            CliError::JsonError(_) => 4,
        }
    }
}
