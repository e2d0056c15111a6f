//! Reader configuration.

use serde::{Deserialize, Serialize};

/// Options for [`ReaderSession`](crate::ReaderSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Check the text header of every mapped channel file
    pub validate_headers: bool,
    /// Fail instead of warning when a legacy probe sees recording numbers go backwards
    pub strict_probe: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            validate_headers: true,
            strict_probe: false,
        }
    }
}

impl PlaybackConfig {
    /// Enable or disable header validation.
    pub fn with_header_validation(mut self, enabled: bool) -> Self {
        self.validate_headers = enabled;
        self
    }

    /// Enable or disable strict legacy probing.
    pub fn with_strict_probe(mut self, enabled: bool) -> Self {
        self.strict_probe = enabled;
        self
    }
}
