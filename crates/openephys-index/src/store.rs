//! Loading and appending index documents on disk.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use openephys_errors::{FormatError, Result};

use crate::model::{ExperimentIndex, IndexRecording};
use crate::tree::XmlElement;

/// Load and parse the index at `path`.
///
/// A missing file, an unparsable document, or a root other than
/// `EXPERIMENT` is reported as [`FormatError::FileNotFound`].
pub fn load_index(path: &Path) -> Result<ExperimentIndex> {
    let text = fs::read_to_string(path)
        .map_err(|e| FormatError::file_not_found(path, e.to_string()))?;
    let root = XmlElement::parse(&text)
        .map_err(|e| FormatError::file_not_found(path, e.to_string()))?;
    ExperimentIndex::from_element(&root).map_err(|e| match e {
        FormatError::FileNotFound { reason, .. } => FormatError::file_not_found(path, reason),
        other => other,
    })
}

/// Append `recording` to the index at `path`, creating the document if needed.
///
/// An existing file that cannot be parsed as an experiment index is replaced
/// by a fresh document, matching how older writers recover. The new document
/// is written to a sibling temporary file and renamed into place.
pub fn append_recording(
    path: &Path,
    experiment_number: u32,
    recording: IndexRecording,
) -> Result<ExperimentIndex> {
    let mut index = match load_index(path) {
        Ok(index) => index,
        Err(FormatError::FileNotFound { reason, .. }) => {
            if path.exists() {
                warn!(path = ?path, reason = %reason, "replacing unreadable index");
            } else {
                debug!(path = ?path, "creating index");
            }
            ExperimentIndex::new(experiment_number)
        }
        Err(other) => return Err(other),
    };

    if index.recording(recording.number).is_some() {
        warn!(
            number = recording.number,
            "index already lists this recording number"
        );
    }
    info!(
        path = ?path,
        number = recording.number,
        streams = recording.streams.len(),
        "appending recording to index"
    );
    index.recordings.push(recording);

    write_index(path, &index)?;
    Ok(index)
}

/// Write `index` to `path` through a temporary sibling and a rename.
pub fn write_index(path: &Path, index: &ExperimentIndex) -> Result<()> {
    let text = index.to_element().to_xml()?;
    let temp_path = path.with_extension("xml.tmp");
    fs::write(&temp_path, text).map_err(|e| FormatError::write_failed(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| FormatError::write_failed(path, e))?;
    Ok(())
}
