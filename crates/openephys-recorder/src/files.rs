//! Append-only data files with atomic creation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use openephys_errors::{FormatError, Result};

/// One append-only output file.
///
/// A file created by [`DataFile::open`] either has its complete header or does
/// not exist: the header is written to a temporary sibling and renamed into
/// place before the file is opened for appending.
#[derive(Debug)]
pub(crate) struct DataFile {
    path: PathBuf,
    writer: BufWriter<File>,
    start_position: u64,
    written: u64,
}

impl DataFile {
    /// Open `path` for appending, creating it with `header` when missing.
    pub(crate) fn open(path: PathBuf, header: Option<&[u8]>) -> Result<Self> {
        if !path.exists() {
            if let Some(header) = header {
                create_with_header(&path, header)?;
            } else {
                debug!(path = ?path, "creating file");
            }
        } else {
            debug!(path = ?path, "file already exists, appending");
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| FormatError::write_failed(&path, e))?;
        let start_position = file
            .metadata()
            .map_err(|e| FormatError::write_failed(&path, e))?
            .len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            start_position,
            written: 0,
        })
    }

    /// Append `bytes`.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| FormatError::write_failed(&self.path, e))?;
        self.written = self.written.saturating_add(bytes.len() as u64);
        Ok(())
    }

    /// Push buffered bytes to the OS.
    pub(crate) fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| FormatError::write_failed(&self.path, e))
    }

    /// File length when the session opened it.
    pub(crate) fn start_position(&self) -> u64 {
        self.start_position
    }

    /// Logical file length including buffered bytes.
    pub(crate) fn position(&self) -> u64 {
        self.start_position.saturating_add(self.written)
    }

    /// File name without the directory.
    pub(crate) fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn create_with_header(path: &Path, header: &[u8]) -> Result<()> {
    let temp_path = path.with_file_name(format!(
        "{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    debug!(path = ?path, bytes = header.len(), "writing header");

    let result = fs::write(&temp_path, header).and_then(|()| fs::rename(&temp_path, path));
    if let Err(e) = result {
        if temp_path.exists() && fs::remove_file(&temp_path).is_err() {
            debug!(path = ?temp_path, "could not remove temporary header file");
        }
        return Err(FormatError::write_failed(path, e));
    }
    Ok(())
}
