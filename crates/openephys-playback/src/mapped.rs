//! Read-only memory maps of data files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use openephys_errors::{FormatError, Result};

/// A data file mapped read-only for the lifetime of the value.
///
/// Empty files are not mapped and expose an empty slice.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    map: Option<Mmap>,
}

impl MappedFile {
    /// Map `path`, reporting a missing or unreadable file as
    /// [`FormatError::FileNotFound`].
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| FormatError::file_not_found(path, e.to_string()))?;
        let len = file
            .metadata()
            .map_err(|e| FormatError::file_not_found(path, e.to_string()))?
            .len();

        let map = if len == 0 {
            None
        } else {
            Some(map_read_only(&file).map_err(|e| FormatError::file_not_found(path, e.to_string()))?)
        };
        debug!(path = ?path, bytes = len, "mapped data file");

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    /// Mapped bytes.
    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }

    /// File length in bytes.
    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// True for an empty file.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Path the file was mapped from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[expect(unsafe_code, reason = "memory mapping requires unsafe")]
fn map_read_only(file: &File) -> io::Result<Mmap> {
    // SAFETY: the map is read-only and recordings are immutable while a reader
    // session holds them; concurrent truncation by another process is outside
    // the supported model.
    unsafe { Mmap::map(file) }
}
