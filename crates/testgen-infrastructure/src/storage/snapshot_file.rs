//! Owner-only snapshot file with atomic replacement.

use super::restrict_permissions;
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// Errors that can occur during snapshot file operations.
#[derive(Debug)]
pub enum SnapshotFileError {
    /// File I/O error.
    IoError(std::io::Error),
    /// The path has no parent directory or no file name.
    InvalidPath(PathBuf),
}

impl std::fmt::Display for SnapshotFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotFileError::IoError(e) => write!(f, "I/O error: {}", e),
            SnapshotFileError::InvalidPath(path) => {
                write!(f, "Invalid snapshot path: {}", path.display())
            }
        }
    }
}

impl std::error::Error for SnapshotFileError {}

impl From<std::io::Error> for SnapshotFileError {
    fn from(e: std::io::Error) -> Self {
        SnapshotFileError::IoError(e)
    }
}

impl From<SnapshotFileError> for testgen_core::TestGenError {
    fn from(e: SnapshotFileError) -> Self {
        match e {
            SnapshotFileError::IoError(e) => e.into(),
            SnapshotFileError::InvalidPath(path) => testgen_core::TestGenError::config(format!(
                "Invalid snapshot path: {}",
                path.display()
            )),
        }
    }
}

/// A handle to a snapshot file.
///
/// Provides:
/// - **Atomicity**: Writes go to a sibling tmp file that is renamed into place
/// - **Durability**: Explicit fsync before rename
/// - **Privacy**: The file is created with mode `0600`
///
/// There is no locking. Two writers racing on the same path each replace the
/// whole file and the last rename wins.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the raw snapshot bytes.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))`: The file exists
    /// - `Ok(None)`: The file doesn't exist
    /// - `Err`: The file exists but could not be read
    pub fn read(&self) -> Result<Option<Vec<u8>>, SnapshotFileError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the file's content atomically.
    pub fn write_atomic(&self, bytes: &[u8]) -> Result<(), SnapshotFileError> {
        let tmp_path = self.get_temp_path()?;
        if let Some(parent) = tmp_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut tmp_file = options.open(&tmp_path)?;
        tmp_file.write_all(bytes)?;

        // Ensure data is written to disk
        tmp_file.sync_all()?;
        drop(tmp_file);

        // A leftover tmp file from an earlier crash keeps its old mode
        restrict_permissions(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Deletes the file. Succeeds if it does not exist.
    pub fn remove(&self) -> Result<bool, SnapshotFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Gets a temporary file path for atomic writes.
    fn get_temp_path(&self) -> Result<PathBuf, SnapshotFileError> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SnapshotFileError::InvalidPath(self.path.clone()))?;
        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(self.path.with_file_name(tmp_name))
    }
}
