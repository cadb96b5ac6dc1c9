//! One-level backup of the session snapshot.

use super::snapshot_file::{SnapshotFile, SnapshotFileError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Why a restore did not happen.
#[derive(Debug)]
pub enum RestoreError {
    /// There is no backup to restore from.
    NoBackup,
    /// The backup exists but was rejected.
    Invalid(String),
    /// Reading the backup or writing the primary failed.
    Storage(SnapshotFileError),
}

impl std::fmt::Display for RestoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreError::NoBackup => write!(f, "No backup file found"),
            RestoreError::Invalid(reason) => write!(f, "Backup file is invalid: {}", reason),
            RestoreError::Storage(e) => write!(f, "Backup storage error: {}", e),
        }
    }
}

impl std::error::Error for RestoreError {}

impl From<SnapshotFileError> for RestoreError {
    fn from(e: SnapshotFileError) -> Self {
        RestoreError::Storage(e)
    }
}

/// Keeps the previous snapshot beside the primary one (`<name>.backup`).
///
/// Only the most recent previous snapshot is kept.
#[derive(Debug, Clone)]
pub struct BackupManager {
    primary: SnapshotFile,
    backup: SnapshotFile,
}

impl BackupManager {
    pub fn new(primary_path: impl Into<PathBuf>) -> Self {
        let primary_path = primary_path.into();
        let backup_path = Self::backup_path_for(&primary_path);
        Self {
            primary: SnapshotFile::new(primary_path),
            backup: SnapshotFile::new(backup_path),
        }
    }

    /// `state.json` -> `state.json.backup`
    pub fn backup_path_for(primary: &Path) -> PathBuf {
        let mut name = primary.file_name().unwrap_or_default().to_os_string();
        name.push(".backup");
        primary.with_file_name(name)
    }

    pub fn backup_path(&self) -> &Path {
        self.backup.path()
    }

    /// Copies the current primary snapshot over the backup.
    ///
    /// Returns `false` without touching the backup when there is no primary.
    pub fn backup(&self) -> Result<bool, SnapshotFileError> {
        let Some(bytes) = self.primary.read()? else {
            return Ok(false);
        };
        self.backup.write_atomic(&bytes)?;
        debug!("Created backup: {}", self.backup.path().display());
        Ok(true)
    }

    /// Puts the backup back in place of the primary snapshot.
    ///
    /// `accept` sees the backup bytes first; the primary is only overwritten
    /// if it returns `Ok`, and its value is handed back.
    pub fn restore<T, F>(&self, accept: F) -> Result<T, RestoreError>
    where
        F: FnOnce(&[u8]) -> Result<T, String>,
    {
        let Some(bytes) = self.backup.read()? else {
            warn!("No backup file found");
            return Err(RestoreError::NoBackup);
        };

        let accepted = accept(&bytes).map_err(|reason| {
            warn!(
                target: "security",
                path = %self.backup.path().display(),
                reason = %reason,
                "backup rejected"
            );
            RestoreError::Invalid(reason)
        })?;

        self.primary.write_atomic(&bytes)?;
        info!("Restored state from backup: {}", self.backup.path().display());
        Ok(accepted)
    }

    /// Removes the backup file, if any.
    pub fn remove(&self) -> Result<bool, SnapshotFileError> {
        self.backup.remove()
    }
}
