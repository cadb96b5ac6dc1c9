//! Storage layer for snapshot files and their backups.

mod backup;
mod snapshot_file;

pub use backup::{BackupManager, RestoreError};
pub use snapshot_file::{SnapshotFile, SnapshotFileError};

use std::path::Path;

/// Restricts `path` to owner read/write (`0600`). No-op on non-Unix targets.
pub fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
