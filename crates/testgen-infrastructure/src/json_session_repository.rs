//! JSON file-based session repository with signed snapshots.

use crate::schema::validate_schema;
use crate::signing::{SignatureCheck, SnapshotSigner};
use crate::storage::{BackupManager, RestoreError, SnapshotFile};
use serde_json::Value;
use std::path::{Path, PathBuf};
use testgen_core::session::{LoadedSession, Session, SessionRepository};
use testgen_core::Result;
use tracing::{debug, error, info, warn};

/// A snapshot that passed the structural, signature and decode checks.
struct CheckedSnapshot {
    session: Session,
    signed: bool,
}

/// Stores one session as a signed JSON snapshot.
///
/// # Load protocol
///
/// 1. A missing file means "no session yet".
/// 2. The snapshot must parse, match the state schema, carry a valid signature
///    (or none at all) and decode into a `Session`.
/// 3. Any failure in step 2 triggers exactly one restore from the backup,
///    which must pass the same checks and must be signed. Otherwise the load
///    yields `None`.
///
/// # Save protocol
///
/// The snapshot is signed, the current file is copied to the backup, and the
/// new snapshot is written atomically with mode `0600`.
pub struct JsonSessionRepository {
    file: SnapshotFile,
    backups: BackupManager,
    signer: SnapshotSigner,
}

impl JsonSessionRepository {
    /// Creates a repository for the snapshot at `path`, signing with `signer`.
    pub fn new(path: impl Into<PathBuf>, signer: SnapshotSigner) -> Self {
        let path = path.into();
        Self {
            backups: BackupManager::new(path.clone()),
            file: SnapshotFile::new(path),
            signer,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn backup_path(&self) -> &Path {
        self.backups.backup_path()
    }

    /// Runs the integrity checks on the stored snapshot without loading it.
    ///
    /// Returns `Ok(None)` when no snapshot exists.
    pub fn verify(&self) -> Result<Option<IntegrityReport>> {
        let Some(bytes) = self.file.read()? else {
            return Ok(None);
        };
        let report = match self.check(&bytes) {
            Ok(checked) => IntegrityReport {
                signed: checked.signed,
                requirements: checked.session.requirements.len(),
                stale_total: checked.session.progress.total_requirements
                    != checked.session.requirements.len(),
                problem: None,
            },
            Err(reason) => IntegrityReport {
                signed: false,
                requirements: 0,
                stale_total: false,
                problem: Some(reason),
            },
        };
        Ok(Some(report))
    }

    fn check(&self, bytes: &[u8]) -> std::result::Result<CheckedSnapshot, String> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON: {e}"))?;
        validate_schema(&value)?;

        let signed = match self.signer.verify(&value).map_err(|e| e.to_string())? {
            SignatureCheck::Valid => true,
            SignatureCheck::Missing => false,
            SignatureCheck::Mismatch => return Err("HMAC signature mismatch".to_string()),
        };

        let session: Session =
            serde_json::from_value(value).map_err(|e| format!("Undecodable session: {e}"))?;
        Ok(CheckedSnapshot { session, signed })
    }

    fn recover(&self) -> Option<LoadedSession> {
        let restored = self.backups.restore(|bytes| {
            let checked = self.check(bytes)?;
            if checked.signed {
                Ok(checked.session)
            } else {
                Err("backup snapshot is not signed".to_string())
            }
        });

        match restored {
            Ok(session) => Some(LoadedSession {
                session,
                needs_resign: false,
                restored_from_backup: true,
            }),
            Err(RestoreError::Storage(e)) => {
                error!("Failed to restore from backup: {}", e);
                None
            }
            Err(e) => {
                warn!(
                    target: "security",
                    path = %self.path().display(),
                    reason = %e,
                    "no usable session"
                );
                None
            }
        }
    }
}

/// Result of [`JsonSessionRepository::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub signed: bool,
    pub requirements: usize,
    /// Stored `total_requirements` disagrees with the record count
    pub stale_total: bool,
    /// Why the snapshot would be rejected, if it would be
    pub problem: Option<String>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.problem.is_none()
    }
}

impl SessionRepository for JsonSessionRepository {
    fn load(&self) -> Result<Option<LoadedSession>> {
        let Some(bytes) = self.file.read()? else {
            debug!("State file not found: {}", self.path().display());
            return Ok(None);
        };

        match self.check(&bytes) {
            Ok(CheckedSnapshot { session, signed }) => {
                if !signed {
                    warn!("State file has no signature, it will be signed on the next save");
                }
                Ok(Some(LoadedSession {
                    session,
                    needs_resign: !signed,
                    restored_from_backup: false,
                }))
            }
            Err(reason) => {
                warn!(
                    target: "security",
                    path = %self.path().display(),
                    reason = %reason,
                    "state integrity failure, attempting restore from backup"
                );
                Ok(self.recover())
            }
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let snapshot = self.signer.sign(serde_json::to_value(session)?)?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        // Backup failure is logged, not fatal
        if let Err(e) = self.backups.backup() {
            error!("Failed to create backup: {}", e);
        }

        self.file.write_atomic(&bytes)?;
        debug!("Session saved: {}", self.path().display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.file.remove()? {
            info!("Removed state file: {}", self.path().display());
        }
        self.backups.remove()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SigningKey;
    use testgen_core::session::SessionConfig;
    use tempfile::TempDir;

    fn repository(dir: &TempDir) -> JsonSessionRepository {
        JsonSessionRepository::new(
            dir.path().join("state.json"),
            SnapshotSigner::new(SigningKey::from_bytes([7u8; SigningKey::LEN])),
        )
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(repository(&temp_dir).load().unwrap().is_none());
        assert!(repository(&temp_dir).verify().unwrap().is_none());
    }

    #[test]
    fn test_saved_snapshot_is_signed_and_verifies() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        repo.save(&Session::new(Some("s1".to_string()), SessionConfig::default()))
            .unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(repo.path()).unwrap()).unwrap();
        assert_eq!(raw["_signature"].as_str().unwrap().len(), 64);

        let report = repo.verify().unwrap().unwrap();
        assert!(report.is_valid());
        assert!(report.signed);
    }

    #[test]
    fn test_second_save_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        let mut session = Session::new(Some("s1".to_string()), SessionConfig::default());

        repo.save(&session).unwrap();
        assert!(!repo.backup_path().exists());

        session.add_note("second");
        repo.save(&session).unwrap();
        let backup: Value =
            serde_json::from_slice(&std::fs::read(repo.backup_path()).unwrap()).unwrap();
        assert!(backup["notes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_snapshot_and_backup() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        let session = Session::new(Some("s1".to_string()), SessionConfig::default());
        repo.save(&session).unwrap();
        repo.save(&session).unwrap();

        repo.clear().unwrap();
        assert!(!repo.path().exists());
        assert!(!repo.backup_path().exists());
        repo.clear().unwrap();
    }

    #[test]
    fn test_garbage_without_backup_is_no_session() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        std::fs::write(repo.path(), b"{ not json").unwrap();

        assert!(repo.load().unwrap().is_none());
        let report = repo.verify().unwrap().unwrap();
        assert!(report.problem.unwrap().starts_with("Invalid JSON"));
    }
}
