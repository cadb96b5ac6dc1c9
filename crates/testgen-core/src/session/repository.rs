//! Session repository trait.
//!
//! Defines the interface for persisting the single session of a working
//! directory.

use super::model::Session;
use crate::error::Result;

/// A session as handed back by a repository, with what the load had to do.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSession {
    pub session: Session,
    /// The snapshot carried no signature and should be re-signed right away
    pub needs_resign: bool,
    /// The primary snapshot was rejected and the backup took its place
    pub restored_from_backup: bool,
}

impl LoadedSession {
    /// A snapshot that passed every check on the first try.
    pub fn verified(session: Session) -> Self {
        Self {
            session,
            needs_resign: false,
            restored_from_backup: false,
        }
    }
}

/// An abstract repository for the persisted session.
///
/// Decouples the lifecycle manager from how snapshots are stored and
/// protected.
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Integrity checking (and recovery) on load
/// - Keeping the previous snapshot as a fallback on save
///
/// There is one writer per backing store; implementations do not arbitrate
/// concurrent writers.
pub trait SessionRepository {
    /// Loads the stored session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(LoadedSession))`: A usable session was found
    /// - `Ok(None)`: Nothing stored, or nothing stored that can be trusted
    /// - `Err(_)`: The store could not be read at all
    fn load(&self) -> Result<Option<LoadedSession>>;

    /// Persists a snapshot of `session`, replacing the previous one.
    fn save(&self, session: &Session) -> Result<()>;

    /// Removes the stored session. Succeeds if nothing was stored.
    fn clear(&self) -> Result<()>;
}
