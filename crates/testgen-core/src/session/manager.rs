use super::model::{Session, SessionConfig};
use super::repository::{LoadedSession, SessionRepository};
use super::summary::{render_agent_context, SessionSummary};
use crate::error::{Result, TestGenError};
use tracing::{debug, error, info, warn};

/// Owns the active session and sequences load/save around its repository.
///
/// `SessionManager` is responsible for:
/// - Creating new sessions (persisted immediately)
/// - Loading and self-healing stored sessions
/// - Saving after mutations
/// - Clearing the stored session
pub struct SessionManager<R: SessionRepository> {
    repository: R,
    /// Settings applied to sessions this manager creates
    defaults: SessionConfig,
    session: Option<Session>,
    /// Set while the stored snapshot of the active session is unsigned
    needs_resign: bool,
}

impl<R: SessionRepository> SessionManager<R> {
    /// Creates a manager with no session loaded.
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            defaults: SessionConfig::default(),
            session: None,
            needs_resign: false,
        }
    }

    /// Sets the configuration new sessions start from.
    pub fn with_defaults(mut self, defaults: SessionConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Creates a new session, persists it, and makes it active.
    ///
    /// Replaces whatever session was active before.
    ///
    /// # Errors
    ///
    /// Returns an error if the first save fails. The new session stays active
    /// in memory so the caller may retry `save`.
    pub fn create_session(
        &mut self,
        session_id: Option<String>,
        agent_type: Option<String>,
    ) -> Result<&Session> {
        let mut config = self.defaults.clone();
        if agent_type.is_some() {
            config.agent_type = agent_type;
        }

        let session = Session::new(session_id, config);
        info!("Created session {}", session.session_id);
        self.session = Some(session);
        self.needs_resign = false;
        self.save()?;

        self.session.as_ref().ok_or(TestGenError::NoSession)
    }

    /// Loads the stored session and makes it active.
    ///
    /// Counters are recomputed from the records and missing fingerprints
    /// filled in. A snapshot that carried no signature is saved (and thereby
    /// signed) immediately; if that save fails the session is still returned
    /// and the re-sign stays pending until the next successful `save`.
    ///
    /// # Returns
    ///
    /// `Some(session)` if a usable session was stored, `None` otherwise.
    pub fn load(&mut self) -> Result<Option<&Session>> {
        let Some(LoadedSession {
            mut session,
            needs_resign,
            restored_from_backup,
        }) = self.repository.load()?
        else {
            debug!("No stored session");
            self.session = None;
            self.needs_resign = false;
            return Ok(None);
        };

        if restored_from_backup {
            warn!(
                target: "security",
                session_id = %session.session_id,
                "session restored from backup"
            );
        }
        if let Some(stale) = session.reconcile_progress() {
            warn!(
                "Stored total_requirements was {}, corrected to {}",
                stale,
                session.requirements.len()
            );
        }
        let filled = session.fill_missing_fingerprints();
        if filled > 0 {
            debug!("Filled {} missing requirement fingerprints", filled);
        }

        info!("Loaded session {}", session.session_id);
        self.session = Some(session);
        self.needs_resign = needs_resign;

        if needs_resign {
            info!("Re-signing unsigned session snapshot");
            if let Err(e) = self.save() {
                warn!(target: "security", "Unsigned snapshot not re-signed yet: {}", e);
            }
        }

        Ok(self.session.as_ref())
    }

    /// Loads the stored session, or creates one if there is none.
    pub fn get_or_create(
        &mut self,
        session_id: Option<String>,
        agent_type: Option<String>,
    ) -> Result<&Session> {
        if self.load()?.is_none() {
            self.create_session(session_id, agent_type)?;
        }
        self.session.as_ref().ok_or(TestGenError::NoSession)
    }

    /// Saves the active session.
    ///
    /// Stamps `updated_at` and recomputes every derived counter first.
    ///
    /// # Errors
    ///
    /// Returns `NoSession` if nothing is active, or the repository's error.
    /// In-memory state is left as it was.
    pub fn save(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(TestGenError::NoSession)?;
        session.touch();
        session.reconcile_progress();

        self.repository.save(session).inspect_err(|e| {
            error!("Failed to save session {}: {}", session.session_id, e);
        })?;
        self.needs_resign = false;
        Ok(())
    }

    /// True while the stored snapshot is still unsigned.
    pub fn needs_resign(&self) -> bool {
        self.needs_resign
    }

    /// Applies `f` to the active session, then saves.
    ///
    /// If `f` fails nothing is saved.
    pub fn update<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let value = f(self.session_mut()?)?;
        self.save()?;
        Ok(value)
    }

    /// Drops the active session and deletes its stored snapshot.
    pub fn clear(&mut self) -> Result<()> {
        self.repository.clear()?;
        self.needs_resign = false;
        if let Some(session) = self.session.take() {
            info!("Cleared session {}", session.session_id);
        }
        Ok(())
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(TestGenError::NoSession)
    }

    /// Human-readable context dump of the active session.
    pub fn context(&self) -> Result<String> {
        self.session
            .as_ref()
            .map(render_agent_context)
            .ok_or(TestGenError::NoSession)
    }

    /// Machine-readable summary of the active session.
    pub fn summary(&self) -> Result<SessionSummary> {
        self.session
            .as_ref()
            .map(SessionSummary::from_session)
            .ok_or(TestGenError::NoSession)
    }
}
