//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: The root aggregate (`Session`) and its settings (`SessionConfig`)
//! - `progress`: Derived progress summary (`GenerationProgress`, `GenerationStep`)
//! - `records`: Record store operations on `Session`
//! - `summary`: Context dump and machine summary for a generation agent
//! - `repository`: Repository trait for session persistence
//! - `manager`: Session lifecycle management (`SessionManager`)

mod manager;
mod model;
mod progress;
mod records;
mod repository;
mod summary;

// Re-export public API
pub use manager::SessionManager;
pub use model::{Session, SessionConfig};
pub use progress::{GenerationProgress, GenerationStep};
pub use repository::{LoadedSession, SessionRepository};
pub use summary::{render_agent_context, ProgressSummary, RequirementSummary, SessionSummary};
