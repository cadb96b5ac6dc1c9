pub mod json_session_repository;
pub mod paths;
pub mod project_config;
pub mod schema;
pub mod signing;
pub mod storage;

pub use crate::json_session_repository::{IntegrityReport, JsonSessionRepository};
pub use crate::project_config::ProjectConfig;
pub use crate::signing::{KeyStore, SigningKey, SnapshotSigner};
