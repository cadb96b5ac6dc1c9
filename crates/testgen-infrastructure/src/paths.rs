//! File locations for a project's session store.
//!
//! # Directory Structure
//!
//! ```text
//! <project>/
//! ├── .testgen.toml                        # Optional project config
//! ├── .test_generator_state.json           # Signed session snapshot
//! ├── .test_generator_state.json.backup    # Previous snapshot
//! └── .ai-test-gen-signature-key           # 32-byte signing key
//! ```

use std::path::{Path, PathBuf};

pub const STATE_FILE_NAME: &str = ".test_generator_state.json";
pub const KEY_FILE_NAME: &str = ".ai-test-gen-signature-key";
pub const PROJECT_CONFIG_FILE_NAME: &str = ".testgen.toml";

/// Resolved paths for one project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub state_file: PathBuf,
    pub key_file: PathBuf,
    pub config_file: PathBuf,
}

impl ProjectPaths {
    /// Default layout under `project_dir`.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            state_file: project_dir.join(STATE_FILE_NAME),
            key_file: project_dir.join(KEY_FILE_NAME),
            config_file: project_dir.join(PROJECT_CONFIG_FILE_NAME),
        }
    }

    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = path;
        self
    }

    pub fn with_key_file(mut self, path: PathBuf) -> Self {
        self.key_file = path;
        self
    }
}

/// Makes `path` absolute against `base` if it is relative.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
