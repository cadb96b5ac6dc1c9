//! Per-project defaults read from `.testgen.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use testgen_core::session::SessionConfig;
use testgen_core::{Result, TestGenError};
use tracing::debug;

/// Settings new sessions in a project start from.
///
/// ```toml
/// llm_provider = "anthropic"
/// techniques = ["equivalence_partitioning", "boundary_value_analysis"]
/// output_format = "excel"
/// output_path = "out/test_cases.xlsx"
/// agent_type = "claude_code"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub llm_provider: String,
    pub techniques: Vec<String>,
    pub output_format: String,
    pub output_path: Option<String>,
    pub agent_type: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            llm_provider: defaults.llm_provider,
            techniques: defaults.techniques,
            output_format: defaults.output_format,
            output_path: defaults.output_path,
            agent_type: defaults.agent_type,
        }
    }
}

impl ProjectConfig {
    /// Loads the config file.
    ///
    /// A missing or blank file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No project config at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&content)
            .map_err(|e| TestGenError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            llm_provider: self.llm_provider.clone(),
            techniques: self.techniques.clone(),
            output_format: self.output_format.clone(),
            output_path: self.output_path.clone(),
            agent_type: self.agent_type.clone(),
        }
    }
}
