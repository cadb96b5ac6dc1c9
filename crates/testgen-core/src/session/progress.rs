//! Generation progress summary.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The step the generation agent is currently on.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationStep {
    #[default]
    Idle,
    Loading,
    Analyzing,
    SelectingTechniques,
    Generating,
    Reviewing,
    Exporting,
    Completed,
}

/// Progress summary owned by a session.
///
/// Every counter is derived from the requirement records and refreshed by
/// `Session::reconcile_progress`; the values on disk are a snapshot, never a
/// source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub total_requirements: usize,
    pub processed_requirements: usize,
    #[serde(default)]
    pub total_test_cases: usize,
    #[serde(default)]
    pub approved_test_cases: usize,
    #[serde(default)]
    pub rejected_test_cases: usize,
    #[serde(default)]
    pub current_requirement_id: Option<String>,
    #[serde(default)]
    pub current_step: GenerationStep,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default)]
    pub last_action_at: Option<String>,
}

impl GenerationProgress {
    /// Processed share of all requirements, in percent.
    pub fn completion_percentage(&self) -> f64 {
        if self.total_requirements == 0 {
            return 0.0;
        }
        self.processed_requirements as f64 / self.total_requirements as f64 * 100.0
    }
}
