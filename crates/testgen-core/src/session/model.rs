//! Session domain model.

use super::progress::GenerationProgress;
use crate::fingerprint::fingerprint;
use crate::requirement::{Requirement, RequirementStatus};
use crate::test_case::TestCaseStatus;
use serde::{Deserialize, Serialize};

/// Generation settings chosen when the session was created.
///
/// Flattened into the session on disk: `llm_provider`, `techniques`,
/// `output_format`, `output_path` and `agent_type` are top-level fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Name of the driving agent ("claude_code", "qwen_code", "cursor", ...)
    #[serde(default)]
    pub agent_type: Option<String>,
}

fn default_llm_provider() -> String {
    "anthropic".to_string()
}

fn default_output_format() -> String {
    "excel".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            llm_provider: default_llm_provider(),
            techniques: Vec::new(),
            output_format: default_output_format(),
            output_path: None,
            agent_type: None,
        }
    }
}

/// The root aggregate: everything one working session knows.
///
/// A session owns its requirements, which own their test cases. Nothing is
/// ever removed from the graph; the session itself goes away only when its
/// backing file is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(flatten)]
    pub config: SessionConfig,
    pub requirements: Vec<Requirement>,
    pub progress: GenerationProgress,
    #[serde(default)]
    pub total_tokens_used: u64,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Session {
    /// Creates an empty session.
    ///
    /// Without an explicit id one is generated from the local time
    /// (`YYYYmmdd_HHMMSS`).
    pub fn new(session_id: Option<String>, config: SessionConfig) -> Self {
        let now = chrono::Local::now();
        let session_id = session_id.unwrap_or_else(|| now.format("%Y%m%d_%H%M%S").to_string());

        Self {
            session_id,
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
            config,
            requirements: Vec::new(),
            progress: GenerationProgress::default(),
            total_tokens_used: 0,
            notes: Vec::new(),
        }
    }

    /// Stamps `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Local::now().to_rfc3339();
    }

    /// Recomputes every progress counter from the records.
    ///
    /// Returns the previously stored `total_requirements` when it disagreed
    /// with the actual requirement count.
    pub fn reconcile_progress(&mut self) -> Option<usize> {
        let actual = self.requirements.len();
        let stale = (self.progress.total_requirements != actual)
            .then_some(self.progress.total_requirements);

        self.progress.total_requirements = actual;
        self.progress.processed_requirements = self
            .requirements
            .iter()
            .filter(|r| r.status == RequirementStatus::Completed)
            .count();
        self.progress.total_test_cases = self.total_test_cases();
        self.progress.approved_test_cases = self.count_test_cases(TestCaseStatus::Approved);
        self.progress.rejected_test_cases = self.count_test_cases(TestCaseStatus::Rejected);

        stale
    }

    /// Fills in fingerprints missing from records written by older versions.
    ///
    /// Returns how many were filled.
    pub fn fill_missing_fingerprints(&mut self) -> usize {
        let mut filled = 0;
        for req in self.requirements.iter_mut().filter(|r| r.fingerprint.is_empty()) {
            req.fingerprint = fingerprint(&req.text);
            filled += 1;
        }
        filled
    }

    pub fn total_test_cases(&self) -> usize {
        self.requirements.iter().map(|r| r.test_cases.len()).sum()
    }

    /// Approved test cases, counted from current statuses.
    pub fn approved_test_cases(&self) -> usize {
        self.count_test_cases(TestCaseStatus::Approved)
    }

    /// Rejected test cases, counted from current statuses.
    pub fn rejected_test_cases(&self) -> usize {
        self.count_test_cases(TestCaseStatus::Rejected)
    }

    /// Test cases still waiting for review.
    pub fn draft_test_case_count(&self) -> usize {
        self.count_test_cases(TestCaseStatus::Draft)
    }

    fn count_test_cases(&self, status: TestCaseStatus) -> usize {
        self.requirements
            .iter()
            .flat_map(|r| r.test_cases.iter())
            .filter(|tc| tc.status == status)
            .count()
    }
}
