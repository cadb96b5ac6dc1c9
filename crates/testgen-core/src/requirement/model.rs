//! Requirement domain model.

use super::status::RequirementStatus;
use crate::classification::Classification;
use crate::fingerprint::fingerprint;
use crate::test_case::TestCase;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Where a requirement text came from.
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
pub enum RequirementSource {
    /// Typed in by the user or agent
    #[default]
    Manual,
    /// Extracted from a local markdown/text file
    File,
    /// Fetched from a remote document service page
    Confluence,
    /// Bundled demo requirement
    Demo,
}

/// Structured analysis attached by the requirement analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementAnalysis {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub business_rules: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub suggested_techniques: Vec<String>,
}

/// A single requirement owned by a session.
///
/// Requirements are never deleted; they only change status. The identifier is
/// `REQ-NNN`, allocated sequentially by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    /// Text as stored (the sanitizer's output)
    pub text: String,
    pub source: RequirementSource,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub status: RequirementStatus,
    #[serde(default)]
    pub analysis: Option<RequirementAnalysis>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Fingerprint of the submitted text, used for de-duplication
    #[serde(rename = "hash", default)]
    pub fingerprint: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub classification: Classification,
    #[serde(default)]
    pub title: Option<String>,
    /// Normalized rendering used for generation prompts
    #[serde(default)]
    pub structured_text: Option<String>,
    #[serde(default)]
    pub review_feedback: Vec<String>,
}

impl Requirement {
    /// Creates a pending requirement.
    ///
    /// `submitted` is the text the caller handed in; `stored` is what the
    /// sanitizer returned for it. The fingerprint tracks the submitted text so
    /// that re-submitting the same input is recognized even when the stored
    /// copy was wrapped.
    pub fn new(
        id: impl Into<String>,
        submitted: &str,
        stored: impl Into<String>,
        source: RequirementSource,
        source_ref: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: stored.into(),
            source,
            source_ref,
            status: RequirementStatus::Pending,
            analysis: None,
            test_cases: Vec::new(),
            fingerprint: fingerprint(submitted),
            created_at: chrono::Local::now().to_rfc3339(),
            processed_at: None,
            error: None,
            classification: Classification::default(),
            title: None,
            structured_text: None,
            review_feedback: Vec::new(),
        }
    }

    /// Returns true if `text` fingerprints differently from this requirement.
    pub fn has_changed(&self, text: &str) -> bool {
        !self.matches_fingerprint(&fingerprint(text))
    }

    /// Compares against the stored fingerprint and against one recomputed
    /// from the stored text.
    ///
    /// Snapshots from older versions carry a `hash` of another digest, so the
    /// stored value alone cannot be trusted.
    pub fn matches_fingerprint(&self, target: &str) -> bool {
        self.fingerprint == target || fingerprint(&self.text) == target
    }

    /// Looks up a test case by id.
    pub fn test_case(&self, test_case_id: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|tc| tc.id == test_case_id)
    }

    /// Preview of the stored text, cut at `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.text, max_chars)
    }
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
