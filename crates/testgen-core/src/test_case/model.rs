//! Test case domain model.

use crate::classification::Classification;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Review status of a generated test case.
///
/// Rejection is a status, never a removal.
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
pub enum TestCaseStatus {
    #[default]
    Draft,
    Approved,
    Rejected,
    Modified,
}

/// Test case priority.
///
/// Written capitalized; lowercase and uppercase spellings are read too.
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
#[strum(ascii_case_insensitive)]
pub enum Priority {
    #[serde(alias = "critical", alias = "CRITICAL")]
    Critical,
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[default]
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

/// What kind of check a test case performs.
///
/// Written capitalized (`"Positive"`, `"EdgeCase"`). Snake-case spellings are
/// accepted on read, and any other tag is kept verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TestKind {
    #[default]
    #[serde(alias = "positive")]
    Positive,
    #[serde(alias = "negative")]
    Negative,
    #[serde(alias = "boundary")]
    Boundary,
    #[serde(alias = "edge_case")]
    #[strum(serialize = "EdgeCase", serialize = "edge_case")]
    EdgeCase,
    #[serde(alias = "security")]
    Security,
    #[serde(alias = "performance")]
    Performance,
    #[serde(alias = "integration")]
    Integration,
    #[serde(untagged)]
    #[strum(default)]
    Other(String),
}

impl TestKind {
    pub fn as_str(&self) -> &str {
        match self {
            TestKind::Positive => "Positive",
            TestKind::Negative => "Negative",
            TestKind::Boundary => "Boundary",
            TestKind::EdgeCase => "EdgeCase",
            TestKind::Security => "Security",
            TestKind::Performance => "Performance",
            TestKind::Integration => "Integration",
            TestKind::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One numbered step of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    pub step: u32,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl TestStep {
    pub fn new(step: u32, action: impl Into<String>) -> Self {
        Self {
            step,
            action: action.into(),
            expected: None,
        }
    }
}

/// A test case owned by exactly one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique within the owning requirement
    pub id: String,
    pub title: String,
    pub priority: Priority,
    #[serde(rename = "test_type")]
    pub kind: TestKind,
    /// Design technique the case was derived with (e.g. `boundary_value_analysis`)
    pub technique: String,
    #[serde(default)]
    pub status: TestCaseStatus,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub steps: Vec<TestStep>,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default)]
    pub user_feedback: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(flatten)]
    pub classification: Classification,
    #[serde(default)]
    pub ui_element: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

impl TestCase {
    /// Creates a draft test case stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: Priority,
        kind: TestKind,
        technique: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority,
            kind,
            technique: technique.into(),
            status: TestCaseStatus::Draft,
            preconditions: Vec::new(),
            steps: Vec::new(),
            expected_result: String::new(),
            user_feedback: None,
            created_at: chrono::Local::now().to_rfc3339(),
            modified_at: None,
            classification: Classification::default(),
            ui_element: None,
            api_endpoint: None,
        }
    }

    pub fn with_steps<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = actions
            .into_iter()
            .enumerate()
            .map(|(i, action)| TestStep::new(i as u32 + 1, action))
            .collect();
        self
    }

    pub fn with_expected_result(mut self, expected: impl Into<String>) -> Self {
        self.expected_result = expected.into();
        self
    }

    pub fn with_preconditions<I, S>(mut self, preconditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preconditions = preconditions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }
}
