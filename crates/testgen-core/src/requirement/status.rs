//! Requirement processing status and its transition table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Where a requirement is in the generation pipeline.
///
/// `Analyzing`, `Generating` and `Review` are part of the contract even though
/// the common flows jump straight between `Pending`, `Analyzed`, `Completed`
/// and `Failed`.
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
pub enum RequirementStatus {
    /// Submitted, nothing done yet
    #[default]
    Pending,
    /// Analysis in progress
    Analyzing,
    /// Analysis attached
    Analyzed,
    /// Test case generation in progress
    Generating,
    /// Test cases generated
    Completed,
    /// Processing failed; see the requirement's error
    Failed,
    /// Waiting for a human reviewer
    Review,
}

impl RequirementStatus {
    /// Returns whether a requirement in `self` may move to `next`.
    ///
    /// Staying put is always allowed. Any stage may fail and a failed
    /// requirement may be retried from any stage. `Pending` is only re-entered
    /// through `Failed`, and once generation has started the requirement does
    /// not go back to `Analyzing`.
    pub fn can_transition_to(self, next: RequirementStatus) -> bool {
        use RequirementStatus::*;

        if self == next {
            return true;
        }

        match (self, next) {
            (_, Failed) | (Failed, _) => true,
            (Pending, _) => true,
            (_, Pending) => false,
            (Analyzing, Analyzed | Generating | Completed | Review) => true,
            (Analyzed, Analyzing | Generating | Completed | Review) => true,
            (Generating, Analyzed | Completed | Review) => true,
            (Review, Analyzed | Generating | Completed) => true,
            (Completed, Analyzed | Generating | Review) => true,
            (Generating | Review | Completed, Analyzing) => false,
            // Handled by the equality check; kept for exhaustiveness.
            (Analyzing, Analyzing)
            | (Analyzed, Analyzed)
            | (Generating, Generating)
            | (Review, Review)
            | (Completed, Completed) => true,
        }
    }

    /// Short marker used in the agent context dump.
    pub fn marker(self) -> &'static str {
        match self {
            RequirementStatus::Pending => "[ ]",
            RequirementStatus::Analyzing => "[~]",
            RequirementStatus::Analyzed => "[a]",
            RequirementStatus::Generating => "[g]",
            RequirementStatus::Completed => "[x]",
            RequirementStatus::Failed => "[!]",
            RequirementStatus::Review => "[r]",
        }
    }
}
