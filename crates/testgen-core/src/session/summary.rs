//! Views a generation agent uses to re-orient itself after a restart.

use super::model::Session;
use crate::requirement::preview;
use serde::Serialize;
use std::fmt::Write;

const SUMMARY_PREVIEW_CHARS: usize = 50;
const CONTEXT_PREVIEW_CHARS: usize = 80;
const CONTEXT_RECENT_NOTES: usize = 5;

/// Machine-readable session summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub llm_provider: String,
    pub agent_type: Option<String>,
    pub progress: ProgressSummary,
    pub requirements: Vec<RequirementSummary>,
    pub total_tokens_used: u64,
    pub notes_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_requirements: usize,
    pub processed_requirements: usize,
    pub total_test_cases: usize,
    pub approved_test_cases: usize,
    pub rejected_test_cases: usize,
    pub current_step: String,
    pub current_requirement_id: Option<String>,
    pub last_action: Option<String>,
    /// Formatted as `"x.y%"`
    pub completion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementSummary {
    pub id: String,
    pub status: String,
    pub test_cases_count: usize,
    pub text_preview: String,
}

impl SessionSummary {
    /// Builds the summary from current records; counts are derived, not read
    /// from the stored progress block.
    pub fn from_session(session: &Session) -> Self {
        let processed = session
            .requirements
            .iter()
            .filter(|r| r.status == crate::requirement::RequirementStatus::Completed)
            .count();
        let total = session.requirements.len();
        let completion = if total == 0 {
            0.0
        } else {
            processed as f64 / total as f64 * 100.0
        };

        Self {
            session_id: session.session_id.clone(),
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
            llm_provider: session.config.llm_provider.clone(),
            agent_type: session.config.agent_type.clone(),
            progress: ProgressSummary {
                total_requirements: total,
                processed_requirements: processed,
                total_test_cases: session.total_test_cases(),
                approved_test_cases: session.approved_test_cases(),
                rejected_test_cases: session.rejected_test_cases(),
                current_step: session.progress.current_step.to_string(),
                current_requirement_id: session.progress.current_requirement_id.clone(),
                last_action: session.progress.last_action.clone(),
                completion: format!("{completion:.1}%"),
            },
            requirements: session
                .requirements
                .iter()
                .map(|r| RequirementSummary {
                    id: r.id.clone(),
                    status: r.status.to_string(),
                    test_cases_count: r.test_cases.len(),
                    text_preview: preview(&r.text, SUMMARY_PREVIEW_CHARS),
                })
                .collect(),
            total_tokens_used: session.total_tokens_used,
            notes_count: session.notes.len(),
        }
    }
}

/// Renders the human-readable context dump.
pub fn render_agent_context(session: &Session) -> String {
    let summary = SessionSummary::from_session(session);
    let progress = &summary.progress;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# Test Generation Session");
    let _ = writeln!(out);
    let _ = writeln!(out, "Session: {}", session.session_id);
    let _ = writeln!(out, "Updated: {}", session.updated_at);
    let _ = writeln!(out, "Provider: {}", session.config.llm_provider);
    let _ = writeln!(
        out,
        "Agent: {}",
        session.config.agent_type.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Progress");
    let _ = writeln!(
        out,
        "- Requirements: {}/{} processed ({})",
        progress.processed_requirements, progress.total_requirements, progress.completion
    );
    let _ = writeln!(
        out,
        "- Test cases: {} total, {} approved, {} rejected, {} draft",
        progress.total_test_cases,
        progress.approved_test_cases,
        progress.rejected_test_cases,
        session.draft_test_case_count()
    );
    let _ = writeln!(out, "- Step: {}", progress.current_step);
    if let Some(current) = &progress.current_requirement_id {
        let _ = writeln!(out, "- Current requirement: {current}");
    }
    if let Some(action) = &progress.last_action {
        let _ = writeln!(
            out,
            "- Last action: {} ({})",
            action,
            session.progress.last_action_at.as_deref().unwrap_or("-")
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Requirements");
    if session.requirements.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for req in &session.requirements {
        let _ = writeln!(
            out,
            "{} {} [{}] {}",
            req.status.marker(),
            req.id,
            req.status,
            req.preview(CONTEXT_PREVIEW_CHARS)
        );
        let (inputs, outputs) = req
            .analysis
            .as_ref()
            .map(|a| (a.inputs.len(), a.outputs.len()))
            .unwrap_or((0, 0));
        let _ = writeln!(
            out,
            "    tests: {}, inputs: {}, outputs: {}",
            req.test_cases.len(),
            inputs,
            outputs
        );
    }

    if !session.notes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Recent notes");
        let skip = session.notes.len().saturating_sub(CONTEXT_RECENT_NOTES);
        for note in session.notes.iter().skip(skip) {
            let _ = writeln!(out, "- {note}");
        }
    }

    out
}
