//! Record store operations on the session object graph.
//!
//! Every operation validates completely before it mutates, so a returned
//! error means the session was left untouched. Persisting is the caller's
//! job (see `SessionManager::save`).

use super::model::Session;
use super::progress::GenerationStep;
use crate::error::{Result, TestGenError};
use crate::fingerprint::fingerprint;
use crate::limits::{
    validate_requirement_length, validate_requirements_capacity, validate_test_cases_capacity,
    MAX_REQUIREMENTS_PER_SESSION,
};
use crate::requirement::{Requirement, RequirementAnalysis, RequirementSource, RequirementStatus};
use crate::sanitizer::TextSanitizer;
use crate::test_case::{TestCase, TestCaseStatus};
use std::collections::HashSet;
use tracing::{debug, info, warn};

fn security_validation_failure(err: &TestGenError) {
    if let TestGenError::Validation { field, reason } = err {
        warn!(target: "security", kind = *field, reason = %reason, "validation failure");
    }
}

impl Session {
    // =========================================================================
    // Requirements
    // =========================================================================

    /// Adds a requirement, or returns the existing one for an identical text.
    ///
    /// The raw `text` is length-checked and fingerprinted; the stored text is
    /// whatever `sanitizer` returns for it. New requirements start `pending`
    /// with the next `REQ-NNN` id.
    pub fn add_requirement(
        &mut self,
        text: &str,
        source: RequirementSource,
        source_ref: Option<String>,
        sanitizer: &dyn TextSanitizer,
    ) -> Result<&Requirement> {
        validate_requirement_length(text).inspect_err(security_validation_failure)?;
        validate_requirements_capacity(self.requirements.len())
            .inspect_err(security_validation_failure)?;

        let verdict = sanitizer.sanitize(text);
        if !verdict.is_safe {
            warn!(
                target: "security",
                risk_score = verdict.risk_score,
                preview = %crate::requirement::preview(text, 50),
                "suspicious requirement text"
            );
            for warning in &verdict.warnings {
                warn!(target: "security", "sanitizer warning: {}", warning);
            }
        }

        if let Some(index) = self.position_by_fingerprint(text) {
            info!("Requirement already exists: {}", self.requirements[index].id);
            return Ok(&self.requirements[index]);
        }

        let id = self.next_requirement_id();
        let requirement = Requirement::new(id, text, verdict.text, source, source_ref);
        info!("Added requirement: {}", requirement.id);

        let index = self.requirements.len();
        self.requirements.push(requirement);
        self.progress.total_requirements = self.requirements.len();

        Ok(&self.requirements[index])
    }

    /// Adds several requirements as one unit.
    ///
    /// All texts are validated, and the capacity is checked against the number
    /// of genuinely new texts, before the first one is added. Returns the ids
    /// in input order (duplicates map to the existing id).
    pub fn add_requirements_batch<S: AsRef<str>>(
        &mut self,
        texts: &[S],
        source: RequirementSource,
        source_ref: Option<String>,
        sanitizer: &dyn TextSanitizer,
    ) -> Result<Vec<String>> {
        for text in texts {
            validate_requirement_length(text.as_ref()).inspect_err(security_validation_failure)?;
        }

        let new_fingerprints: HashSet<String> = texts
            .iter()
            .filter(|t| self.position_by_fingerprint(t.as_ref()).is_none())
            .map(|t| fingerprint(t.as_ref()))
            .collect();
        if self.requirements.len() + new_fingerprints.len() > MAX_REQUIREMENTS_PER_SESSION {
            let err = TestGenError::validation(
                "requirements_count",
                format!(
                    "Too many requirements: {} > {MAX_REQUIREMENTS_PER_SESSION}",
                    self.requirements.len() + new_fingerprints.len()
                ),
            );
            security_validation_failure(&err);
            return Err(err);
        }

        let mut ids = Vec::with_capacity(texts.len());
        for text in texts {
            let req = self.add_requirement(text.as_ref(), source, source_ref.clone(), sanitizer)?;
            ids.push(req.id.clone());
        }
        Ok(ids)
    }

    /// Finds a requirement by its `REQ-NNN` id.
    pub fn find_requirement_by_id(&self, requirement_id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == requirement_id)
    }

    /// Finds the requirement whose fingerprint matches that of `text`.
    pub fn find_requirement_by_fingerprint(&self, text: &str) -> Option<&Requirement> {
        self.position_by_fingerprint(text).map(|i| &self.requirements[i])
    }

    /// Sets a requirement's status.
    ///
    /// `completed` stamps `processed_at`; a supplied error is attached for
    /// later inspection.
    pub fn update_requirement_status(
        &mut self,
        requirement_id: &str,
        status: RequirementStatus,
        error: Option<String>,
    ) -> Result<()> {
        let req = self.requirement_mut(requirement_id)?;

        if !req.status.can_transition_to(status) {
            return Err(TestGenError::InvalidTransition {
                from: req.status.to_string(),
                to: status.to_string(),
            });
        }

        debug!("{}: {} -> {}", req.id, req.status, status);
        req.status = status;
        if status == RequirementStatus::Completed {
            req.processed_at = Some(chrono::Local::now().to_rfc3339());
        }
        if let Some(error) = error {
            req.error = Some(error);
        }

        self.reconcile_progress();
        Ok(())
    }

    /// Attaches the analyzer's output and moves the requirement to `analyzed`.
    pub fn set_requirement_analysis(
        &mut self,
        requirement_id: &str,
        analysis: RequirementAnalysis,
    ) -> Result<()> {
        let req = self.requirement_mut(requirement_id)?;
        req.analysis = Some(analysis);
        req.status = RequirementStatus::Analyzed;
        info!("Analysis recorded for {}", req.id);

        self.reconcile_progress();
        Ok(())
    }

    /// Appends a reviewer note. Blank notes are ignored (returns `false`).
    pub fn add_requirement_feedback(&mut self, requirement_id: &str, note: &str) -> Result<bool> {
        let req = self.requirement_mut(requirement_id)?;
        let note = note.trim();
        if note.is_empty() {
            return Ok(false);
        }
        req.review_feedback.push(note.to_string());
        Ok(true)
    }

    /// Reviewer notes recorded for a requirement.
    pub fn requirement_feedback(&self, requirement_id: &str) -> Result<&[String]> {
        self.find_requirement_by_id(requirement_id)
            .map(|r| r.review_feedback.as_slice())
            .ok_or_else(|| TestGenError::not_found("requirement", requirement_id))
    }

    /// Requirements nobody has started on.
    pub fn pending_requirements(&self) -> Vec<&Requirement> {
        self.requirements
            .iter()
            .filter(|r| r.status == RequirementStatus::Pending)
            .collect()
    }

    // =========================================================================
    // Test cases
    // =========================================================================

    /// Attaches a test case to a requirement.
    ///
    /// A colliding id is replaced by `<base>-NNN`, where `<base>` is the id up
    /// to its last `-` and `NNN` starts at the requirement's test case count
    /// plus one.
    pub fn add_test_case(
        &mut self,
        requirement_id: &str,
        mut test_case: TestCase,
    ) -> Result<&TestCase> {
        let req = self.requirement_mut(requirement_id)?;
        validate_test_cases_capacity(req.test_cases.len())
            .inspect_err(security_validation_failure)?;

        if req.test_case(&test_case.id).is_some() {
            let base = test_case
                .id
                .rsplit_once('-')
                .map(|(base, _)| base.to_string())
                .unwrap_or_else(|| test_case.id.clone());
            let mut counter = req.test_cases.len() + 1;
            let mut candidate = format!("{base}-{counter:03}");
            while req.test_case(&candidate).is_some() {
                counter += 1;
                candidate = format!("{base}-{counter:03}");
            }
            debug!("Test case id {} taken, using {}", test_case.id, candidate);
            test_case.id = candidate;
        }
        if test_case.created_at.is_empty() {
            test_case.created_at = chrono::Local::now().to_rfc3339();
        }

        info!("Added test case: {} for {}", test_case.id, req.id);
        req.test_cases.push(test_case);

        self.reconcile_progress();
        let req = self.requirement_ref(requirement_id)?;
        let last = req.test_cases.len() - 1;
        Ok(&req.test_cases[last])
    }

    /// Sets a test case's review status and stamps `modified_at`.
    ///
    /// Approved/rejected totals are derived from statuses, so repeating a
    /// transition never double counts.
    pub fn update_test_case_status(
        &mut self,
        requirement_id: &str,
        test_case_id: &str,
        status: TestCaseStatus,
        feedback: Option<String>,
    ) -> Result<()> {
        let req = self.requirement_mut(requirement_id)?;
        let tc = req
            .test_cases
            .iter_mut()
            .find(|tc| tc.id == test_case_id)
            .ok_or_else(|| TestGenError::not_found("test case", test_case_id))?;

        tc.status = status;
        tc.modified_at = Some(chrono::Local::now().to_rfc3339());
        if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
            tc.user_feedback = Some(feedback);
        }

        self.reconcile_progress();
        Ok(())
    }

    /// Approves several test cases of one requirement.
    ///
    /// Every id is checked before any status changes.
    pub fn bulk_approve_test_cases<S: AsRef<str>>(
        &mut self,
        requirement_id: &str,
        test_case_ids: &[S],
    ) -> Result<()> {
        let req = self.requirement_ref(requirement_id)?;
        if let Some(missing) = test_case_ids
            .iter()
            .find(|id| req.test_case(id.as_ref()).is_none())
        {
            return Err(TestGenError::not_found("test case", missing.as_ref()));
        }

        for id in test_case_ids {
            self.update_test_case_status(
                requirement_id,
                id.as_ref(),
                TestCaseStatus::Approved,
                None,
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // Progress and notes
    // =========================================================================

    /// Records where the agent is and what it last did.
    pub fn update_progress(
        &mut self,
        step: Option<GenerationStep>,
        current_requirement_id: Option<String>,
        action: Option<String>,
    ) {
        if let Some(step) = step {
            self.progress.current_step = step;
        }
        if let Some(id) = current_requirement_id {
            self.progress.current_requirement_id = Some(id);
        }
        if let Some(action) = action {
            self.progress.last_action = Some(action);
            self.progress.last_action_at = Some(chrono::Local::now().to_rfc3339());
        }
        self.reconcile_progress();
    }

    /// Appends a timestamped note to the session log.
    pub fn add_note(&mut self, note: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        self.notes.push(format!("[{timestamp}] {note}"));
    }

    /// Adds to the running token counter.
    pub fn record_token_usage(&mut self, tokens: u64) {
        self.total_tokens_used = self.total_tokens_used.saturating_add(tokens);
    }

    // =========================================================================
    // Internal lookups
    // =========================================================================

    fn next_requirement_id(&self) -> String {
        // Ids are never reused, so derive from the highest issued number.
        let highest = self
            .requirements
            .iter()
            .filter_map(|r| r.id.strip_prefix("REQ-"))
            .filter_map(|n| n.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        format!("REQ-{:03}", highest.max(self.requirements.len()) + 1)
    }

    fn position_by_fingerprint(&self, text: &str) -> Option<usize> {
        let target = fingerprint(text);
        self.requirements.iter().position(|r| r.matches_fingerprint(&target))
    }

    fn requirement_ref(&self, requirement_id: &str) -> Result<&Requirement> {
        self.find_requirement_by_id(requirement_id)
            .ok_or_else(|| TestGenError::not_found("requirement", requirement_id))
    }

    fn requirement_mut(&mut self, requirement_id: &str) -> Result<&mut Requirement> {
        self.requirements
            .iter_mut()
            .find(|r| r.id == requirement_id)
            .ok_or_else(|| TestGenError::not_found("requirement", requirement_id))
    }
}
