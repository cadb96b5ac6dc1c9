//! `testgen state ...` commands.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::io::Write;
use std::path::{Path, PathBuf};
use testgen_core::requirement::{RequirementAnalysis, RequirementSource, RequirementStatus};
use testgen_core::sanitizer::PassthroughSanitizer;
use testgen_core::session::{GenerationStep, Session, SessionManager};
use testgen_core::test_case::{TestCase, TestCaseStatus};
use testgen_infrastructure::paths::{resolve_against, ProjectPaths};
use testgen_infrastructure::{JsonSessionRepository, KeyStore, ProjectConfig, SnapshotSigner};
use tracing::debug;

/// Where the session files live, as given on the command line or in the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct StateOptions {
    pub project_dir: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TextOrJson {
    Text,
    Json,
}

impl StateOptions {
    /// Resolves every path; relative ones are taken from the current directory.
    pub fn resolve(&self) -> Result<ProjectPaths> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        let project_dir = self
            .project_dir
            .as_deref()
            .map(|dir| resolve_against(&cwd, dir))
            .unwrap_or_else(|| cwd.clone());

        let mut paths = ProjectPaths::new(&project_dir);
        if let Some(state_file) = &self.state_file {
            paths = paths.with_state_file(resolve_against(&cwd, state_file));
        }
        if let Some(key_file) = &self.key_file {
            paths = paths.with_key_file(resolve_against(&cwd, key_file));
        }
        Ok(paths)
    }
}

type Manager = SessionManager<JsonSessionRepository>;

fn open(options: &StateOptions) -> Result<Manager> {
    let paths = options.resolve()?;
    debug!(?paths, "Resolved session paths");

    let key = KeyStore::new(&paths.key_file)
        .load_or_generate()
        .with_context(|| format!("Failed to load signing key {}", paths.key_file.display()))?;
    let config = ProjectConfig::load(&paths.config_file)?;
    let repository = JsonSessionRepository::new(&paths.state_file, SnapshotSigner::new(key));

    Ok(SessionManager::new(repository).with_defaults(config.session_config()))
}

fn open_loaded(options: &StateOptions) -> Result<Manager> {
    let mut manager = open(options)?;
    if manager.load()?.is_none() {
        bail!("No session found. Create one with: testgen state new");
    }
    Ok(manager)
}

pub fn new(
    options: &StateOptions,
    agent: Option<String>,
    session_id: Option<String>,
    force: bool,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open(options)?;
    let existing = manager.load()?.map(|s| s.session_id.clone());
    if let Some(existing) = existing {
        if !force {
            bail!("Session {existing} already exists. Use --force to replace it.");
        }
        manager.clear()?;
    }

    let session = manager.create_session(session_id, agent)?;
    writeln!(out, "Created session: {}", session.session_id)?;
    if let Some(agent) = &session.config.agent_type {
        writeln!(out, "Agent: {agent}")?;
    }
    Ok(())
}

pub fn show(options: &StateOptions, format: TextOrJson, out: &mut impl Write) -> Result<()> {
    let manager = open_loaded(options)?;
    match format {
        TextOrJson::Json => {
            let summary = manager.summary()?;
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        }
        TextOrJson::Text => write!(out, "{}", manager.context()?)?,
    }
    Ok(())
}

pub fn context(options: &StateOptions, out: &mut impl Write) -> Result<()> {
    let mut manager = open(options)?;
    if manager.load()?.is_none() {
        writeln!(out, "No active session.")?;
        return Ok(());
    }
    write!(out, "{}", manager.context()?)?;
    Ok(())
}

pub fn add(
    options: &StateOptions,
    text: &str,
    source: RequirementSource,
    source_ref: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    let (id, created) = manager.update(|s| {
        let before = s.requirements.len();
        let id = s
            .add_requirement(text, source, source_ref, &PassthroughSanitizer)?
            .id
            .clone();
        Ok((id, s.requirements.len() > before))
    })?;

    if created {
        writeln!(out, "Added requirement: {id}")?;
    } else {
        writeln!(out, "Requirement already exists: {id}")?;
    }
    Ok(())
}

pub fn analyze(
    options: &StateOptions,
    requirement_id: &str,
    analysis: RequirementAnalysis,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    manager.update(|s| s.set_requirement_analysis(requirement_id, analysis))?;
    writeln!(out, "{requirement_id}: analyzed")?;
    Ok(())
}

pub fn status(
    options: &StateOptions,
    requirement_id: &str,
    status: RequirementStatus,
    error: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    manager.update(|s| s.update_requirement_status(requirement_id, status, error))?;
    writeln!(out, "{requirement_id}: {status}")?;
    Ok(())
}

pub fn add_test_case(
    options: &StateOptions,
    requirement_id: &str,
    file: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let test_case: TestCase = serde_json::from_str(&content)
        .with_context(|| format!("Invalid test case JSON in {}", file.display()))?;

    let mut manager = open_loaded(options)?;
    let id = manager.update(|s| {
        s.add_test_case(requirement_id, test_case)
            .map(|tc| tc.id.clone())
    })?;
    writeln!(out, "Added test case: {id} to {requirement_id}")?;
    Ok(())
}

pub fn test_case_status(
    options: &StateOptions,
    requirement_id: &str,
    test_case_id: &str,
    status: TestCaseStatus,
    feedback: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    manager.update(|s| s.update_test_case_status(requirement_id, test_case_id, status, feedback))?;
    writeln!(out, "{requirement_id}/{test_case_id}: {status}")?;
    Ok(())
}

pub fn approve(
    options: &StateOptions,
    requirement_id: &str,
    test_case_ids: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    manager.update(|s| s.bulk_approve_test_cases(requirement_id, test_case_ids))?;
    writeln!(out, "Approved {} test case(s) of {requirement_id}", test_case_ids.len())?;
    Ok(())
}

pub fn feedback(
    options: &StateOptions,
    requirement_id: &str,
    note: &str,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    if manager.update(|s| s.add_requirement_feedback(requirement_id, note))? {
        writeln!(out, "Feedback recorded for {requirement_id}")?;
    } else {
        writeln!(out, "Empty feedback ignored")?;
    }
    Ok(())
}

pub fn progress(
    options: &StateOptions,
    step: Option<GenerationStep>,
    current: Option<String>,
    action: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let mut manager = open_loaded(options)?;
    manager.update(|s| {
        s.update_progress(step, current, action);
        Ok(())
    })?;
    if let Some(session) = manager.session() {
        writeln!(out, "Step: {}", session.progress.current_step)?;
    }
    Ok(())
}

pub fn note(options: &StateOptions, text: &str, out: &mut impl Write) -> Result<()> {
    let mut manager = open_loaded(options)?;
    manager.update(|s| {
        s.add_note(text);
        Ok(())
    })?;
    writeln!(out, "Note added.")?;
    Ok(())
}

pub fn resume(options: &StateOptions, out: &mut impl Write) -> Result<()> {
    let mut manager = open(options)?;
    let Some(session) = manager.load()? else {
        writeln!(out, "No session found.")?;
        return Ok(());
    };
    write_resume(session, out)
}

fn write_resume(session: &Session, out: &mut impl Write) -> Result<()> {
    writeln!(out, "=== RESUME ===")?;
    writeln!(out, "Current step: {}", session.progress.current_step)?;
    writeln!(
        out,
        "Last action: {}",
        session.progress.last_action.as_deref().unwrap_or("none")
    )?;
    writeln!(out)?;

    let pending = session.pending_requirements();
    if !pending.is_empty() {
        writeln!(out, "{} requirement(s) waiting:", pending.len())?;
        for req in pending.iter().take(5) {
            writeln!(out, "  - {}: {}", req.id, req.preview(50))?;
        }
        writeln!(out)?;
        writeln!(out, "Next: analyze the requirements and generate test cases")?;
        return Ok(());
    }

    writeln!(out, "All requirements processed.")?;
    let drafts = session.draft_test_case_count();
    if drafts > 0 {
        writeln!(out, "Test cases awaiting review: {drafts}")?;
    } else {
        writeln!(out, "Ready to export.")?;
    }
    Ok(())
}

pub fn clear(options: &StateOptions, yes: bool, out: &mut impl Write) -> Result<()> {
    if !yes {
        bail!("Refusing to delete the session state without --yes");
    }
    let mut manager = open(options)?;
    manager.clear()?;
    writeln!(out, "State cleared.")?;
    Ok(())
}

pub fn verify(options: &StateOptions, out: &mut impl Write) -> Result<()> {
    let manager = open(options)?;
    let repository = manager.repository();
    let Some(report) = repository.verify()? else {
        writeln!(out, "No state file at {}", repository.path().display())?;
        return Ok(());
    };

    match &report.problem {
        Some(problem) => {
            writeln!(out, "INVALID: {problem}")?;
            writeln!(
                out,
                "Backup {}: {}",
                repository.backup_path().display(),
                if repository.backup_path().exists() { "present" } else { "missing" }
            )?;
            bail!("State file failed integrity checks");
        }
        None => {
            writeln!(out, "OK: {} requirement(s)", report.requirements)?;
            if !report.signed {
                writeln!(out, "Warning: not signed (will be signed on next save)")?;
            }
            if report.stale_total {
                writeln!(out, "Warning: stored requirement total is stale (fixed on next load)")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> StateOptions {
        StateOptions {
            project_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    fn run<F>(f: F) -> Result<String>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    const RESET: &str = "Users must be able to reset their password via email.";

    #[test]
    fn test_default_paths_under_project_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = options(&temp_dir).resolve().unwrap();
        assert_eq!(paths.state_file, temp_dir.path().join(".test_generator_state.json"));
        assert_eq!(paths.key_file, temp_dir.path().join(".ai-test-gen-signature-key"));
    }

    #[test]
    fn test_explicit_files_override_project_layout() {
        let temp_dir = TempDir::new().unwrap();
        let opts = StateOptions {
            project_dir: Some(temp_dir.path().to_path_buf()),
            state_file: Some(temp_dir.path().join("custom.json")),
            key_file: Some(temp_dir.path().join("keys/k")),
        };
        let paths = opts.resolve().unwrap();
        assert_eq!(paths.state_file, temp_dir.path().join("custom.json"));
        assert_eq!(paths.key_file, temp_dir.path().join("keys/k"));
    }

    #[test]
    fn test_commands_require_a_session() {
        let temp_dir = TempDir::new().unwrap();
        let opts = options(&temp_dir);
        assert!(run(|out| add(&opts, RESET, RequirementSource::Manual, None, out)).is_err());
        assert_eq!(run(|out| resume(&opts, out)).unwrap(), "No session found.\n");
    }

    #[test]
    fn test_session_workflow() {
        let temp_dir = TempDir::new().unwrap();
        let opts = options(&temp_dir);

        let created = run(|out| {
            new(
                &opts,
                Some("cursor".to_string()),
                Some("s1".to_string()),
                false,
                out,
            )
        })
        .unwrap();
        assert!(created.contains("Created session: s1"));
        assert!(run(|out| new(&opts, None, None, false, out)).is_err());

        let added = run(|out| add(&opts, RESET, RequirementSource::Manual, None, out)).unwrap();
        assert_eq!(added, "Added requirement: REQ-001\n");
        let again = run(|out| add(&opts, RESET, RequirementSource::Manual, None, out)).unwrap();
        assert_eq!(again, "Requirement already exists: REQ-001\n");

        let tc_file = temp_dir.path().join("tc.json");
        std::fs::write(
            &tc_file,
            r#"{
                "id": "TC-001",
                "title": "Reset",
                "priority": "High",
                "test_type": "Positive",
                "technique": "equivalence_partitioning"
            }"#,
        )
        .unwrap();
        run(|out| add_test_case(&opts, "REQ-001", &tc_file, out)).unwrap();
        run(|out| approve(&opts, "REQ-001", &["TC-001".to_string()], out)).unwrap();
        run(|out| status(&opts, "REQ-001", RequirementStatus::Completed, None, out)).unwrap();

        let json = run(|out| show(&opts, TextOrJson::Json, out)).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(summary["progress"]["approved_test_cases"], 1);
        assert_eq!(summary["progress"]["completion"], "100.0%");
        assert_eq!(summary["agent_type"], "cursor");

        let resumed = run(|out| resume(&opts, out)).unwrap();
        assert!(resumed.contains("All requirements processed."));
        assert!(resumed.contains("Ready to export."));

        assert!(run(|out| verify(&opts, out)).unwrap().starts_with("OK: 1 requirement(s)"));
    }

    #[test]
    fn test_verify_reports_tampering() {
        let temp_dir = TempDir::new().unwrap();
        let opts = options(&temp_dir);
        run(|out| new(&opts, None, Some("s1".to_string()), false, out)).unwrap();

        let state_file = temp_dir.path().join(".test_generator_state.json");
        let content = std::fs::read_to_string(&state_file).unwrap();
        std::fs::write(&state_file, content.replace("\"s1\"", "\"s2\"")).unwrap();

        assert!(run(|out| verify(&opts, out)).is_err());
    }

    #[test]
    fn test_clear_needs_confirmation() {
        let temp_dir = TempDir::new().unwrap();
        let opts = options(&temp_dir);
        run(|out| new(&opts, None, None, false, out)).unwrap();

        assert!(run(|out| clear(&opts, false, out)).is_err());
        run(|out| clear(&opts, true, out)).unwrap();
        assert!(!temp_dir.path().join(".test_generator_state.json").exists());
    }
}
