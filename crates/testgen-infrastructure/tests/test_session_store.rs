use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use testgen_core::classification::{Classification, Component, TestLayer};
use testgen_core::requirement::{RequirementAnalysis, RequirementSource, RequirementStatus};
use testgen_core::sanitizer::PassthroughSanitizer;
use testgen_core::session::{Session, SessionConfig, SessionManager, SessionRepository};
use testgen_core::test_case::{Priority, TestCase, TestCaseStatus, TestKind};
use testgen_infrastructure::signing::SignatureCheck;
use testgen_infrastructure::{JsonSessionRepository, SigningKey, SnapshotSigner};

const RESET: &str = "Users must be able to reset their password via email.";

fn signer() -> SnapshotSigner {
    SnapshotSigner::new(SigningKey::from_bytes([7u8; SigningKey::LEN]))
}

fn repository(path: &Path) -> JsonSessionRepository {
    JsonSessionRepository::new(path, signer())
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

fn populated_session() -> Session {
    let mut session = Session::new(Some("round_trip".to_string()), SessionConfig::default());
    let id = session
        .add_requirement(
            RESET,
            RequirementSource::File,
            Some("docs/auth.md".to_string()),
            &PassthroughSanitizer,
        )
        .unwrap()
        .id
        .clone();

    let requirement = &mut session.requirements[0];
    requirement.classification =
        Classification::new(TestLayer::E2e, Component::Frontend).with_tags(["auth", "email"]);
    requirement.title = Some("Password reset".to_string());

    session
        .add_requirement_feedback(&id, "cover expired links")
        .unwrap();
    session
        .add_test_case(
            &id,
            TestCase::new(
                "TC-001",
                "Reset link arrives",
                Priority::High,
                TestKind::Positive,
                "equivalence_partitioning",
            )
            .with_preconditions(["user exists"])
            .with_steps(["Open reset page", "Submit email"])
            .with_expected_result("Reset link sent")
            .with_classification(Classification::new(TestLayer::Ui, Component::Frontend)),
        )
        .unwrap();
    session
        .update_test_case_status(
            &id,
            "TC-001",
            TestCaseStatus::Modified,
            Some("shorter title".to_string()),
        )
        .unwrap();
    session.add_note("first pass");
    session.record_token_usage(4200);
    session
}

#[test]
fn test_round_trip_preserves_every_field() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);

    let session = populated_session();
    repo.save(&session).unwrap();

    let loaded = repo.load().unwrap().unwrap();
    assert!(!loaded.needs_resign);
    assert!(!loaded.restored_from_backup);
    assert_eq!(loaded.session, session);
}

#[test]
fn test_end_to_end_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");

    let mut manager = SessionManager::new(repository(&path));
    manager.create_session(None, Some("claude_code".to_string())).unwrap();

    let id = manager
        .update(|s| {
            s.add_requirement(RESET, RequirementSource::Manual, None, &PassthroughSanitizer)
                .map(|r| r.id.clone())
        })
        .unwrap();
    assert_eq!(id, "REQ-001");

    manager
        .update(|s| {
            s.set_requirement_analysis(
                &id,
                RequirementAnalysis {
                    inputs: vec!["email".to_string()],
                    outputs: vec!["200 OK".to_string()],
                    ..Default::default()
                },
            )?;
            s.add_test_case(
                &id,
                TestCase::new(
                    "TC-001",
                    "Reset via email",
                    Priority::High,
                    TestKind::Positive,
                    "equivalence_partitioning",
                ),
            )
            .map(|_| ())
        })
        .unwrap();

    let mut reloaded = SessionManager::new(repository(&path));
    let session = reloaded.load().unwrap().unwrap();
    let requirement = session.find_requirement_by_id("REQ-001").unwrap();
    assert_eq!(requirement.status, RequirementStatus::Analyzed);
    assert_eq!(requirement.test_cases.len(), 1);
    assert_eq!(requirement.test_cases[0].id, "TC-001");
    assert_eq!(requirement.test_cases[0].priority, Priority::High);

    assert_eq!(signer().verify(&read_json(&path)).unwrap(), SignatureCheck::Valid);
}

#[test]
fn test_tampered_snapshot_without_backup_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);
    repo.save(&populated_session()).unwrap();

    let mut snapshot = read_json(&path);
    snapshot["requirements"][0]["text"] = Value::String(RESET.replace("email", "SMS!!"));
    write_json(&path, &snapshot);

    assert!(repo.load().unwrap().is_none());
}

#[test]
fn test_tampered_snapshot_is_restored_from_backup() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);

    let mut session = populated_session();
    repo.save(&session).unwrap();
    session.add_note("second pass");
    repo.save(&session).unwrap();

    let mut snapshot = read_json(&path);
    snapshot["total_tokens_used"] = Value::from(1);
    write_json(&path, &snapshot);

    let loaded = repo.load().unwrap().unwrap();
    assert!(loaded.restored_from_backup);
    // the backup is the snapshot before the second save
    assert_eq!(loaded.session.notes.len(), 1);
    assert_eq!(loaded.session.total_tokens_used, 4200);

    // the primary now holds the backup and verifies on its own
    let again = repo.load().unwrap().unwrap();
    assert!(!again.restored_from_backup);
}

#[test]
fn test_tampered_backup_is_not_trusted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);

    let session = populated_session();
    repo.save(&session).unwrap();
    repo.save(&session).unwrap();

    for target in [path.clone(), repo.backup_path().to_path_buf()] {
        let mut snapshot = read_json(&target);
        snapshot["session_id"] = Value::String("forged".to_string());
        write_json(&target, &snapshot);
    }

    assert!(repo.load().unwrap().is_none());
}

#[test]
fn test_schema_violation_falls_back_to_backup() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);

    let session = populated_session();
    repo.save(&session).unwrap();
    repo.save(&session).unwrap();

    let mut snapshot = read_json(&path);
    snapshot["progress"]["total_requirements"] = Value::from(-3);
    let snapshot = signer().sign(snapshot).unwrap();
    write_json(&path, &snapshot);

    let loaded = repo.load().unwrap().unwrap();
    assert!(loaded.restored_from_backup);
}

#[test]
fn test_unsigned_backup_is_not_restored() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);

    let session = populated_session();
    repo.save(&session).unwrap();
    repo.save(&session).unwrap();

    let mut backup = read_json(repo.backup_path());
    backup.as_object_mut().unwrap().remove("_signature");
    write_json(repo.backup_path(), &backup);
    fs::write(&path, b"\0\0\0").unwrap();

    assert!(repo.load().unwrap().is_none());
}

#[test]
fn test_snapshot_signed_with_other_key_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    repository(&path).save(&populated_session()).unwrap();

    let other = JsonSessionRepository::new(
        &path,
        SnapshotSigner::new(SigningKey::from_bytes([8u8; SigningKey::LEN])),
    );
    assert!(other.load().unwrap().is_none());
}

#[test]
fn test_stale_counters_are_healed_after_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    repository(&path).save(&populated_session()).unwrap();

    // A correctly signed snapshot whose counters disagree with its records
    let mut snapshot = read_json(&path);
    snapshot["progress"]["total_requirements"] = Value::from(17);
    snapshot["progress"]["approved_test_cases"] = Value::from(5);
    write_json(&path, &signer().sign(snapshot).unwrap());

    let mut manager = SessionManager::new(repository(&path));
    let session = manager.load().unwrap().unwrap();
    assert_eq!(session.progress.total_requirements, 1);
    assert_eq!(session.progress.approved_test_cases, 0);
    assert_eq!(session.progress.total_test_cases, 1);
}

#[test]
fn test_unsigned_legacy_snapshot_is_resigned() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");

    // Written before signing, classification or fingerprints existed
    let legacy = serde_json::json!({
        "session_id": "20240101_120000",
        "created_at": "2024-01-01T12:00:00",
        "updated_at": "2024-01-01T12:00:00",
        "llm_provider": "anthropic",
        "techniques": [],
        "output_format": "excel",
        "output_path": null,
        "requirements": [{
            "id": "REQ-001",
            "text": RESET,
            "source": "manual",
            "status": "completed",
            "test_cases": [{
                "id": "TC-001",
                "title": "Reset",
                "priority": "High",
                "test_type": "positive",
                "technique": "equivalence_partitioning",
                "status": "approved"
            }]
        }],
        "progress": {"total_requirements": 3, "processed_requirements": 1},
        "total_tokens_used": 0,
        "agent_type": null,
        "notes": []
    });
    write_json(&path, &legacy);

    let mut manager = SessionManager::new(repository(&path));
    let session = manager.load().unwrap().unwrap();
    assert_eq!(session.progress.total_requirements, 1);
    assert_eq!(session.progress.approved_test_cases, 1);
    assert_eq!(
        session.requirements[0].fingerprint,
        testgen_core::fingerprint::fingerprint(RESET)
    );
    assert_eq!(session.requirements[0].classification, Classification::default());

    assert_eq!(signer().verify(&read_json(&path)).unwrap(), SignatureCheck::Valid);
}

fn legacy_signed_snapshot() -> Value {
    // Field formats of snapshots written by earlier releases: md5-based hash,
    // capitalized test types, no classification fields
    let legacy = serde_json::json!({
        "session_id": "20240301_090000",
        "created_at": "2024-03-01T09:00:00",
        "updated_at": "2024-03-01T09:30:00",
        "llm_provider": "anthropic",
        "techniques": ["boundary_value_analysis"],
        "output_format": "excel",
        "output_path": null,
        "requirements": [{
            "id": "REQ-001",
            "text": RESET,
            "hash": "8b93613498c5",
            "source": "file",
            "source_ref": "docs/auth.md",
            "status": "review",
            "test_cases": [
                {
                    "id": "TC-001",
                    "title": "Reset link arrives",
                    "priority": "Critical",
                    "test_type": "Positive",
                    "technique": "equivalence_partitioning",
                    "status": "approved",
                    "steps": [{"step": 1, "action": "Submit email"}],
                    "expected_result": "Reset link sent"
                },
                {
                    "id": "TC-002",
                    "title": "Unknown email",
                    "priority": "High",
                    "test_type": "Negative",
                    "technique": "equivalence_partitioning",
                    "status": "draft"
                },
                {
                    "id": "TC-003",
                    "title": "Reset page is readable",
                    "priority": "Medium",
                    "test_type": "Usability",
                    "technique": "error_guessing",
                    "status": "draft"
                }
            ]
        }],
        "progress": {
            "total_requirements": 1,
            "processed_requirements": 0,
            "total_test_cases": 3,
            "approved_test_cases": 1,
            "rejected_test_cases": 0,
            "current_step": "reviewing"
        },
        "total_tokens_used": 1500,
        "agent_type": "claude_code",
        "notes": []
    });
    signer().sign(legacy).unwrap()
}

#[test]
fn test_legacy_signed_snapshot_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    write_json(&path, &legacy_signed_snapshot());

    let mut manager = SessionManager::new(repository(&path));
    let session = manager.load().unwrap().unwrap().clone();
    assert!(!manager.needs_resign());

    let test_cases = &session.requirements[0].test_cases;
    assert_eq!(test_cases[0].kind, TestKind::Positive);
    assert_eq!(test_cases[0].priority, Priority::Critical);
    assert_eq!(test_cases[1].kind, TestKind::Negative);
    assert_eq!(test_cases[2].kind, TestKind::Other("Usability".to_string()));
    assert_eq!(test_cases[0].classification, Classification::default());
    assert_eq!(session.requirements[0].classification, Classification::default());
    assert_eq!(session.progress.approved_test_cases, 1);

    let id = manager
        .update(|s| {
            s.add_requirement(RESET, RequirementSource::Manual, None, &PassthroughSanitizer)
                .map(|r| r.id.clone())
        })
        .unwrap();
    assert_eq!(id, "REQ-001");
    assert_eq!(manager.session().unwrap().requirements.len(), 1);

    let stored = read_json(&path);
    assert_eq!(stored["requirements"][0]["test_cases"][0]["test_type"], "Positive");
    assert_eq!(stored["requirements"][0]["test_cases"][2]["test_type"], "Usability");
    assert_eq!(signer().verify(&stored).unwrap(), SignatureCheck::Valid);
}

#[test]
fn test_unsigned_snapshot_loads_when_directory_blocks_resign() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let mut unsigned = legacy_signed_snapshot();
    unsigned.as_object_mut().unwrap().remove("_signature");
    write_json(&path, &unsigned);
    // Occupies the temp path the atomic write needs
    fs::create_dir(temp_dir.path().join(".state.json.tmp")).unwrap();

    let mut manager = SessionManager::new(repository(&path));
    let session = manager.load().unwrap().unwrap();
    assert_eq!(session.session_id, "20240301_090000");
    assert!(manager.needs_resign());

    fs::remove_dir(temp_dir.path().join(".state.json.tmp")).unwrap();
    manager.save().unwrap();
    assert!(!manager.needs_resign());
    assert_eq!(signer().verify(&read_json(&path)).unwrap(), SignatureCheck::Valid);
}

#[test]
fn test_resubmission_after_reload_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    repository(&path).save(&populated_session()).unwrap();

    let mut manager = SessionManager::new(repository(&path));
    manager.load().unwrap();
    let id = manager
        .update(|s| {
            s.add_requirement(RESET, RequirementSource::Manual, None, &PassthroughSanitizer)
                .map(|r| r.id.clone())
        })
        .unwrap();
    assert_eq!(id, "REQ-001");
    assert_eq!(manager.session().unwrap().progress.total_requirements, 1);
}

#[cfg(unix)]
#[test]
fn test_snapshot_and_backup_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let repo = repository(&path);
    repo.save(&populated_session()).unwrap();
    repo.save(&populated_session()).unwrap();

    for file in [path.as_path(), repo.backup_path()] {
        let mode = fs::metadata(file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "{}", file.display());
    }
}

/// There is no lock: two managers on the same file do not see each other's
/// writes, and whichever saves last replaces the other's work.
#[test]
fn test_concurrent_writers_last_save_wins() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");

    let mut first = SessionManager::new(repository(&path));
    first.create_session(Some("shared".to_string()), None).unwrap();

    let mut second = SessionManager::new(repository(&path));
    second.load().unwrap();

    first
        .update(|s| {
            s.add_requirement(RESET, RequirementSource::Manual, None, &PassthroughSanitizer)
                .map(|_| ())
        })
        .unwrap();
    second
        .update(|s| {
            s.add_requirement(
                "Accounts lock after five failed logins.",
                RequirementSource::Manual,
                None,
                &PassthroughSanitizer,
            )
            .map(|_| ())
        })
        .unwrap();

    let mut reader = SessionManager::new(repository(&path));
    let session = reader.load().unwrap().unwrap();
    assert_eq!(session.requirements.len(), 1);
    assert_eq!(session.requirements[0].text, "Accounts lock after five failed logins.");
    assert_eq!(session.requirements[0].id, "REQ-001");
}
