//! Structural contract every session snapshot must satisfy before any of its
//! content is trusted.

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::warn;

/// JSON Schema for state snapshots.
pub static STATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["session_id", "requirements", "progress"],
        "properties": {
            "session_id": {"type": "string"},
            "created_at": {"type": "string"},
            "updated_at": {"type": "string"},
            "llm_provider": {"type": "string"},
            "techniques": {"type": "array", "items": {"type": "string"}},
            "output_format": {"type": "string"},
            "output_path": {"type": ["string", "null"]},
            "requirements": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "text", "source", "status"],
                    "properties": {
                        "id": {"type": "string"},
                        "text": {"type": "string"},
                        "source": {"type": "string"},
                        "status": {"type": "string"},
                        "hash": {"type": "string"},
                        "test_cases": {"type": "array", "items": {"type": "object"}},
                        "review_feedback": {"type": "array", "items": {"type": "string"}}
                    }
                }
            },
            "progress": {
                "type": "object",
                "required": ["total_requirements", "processed_requirements"],
                "properties": {
                    "total_requirements": {"type": "integer", "minimum": 0},
                    "processed_requirements": {"type": "integer", "minimum": 0},
                    "total_test_cases": {"type": "integer", "minimum": 0},
                    "approved_test_cases": {"type": "integer", "minimum": 0},
                    "rejected_test_cases": {"type": "integer", "minimum": 0},
                    "current_step": {"type": "string"}
                }
            },
            "total_tokens_used": {"type": "integer", "minimum": 0},
            "agent_type": {"type": ["string", "null"]},
            "notes": {"type": "array", "items": {"type": "string"}},
            "_signature": {"type": "string"}
        }
    })
});

static COMPILED_STATE_SCHEMA: Lazy<Result<JSONSchema, String>> =
    Lazy::new(|| JSONSchema::compile(&STATE_SCHEMA).map_err(|e| e.to_string()));

/// Validates a parsed snapshot against [`STATE_SCHEMA`].
///
/// Returns a diagnostic naming every violation on failure.
pub fn validate_schema(snapshot: &Value) -> Result<(), String> {
    let schema = COMPILED_STATE_SCHEMA
        .as_ref()
        .map_err(|e| format!("state schema does not compile: {e}"))?;

    if let Err(errors) = schema.validate(snapshot) {
        let diagnostic = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{e} at {path}")
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        warn!(target: "security", reason = %diagnostic, "state schema validation failed");
        return Err(format!("Schema validation failed: {diagnostic}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Value {
        json!({
            "session_id": "s1",
            "requirements": [{
                "id": "REQ-001",
                "text": "text",
                "source": "manual",
                "status": "pending"
            }],
            "progress": {"total_requirements": 1, "processed_requirements": 0}
        })
    }

    #[test]
    fn test_minimal_snapshot_passes() {
        assert!(validate_schema(&minimal()).is_ok());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut snapshot = minimal();
        snapshot.as_object_mut().unwrap().remove("progress");
        let err = validate_schema(&snapshot).unwrap_err();
        assert!(err.contains("progress"));
    }

    #[test]
    fn test_negative_counter_fails() {
        let mut snapshot = minimal();
        snapshot["progress"]["total_requirements"] = json!(-1);
        assert!(validate_schema(&snapshot).is_err());
    }

    #[test]
    fn test_wrong_record_type_fails() {
        let mut snapshot = minimal();
        snapshot["requirements"][0]["status"] = json!(3);
        let err = validate_schema(&snapshot).unwrap_err();
        assert!(err.contains("/requirements/0/status"));
    }

    #[test]
    fn test_non_object_fails() {
        assert!(validate_schema(&json!("just a string")).is_err());
    }
}
