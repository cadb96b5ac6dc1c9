//! Error types for the test generation session store.

use thiserror::Error;

/// A shared error type for the whole workspace.
///
/// Validation and lookup failures are raised before any record is touched, so
/// a caller receiving one of them can assume the session is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestGenError {
    /// A length or count limit was violated
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Requirement status change outside the transition table
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// An operation needs a session but none is loaded
    #[error("No active session")]
    NoSession,

    /// Snapshot failed schema or signature checks
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TestGenError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Validation error
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is an Integrity error
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for TestGenError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for TestGenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TestGenError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, TestGenError>`.
pub type Result<T> = std::result::Result<T, TestGenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_readable() {
        let err = TestGenError::validation("requirement_text", "too short: 9 < 10 characters");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Validation failed for requirement_text: too short: 9 < 10 characters"
        );
    }

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TestGenError = io.into();
        assert!(err.is_io());
        assert!(err.to_string().contains("PermissionDenied"));
    }
}
