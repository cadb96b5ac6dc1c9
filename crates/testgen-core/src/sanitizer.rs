//! Hook for the prompt-injection sanitizer applied to requirement text.
//!
//! The detection heuristics live outside this crate. The record store only
//! needs the verdict and stores `SanitizationVerdict::text` verbatim.

/// Result of sanitizing one requirement text.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizationVerdict {
    pub is_safe: bool,
    /// 0.0 (clean) to 1.0 (certainly hostile)
    pub risk_score: f32,
    pub warnings: Vec<String>,
    /// Text to store, possibly wrapped or escaped
    pub text: String,
}

impl SanitizationVerdict {
    /// A clean verdict that stores `text` unchanged.
    pub fn safe(text: impl Into<String>) -> Self {
        Self {
            is_safe: true,
            risk_score: 0.0,
            warnings: Vec::new(),
            text: text.into(),
        }
    }
}

/// Inspects free text before it enters the session.
pub trait TextSanitizer {
    fn sanitize(&self, text: &str) -> SanitizationVerdict;
}

/// Accepts every text as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSanitizer;

impl TextSanitizer for PassthroughSanitizer {
    fn sanitize(&self, text: &str) -> SanitizationVerdict {
        SanitizationVerdict::safe(text)
    }
}

impl<F> TextSanitizer for F
where
    F: Fn(&str) -> SanitizationVerdict,
{
    fn sanitize(&self, text: &str) -> SanitizationVerdict {
        self(text)
    }
}
