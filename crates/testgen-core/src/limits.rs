//! Size limits applied to everything the record store accepts.
//!
//! Lengths are measured in Unicode scalar values, not bytes.

use crate::error::{Result, TestGenError};

/// Shortest accepted requirement text.
pub const MIN_REQUIREMENT_LENGTH: usize = 10;
/// Longest accepted requirement text.
pub const MAX_REQUIREMENT_LENGTH: usize = 10_000;
/// Requirements one session may hold.
pub const MAX_REQUIREMENTS_PER_SESSION: usize = 1000;
/// Test cases one requirement may hold.
pub const MAX_TEST_CASES_PER_REQUIREMENT: usize = 100;

/// Checks a requirement text against the length window.
pub fn validate_requirement_length(text: &str) -> Result<()> {
    let length = text.chars().count();

    if length < MIN_REQUIREMENT_LENGTH {
        return Err(TestGenError::validation(
            "requirement_length",
            format!("Requirement too short: {length} < {MIN_REQUIREMENT_LENGTH} characters"),
        ));
    }

    if length > MAX_REQUIREMENT_LENGTH {
        return Err(TestGenError::validation(
            "requirement_length",
            format!("Requirement too long: {length} > {MAX_REQUIREMENT_LENGTH} characters"),
        ));
    }

    Ok(())
}

/// Checks that one more requirement fits into a session already holding `current`.
pub fn validate_requirements_capacity(current: usize) -> Result<()> {
    if current >= MAX_REQUIREMENTS_PER_SESSION {
        return Err(TestGenError::validation(
            "requirements_count",
            format!(
                "Too many requirements: {} > {MAX_REQUIREMENTS_PER_SESSION}",
                current + 1
            ),
        ));
    }
    Ok(())
}

/// Checks that one more test case fits into a requirement already holding `current`.
pub fn validate_test_cases_capacity(current: usize) -> Result<()> {
    if current >= MAX_TEST_CASES_PER_REQUIREMENT {
        return Err(TestGenError::validation(
            "test_cases_count",
            format!(
                "Too many test cases per requirement: {} > {MAX_TEST_CASES_PER_REQUIREMENT}",
                current + 1
            ),
        ));
    }
    Ok(())
}
