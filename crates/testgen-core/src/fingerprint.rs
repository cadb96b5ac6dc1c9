//! Requirement text fingerprints.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 12;

/// Returns the short content fingerprint of `text`.
///
/// Identical texts always map to the same fingerprint; whitespace and case
/// are significant.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
