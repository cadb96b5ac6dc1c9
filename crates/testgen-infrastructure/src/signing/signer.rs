//! HMAC-SHA256 signatures over session snapshots.

use super::canonical::{canonical_bytes, SIGNATURE_FIELD};
use super::key_store::SigningKey;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use testgen_core::{Result, TestGenError};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking a snapshot's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    /// No signature field (written before signing existed)
    Missing,
    Mismatch,
}

/// Signs and verifies snapshots with one key.
#[derive(Debug, Clone)]
pub struct SnapshotSigner {
    key: SigningKey,
}

impl SnapshotSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Hex-encoded HMAC over the canonical form of `snapshot`, ignoring any
    /// signature it already carries.
    pub fn compute(&self, snapshot: &Value) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(&canonical_bytes(snapshot));
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Returns `snapshot` with a fresh signature attached.
    pub fn sign(&self, mut snapshot: Value) -> Result<Value> {
        let signature = self.compute(&snapshot)?;
        let object = snapshot
            .as_object_mut()
            .ok_or_else(|| TestGenError::integrity("snapshot is not a JSON object"))?;
        object.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));
        Ok(snapshot)
    }

    /// Checks the attached signature in constant time.
    pub fn verify(&self, snapshot: &Value) -> Result<SignatureCheck> {
        let Some(stored) = snapshot.get(SIGNATURE_FIELD) else {
            return Ok(SignatureCheck::Missing);
        };
        let Some(expected) = stored.as_str().and_then(|s| hex::decode(s).ok()) else {
            warn!(target: "security", reason = "malformed signature", "state integrity failure");
            return Ok(SignatureCheck::Mismatch);
        };

        let mut mac = self.mac()?;
        mac.update(&canonical_bytes(snapshot));
        if mac.verify_slice(&expected).is_ok() {
            Ok(SignatureCheck::Valid)
        } else {
            warn!(
                target: "security",
                reason = "HMAC signature mismatch",
                "state integrity failure"
            );
            Ok(SignatureCheck::Mismatch)
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|e| TestGenError::integrity(format!("unusable signing key: {e}")))
    }
}
