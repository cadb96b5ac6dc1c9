//! Keyed integrity signatures for session snapshots.

mod canonical;
mod key_store;
mod signer;

pub use canonical::{canonical_bytes, SIGNATURE_FIELD};
pub use key_store::{KeyStore, KeyStoreError, SigningKey};
pub use signer::{SignatureCheck, SnapshotSigner};
