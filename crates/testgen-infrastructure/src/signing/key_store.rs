//! Signing key material and its on-disk store.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Errors that can occur while loading or creating the signing key.
#[derive(Debug)]
pub enum KeyStoreError {
    /// File I/O error.
    IoError(std::io::Error),
    /// The key file path has no parent directory to create it in.
    InvalidPath(PathBuf),
}

impl std::fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyStoreError::IoError(e) => write!(f, "Key file I/O error: {}", e),
            KeyStoreError::InvalidPath(path) => {
                write!(f, "Invalid key file path: {}", path.display())
            }
        }
    }
}

impl std::error::Error for KeyStoreError {}

impl From<std::io::Error> for KeyStoreError {
    fn from(e: std::io::Error) -> Self {
        KeyStoreError::IoError(e)
    }
}

impl From<KeyStoreError> for testgen_core::TestGenError {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::IoError(e) => e.into(),
            KeyStoreError::InvalidPath(path) => testgen_core::TestGenError::config(format!(
                "Invalid key file path: {}",
                path.display()
            )),
        }
    }
}

const KEY_LEN: usize = 32;

/// A 256-bit HMAC key.
///
/// `Debug` output never shows the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey([u8; KEY_LEN]);

impl SigningKey {
    pub const LEN: usize = KEY_LEN;

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Draws a fresh key from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// File holding the signing key as 32 raw bytes.
///
/// Responsibilities:
/// - Return the stored key when it is intact and private to the owner
/// - Replace a key that is the wrong length or readable by others
/// - Create the file (mode `0600`) on first use
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored key, generating and persisting a new one if the file
    /// is missing or cannot be trusted.
    pub fn load_or_generate(&self) -> Result<SigningKey, KeyStoreError> {
        if let Some(key) = self.load_trusted()? {
            return Ok(key);
        }

        let key = SigningKey::generate();
        self.write(&key)?;
        info!(path = %self.path.display(), "Generated new signature key");
        Ok(key)
    }

    fn load_trusted(&self) -> Result<Option<SigningKey>, KeyStoreError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if has_insecure_permissions(&metadata) {
            warn!(
                target: "security",
                path = %self.path.display(),
                "Signature key file has insecure permissions, regenerating"
            );
            fs::remove_file(&self.path)?;
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        match <[u8; SigningKey::LEN]>::try_from(bytes.as_slice()) {
            Ok(bytes) => Ok(Some(SigningKey::from_bytes(bytes))),
            Err(_) => {
                warn!(
                    target: "security",
                    path = %self.path.display(),
                    length = bytes.len(),
                    "Invalid signature key length, regenerating"
                );
                fs::remove_file(&self.path)?;
                Ok(None)
            }
        }
    }

    fn write(&self, key: &SigningKey) -> Result<(), KeyStoreError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| KeyStoreError::InvalidPath(self.path.clone()))?;
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(key.as_bytes())?;
        file.sync_all()?;
        crate::storage::restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn has_insecure_permissions(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o077 != 0
}

#[cfg(not(unix))]
fn has_insecure_permissions(_metadata: &fs::Metadata) -> bool {
    false
}
