//! Credential cache: encrypted-at-rest secrets keyed by account.
//!
//! Secrets are opaque strings to this module; the auth session stores its
//! serialized token sets here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use age::secrecy::ExposeSecret;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::RwLock;

use crate::error::{Result, StorageError};
use crate::store::write_atomic;

/// Key used when the caller does not namespace the entry.
pub const DEFAULT_CREDENTIALS_KEY: &str = "current";

/// File holding the x25519 identity inside the credential directory.
const IDENTITY_FILE: &str = "identity.txt";

/// Extension of encrypted entries.
const ENTRY_EXTENSION: &str = "age";

// ============================================================================
// CredentialCache Trait
// ============================================================================

/// Key/value store for secrets.
#[async_trait]
pub trait CredentialCache: Send + Sync + std::fmt::Debug {
    /// Store a secret under `key`, replacing any previous value.
    async fn store(&self, key: &str, secret: &str) -> Result<()>;

    /// Load the secret stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Remove the secret stored under `key`. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Shared credential cache for use across async contexts.
pub type SharedCredentialCache = Arc<dyn CredentialCache>;

// ============================================================================
// EncryptedFileCache
// ============================================================================

/// File-backed cache encrypting every entry with age (x25519).
///
/// Layout:
/// - `<dir>/identity.txt`: secret key, created on first open
/// - `<dir>/<base64url(key)>.age`: one encrypted entry per key
pub struct EncryptedFileCache {
    dir: PathBuf,
    identity: age::x25519::Identity,
}

impl std::fmt::Debug for EncryptedFileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileCache")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileCache {
    /// Open (or initialize) a credential directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let identity_path = dir.join(IDENTITY_FILE);
        let identity = if identity_path.exists() {
            let content = std::fs::read_to_string(&identity_path)
                .map_err(|e| StorageError::io(&identity_path, e))?;
            content
                .trim()
                .parse::<age::x25519::Identity>()
                .map_err(|e| StorageError::Crypto(format!("invalid identity file: {}", e)))?
        } else {
            let identity = age::x25519::Identity::generate();
            write_private(&identity_path, identity.to_string().expose_secret())?;
            tracing::info!(path = %identity_path.display(), "created credential identity");
            identity
        };

        Ok(Self { dir, identity })
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", URL_SAFE_NO_PAD.encode(key), ENTRY_EXTENSION))
    }
}

#[async_trait]
impl CredentialCache for EncryptedFileCache {
    async fn store(&self, key: &str, secret: &str) -> Result<()> {
        let encrypted = age::encrypt(&self.identity.to_public(), secret.as_bytes())
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        write_atomic(&self.entry_path(key), &encrypted).await?;

        tracing::debug!(key, "credentials stored");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        let encrypted = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let decrypted = age::decrypt(&self.identity, &encrypted)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;
        let secret = String::from_utf8(decrypted)
            .map_err(|e| StorageError::Crypto(format!("decrypted entry is not UTF-8: {}", e)))?;

        Ok(Some(secret))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| StorageError::io(path, e))
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| StorageError::io(path, e))
}

// ============================================================================
// MemoryCredentialCache
// ============================================================================

/// In-memory cache for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CredentialCache for MemoryCredentialCache {
    async fn store(&self, key: &str, secret: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), secret.to_string());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
