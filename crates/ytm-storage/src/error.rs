//! Error types for storage state and the credential cache.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Encryption or decryption failed.
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// The persisted snapshot was written by a newer schema.
    #[error("unsupported storage version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
