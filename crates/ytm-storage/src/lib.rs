//! Persistent state for the ytm session core.
//!
//! # Components
//!
//! - [`state`]: the versioned [`StorageState`] snapshot and [`StoragePatch`] merges
//! - [`store`]: persistence backends and the [`Storage`] session context
//! - [`credentials`]: encrypted-at-rest [`CredentialCache`]

pub mod credentials;
pub mod error;
pub mod state;
pub mod store;

pub use credentials::{
    CredentialCache, DEFAULT_CREDENTIALS_KEY, EncryptedFileCache, MemoryCredentialCache,
    SharedCredentialCache,
};
pub use error::{Result, StorageError};
pub use state::{CurrentUser, STORAGE_VERSION, StoragePatch, StorageState};
pub use store::{FileStateStore, MemoryStateStore, StateStore, Storage};
