//! Persistence backends and the [`Storage`] session context.
//!
//! [`Storage`] owns the active [`StorageState`] snapshot. It is passed
//! explicitly to whoever needs account or config data; there is no global
//! instance. Every mutation is a whole-value replace or a shallow merge
//! followed by a write-through to the backing [`StateStore`] (last writer
//! wins).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use ytm_config::AppConfig;

use crate::error::{Result, StorageError};
use crate::state::{CurrentUser, STORAGE_VERSION, StoragePatch, StorageState};

// ============================================================================
// StateStore Trait
// ============================================================================

/// Backend that persists the storage state blob.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Load the persisted snapshot, if any.
    async fn load(&self) -> Result<Option<StorageState>>;

    /// Persist a snapshot, replacing the previous one.
    async fn save(&self, state: &StorageState) -> Result<()>;

    /// Remove the persisted snapshot.
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// FileStateStore
// ============================================================================

/// JSON-file backend.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<StorageState>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, state: &StorageState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.path, json.as_bytes()).await?;

        tracing::debug!(path = %self.path.display(), "storage state saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }
}

/// Write `contents` to a uniquely named sibling temp file, then rename it
/// over `path`. Readers never see a half-written file and concurrent writers
/// never share a temp file.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        NEXT_TMP.fetch_add(1, Ordering::Relaxed)
    ));

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StorageError::io(path, e));
    }
    Ok(())
}

// ============================================================================
// MemoryStateStore
// ============================================================================

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RwLock<Option<StorageState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StorageState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
        }
    }

    /// The last snapshot written.
    pub fn saved(&self) -> Option<StorageState> {
        self.state.read().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<StorageState>> {
        Ok(self.state.read().clone())
    }

    async fn save(&self, state: &StorageState) -> Result<()> {
        *self.state.write() = Some(state.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.write() = None;
        Ok(())
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Session context holding the active account snapshot.
///
/// Cheap to clone; clones share the same snapshot. Mutations are applied to
/// a copy, persisted, and only then published, one at a time: the in-memory
/// snapshot never runs ahead of the backend and the last merge is the last
/// write.
#[derive(Debug, Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

#[derive(Debug)]
struct StorageInner {
    state: RwLock<StorageState>,
    store: Arc<dyn StateStore>,
    /// Held from computing the next snapshot until it is published.
    writer: tokio::sync::Mutex<()>,
}

impl Storage {
    /// Create a context over a backend, starting from an empty snapshot.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_state(store, StorageState::default())
    }

    /// Create a context with an initial snapshot.
    pub fn with_state(store: Arc<dyn StateStore>, state: StorageState) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                state: RwLock::new(state),
                store,
                writer: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Create a context backed by memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStateStore::new()))
    }

    /// Load the persisted snapshot from the backend.
    ///
    /// Starts from the default snapshot when nothing is persisted. Snapshots
    /// written by a newer schema are rejected.
    pub async fn init(store: Arc<dyn StateStore>) -> Result<Self> {
        let state = match store.load().await? {
            Some(state) if state.version > STORAGE_VERSION => {
                return Err(StorageError::UnsupportedVersion {
                    found: state.version,
                    supported: STORAGE_VERSION,
                });
            }
            Some(mut state) => {
                if state.version < STORAGE_VERSION {
                    tracing::info!(
                        from = state.version,
                        to = STORAGE_VERSION,
                        "upgrading storage state"
                    );
                    state.version = STORAGE_VERSION;
                }
                state
            }
            None => {
                tracing::debug!("no persisted storage state, starting fresh");
                StorageState::default()
            }
        };

        Ok(Self::with_state(store, state))
    }

    /// Clone of the active snapshot.
    pub fn state(&self) -> StorageState {
        self.inner.state.read().clone()
    }

    /// Config of the active account.
    pub fn config(&self) -> Option<AppConfig> {
        self.inner.state.read().config.clone()
    }

    /// Credential-cache key of the active account.
    pub fn auth_params_key(&self) -> Option<String> {
        self.inner.state.read().auth_params_key.clone()
    }

    /// Snapshots of the other logged-in accounts, in stored order.
    pub fn other_accounts(&self) -> Vec<StorageState> {
        self.inner.state.read().other_accounts.clone()
    }

    /// Compute the next snapshot from the current one, persist it, publish it.
    ///
    /// A snapshot equal to the default one clears the backend instead.
    async fn commit(&self, update: impl FnOnce(&mut StorageState)) -> Result<StorageState> {
        let _writer = self.inner.writer.lock().await;

        let mut next = self.state();
        update(&mut next);

        if next == StorageState::default() {
            self.inner.store.clear().await?;
        } else {
            self.inner.store.save(&next).await?;
        }

        *self.inner.state.write() = next.clone();
        Ok(next)
    }

    /// Merge a partial update into the active snapshot and persist it.
    pub async fn flush_part(&self, patch: StoragePatch) -> Result<StorageState> {
        self.commit(|state| state.merge(patch)).await
    }

    /// Replace the active snapshot and persist it.
    pub async fn replace(&self, state: StorageState) -> Result<()> {
        self.commit(|current| *current = state).await.map(|_| ())
    }

    /// Replace the list of other accounts.
    pub async fn set_other_accounts(&self, accounts: Vec<StorageState>) -> Result<()> {
        self.flush_part(StoragePatch::new().other_accounts(accounts))
            .await
            .map(|_| ())
    }

    /// Store the tracker's user record inside `currentUser`.
    pub async fn store_yt_current_user(&self, user: Value) -> Result<()> {
        self.commit(|state| {
            state
                .current_user
                .get_or_insert_with(CurrentUser::default)
                .yt_current_user = Some(user);
        })
        .await
        .map(|_| ())
    }

    /// Store the Hub user payload as `currentUser`, keeping any tracker record.
    pub async fn store_current_user(&self, user: CurrentUser) -> Result<()> {
        self.commit(|state| {
            let yt_current_user = state
                .current_user
                .take()
                .and_then(|u| u.yt_current_user);
            state.current_user = Some(CurrentUser {
                yt_current_user: user.yt_current_user.or(yt_current_user),
                ..user
            });
        })
        .await
        .map(|_| ())
    }

    /// Cached permissions of the active account.
    pub fn cached_permissions(&self) -> Option<Vec<Value>> {
        self.inner.state.read().permissions.clone()
    }

    pub async fn update_cached_permissions(&self, permissions: Vec<Value>) -> Result<()> {
        self.flush_part(StoragePatch::new().permissions(permissions))
            .await
            .map(|_| ())
    }

    /// Start a new active account.
    ///
    /// The previous active snapshot (if configured) moves to the sibling list;
    /// any sibling for the same backend is replaced.
    pub async fn begin_account(
        &self,
        config: AppConfig,
        auth_params_key: impl Into<String>,
    ) -> Result<StorageState> {
        let mut next = StorageState::for_config(config);
        next.auth_params_key = Some(auth_params_key.into());

        let snapshot = self
            .commit(|state| {
                let mut others: Vec<StorageState> = state
                    .other_accounts
                    .iter()
                    .filter(|a| !a.is_same_account(&next))
                    .cloned()
                    .collect();
                if state.config.is_some() && !state.is_same_account(&next) {
                    others.insert(0, state.detached());
                }
                next.other_accounts = others;
                *state = next;
            })
            .await?;

        tracing::info!(backend = snapshot.backend_url(), "account activated");
        Ok(snapshot)
    }

    /// Make a sibling account active.
    ///
    /// The previously active account is kept as the first sibling. Returns
    /// the new active snapshot.
    pub async fn switch_account(&self, target: &StorageState) -> Result<StorageState> {
        let snapshot = self
            .commit(|state| {
                let mut others: Vec<StorageState> = state
                    .other_accounts
                    .iter()
                    .filter(|a| !a.is_same_account(target))
                    .cloned()
                    .collect();
                if state.config.is_some() && !state.is_same_account(target) {
                    others.insert(0, state.detached());
                }

                let mut next = target.detached();
                next.version = STORAGE_VERSION;
                next.other_accounts = others;
                *state = next;
            })
            .await?;

        tracing::info!(backend = snapshot.backend_url(), "switched account");
        Ok(snapshot)
    }

    /// Drop the active account.
    ///
    /// The first sibling becomes active; returns it, or `None` when no
    /// accounts remain.
    pub async fn remove_active_account(&self) -> Result<Option<StorageState>> {
        let snapshot = self
            .commit(|state| {
                let mut others = std::mem::take(&mut state.other_accounts);
                *state = if others.is_empty() {
                    StorageState::default()
                } else {
                    let mut next = others.remove(0);
                    next.other_accounts = others;
                    next
                };
            })
            .await?;

        Ok(Some(snapshot).filter(|s| *s != StorageState::default()))
    }

    /// Forget everything, including sibling accounts.
    pub async fn clear(&self) -> Result<()> {
        self.commit(|state| *state = StorageState::default())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use ytm_config::AuthConfig;

    fn config(url: &str) -> AppConfig {
        AppConfig::new(url, AuthConfig::default())
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let temp = tempdir().unwrap();
        let store = FileStateStore::new(temp.path().join("state.json"));
        assert!(store.load().await.unwrap().is_none());

        let state = StorageState::for_config(config("http://a.example"));
        store.save(&state).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(state));
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileStateStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_init_from_empty_store() {
        let storage = Storage::init(Arc::new(MemoryStateStore::new())).await.unwrap();
        assert_eq!(storage.state(), StorageState::default());
    }

    #[tokio::test]
    async fn test_init_rejects_newer_version() {
        let state = StorageState {
            version: STORAGE_VERSION + 1,
            ..Default::default()
        };
        let result = Storage::init(Arc::new(MemoryStateStore::with_state(state))).await;
        assert!(matches!(
            result,
            Err(StorageError::UnsupportedVersion { .. })
        ));
    }

    #[tokio::test]
    async fn test_init_upgrades_older_version() {
        let state = StorageState {
            version: 0,
            ..StorageState::for_config(config("http://a.example"))
        };
        let storage = Storage::init(Arc::new(MemoryStateStore::with_state(state)))
            .await
            .unwrap();
        assert_eq!(storage.state().version, STORAGE_VERSION);
        assert_eq!(storage.state().backend_url(), "http://a.example");
    }

    #[tokio::test]
    async fn test_flush_part_persists_merge() {
        let store = Arc::new(MemoryStateStore::new());
        let storage = Storage::new(store.clone());

        storage
            .flush_part(StoragePatch::new().config(config("http://a.example")))
            .await
            .unwrap();
        storage
            .flush_part(StoragePatch::new().auth_params_key("key-1"))
            .await
            .unwrap();

        let saved = store.saved().unwrap();
        assert_eq!(saved.backend_url(), "http://a.example");
        assert_eq!(saved.auth_params_key.as_deref(), Some("key-1"));
        assert_eq!(storage.auth_params_key().as_deref(), Some("key-1"));
    }

    #[tokio::test]
    async fn test_store_yt_current_user_keeps_hub_fields() {
        let storage = Storage::in_memory();
        storage
            .store_current_user(CurrentUser {
                id: Some("hub-id".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        storage
            .store_yt_current_user(json!({"id": "yt-id"}))
            .await
            .unwrap();

        let user = storage.state().current_user.unwrap();
        assert_eq!(user.id.as_deref(), Some("hub-id"));
        assert_eq!(user.yt_current_user, Some(json!({"id": "yt-id"})));

        storage
            .store_current_user(CurrentUser {
                id: Some("hub-id-2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let user = storage.state().current_user.unwrap();
        assert_eq!(user.id.as_deref(), Some("hub-id-2"));
        assert_eq!(user.yt_current_user, Some(json!({"id": "yt-id"})));
    }

    #[tokio::test]
    async fn test_cached_permissions() {
        let storage = Storage::in_memory();
        assert!(storage.cached_permissions().is_none());
        storage
            .update_cached_permissions(vec![json!({"permission": {"key": "READ_ISSUE"}})])
            .await
            .unwrap();
        assert_eq!(storage.cached_permissions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_begin_account_moves_previous_to_siblings() {
        let storage = Storage::in_memory();
        storage
            .begin_account(config("http://a.example"), "key-a")
            .await
            .unwrap();
        let state = storage
            .begin_account(config("http://b.example/"), "key-b")
            .await
            .unwrap();

        assert_eq!(state.backend_url(), "http://b.example");
        assert_eq!(state.other_accounts.len(), 1);
        assert_eq!(state.other_accounts[0].backend_url(), "http://a.example");
        assert_eq!(
            state.other_accounts[0].auth_params_key.as_deref(),
            Some("key-a")
        );

        // Logging in to the same backend again does not duplicate it.
        let state = storage
            .begin_account(config("http://b.example"), "key-b2")
            .await
            .unwrap();
        assert_eq!(state.other_accounts.len(), 1);
        assert_eq!(state.auth_params_key.as_deref(), Some("key-b2"));
    }

    #[tokio::test]
    async fn test_switch_account() {
        let storage = Storage::in_memory();
        storage
            .begin_account(config("http://a.example"), "key-a")
            .await
            .unwrap();
        storage
            .begin_account(config("http://b.example"), "key-b")
            .await
            .unwrap();

        let target = storage.other_accounts()[0].clone();
        let state = storage.switch_account(&target).await.unwrap();

        assert_eq!(state.backend_url(), "http://a.example");
        assert_eq!(state.auth_params_key.as_deref(), Some("key-a"));
        assert_eq!(state.other_accounts.len(), 1);
        assert_eq!(state.other_accounts[0].backend_url(), "http://b.example");
    }

    #[tokio::test]
    async fn test_remove_active_account() {
        let store = Arc::new(MemoryStateStore::new());
        let storage = Storage::new(store.clone());
        storage
            .begin_account(config("http://a.example"), "key-a")
            .await
            .unwrap();
        storage
            .begin_account(config("http://b.example"), "key-b")
            .await
            .unwrap();

        let next = storage.remove_active_account().await.unwrap().unwrap();
        assert_eq!(next.backend_url(), "http://a.example");
        assert!(next.other_accounts.is_empty());

        assert!(storage.remove_active_account().await.unwrap().is_none());
        assert_eq!(storage.state(), StorageState::default());
        assert!(store.saved().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_flushes_to_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        let storage = Storage::new(Arc::new(FileStateStore::new(&path)));
        storage
            .flush_part(StoragePatch::new().config(config("http://a.example")))
            .await
            .unwrap();

        for round in 0..20 {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let storage = storage.clone();
                    let key = format!("{round}-{i}");
                    tokio::spawn(async move {
                        storage
                            .flush_part(StoragePatch::new().auth_params_key(key))
                            .await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let on_disk = FileStateStore::new(&path).load().await.unwrap().unwrap();
            assert_eq!(on_disk, storage.state());
            assert_eq!(on_disk.backend_url(), "http://a.example");
        }
    }

    /// Backend that fails every write.
    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl StateStore for FailingStore {
        async fn load(&self) -> Result<Option<StorageState>> {
            Ok(None)
        }

        async fn save(&self, _state: &StorageState) -> Result<()> {
            Err(StorageError::io(
                Path::new("state.json"),
                std::io::Error::other("disk full"),
            ))
        }

        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_snapshot() {
        let storage = Storage::new(Arc::new(FailingStore));

        let result = storage
            .flush_part(StoragePatch::new().config(config("http://a.example")))
            .await;

        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(storage.state(), StorageState::default());
    }
}
