//! The storage state snapshot and partial-merge patches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ytm_config::{AppConfig, remove_trailing_slash};

/// Schema version written into every snapshot.
pub const STORAGE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STORAGE_VERSION
}

// ============================================================================
// CurrentUser
// ============================================================================

/// The signed-in user as reported by Hub, plus the tracker's own user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The tracker's user record (`/api/users/me`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yt_current_user: Option<Value>,

    /// Any other Hub fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurrentUser {
    /// Build from a Hub `users/me` payload.
    ///
    /// A payload that does not fit the typed fields is kept whole under
    /// `extra["hubPayload"]`, so the persisted state still loads.
    pub fn from_hub_payload(payload: Value) -> Self {
        match serde_json::from_value(payload.clone()) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "unexpected Hub user payload, keeping it untyped");
                Self {
                    extra: Map::from_iter([("hubPayload".to_string(), payload)]),
                    ..Default::default()
                }
            }
        }
    }
}

// ============================================================================
// StorageState
// ============================================================================

/// Snapshot of everything persisted for one account.
///
/// The active snapshot carries the other logged-in accounts in
/// `other_accounts`; sibling snapshots leave that list empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageState {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AppConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<CurrentUser>,

    /// Key of the credential-cache entry holding this account's tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_params_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_accounts: Vec<StorageState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Value>>,

    /// Free-form cached payloads (inbox cache, drafts, ...).
    #[serde(flatten)]
    pub cached: Map<String, Value>,
}

impl Default for StorageState {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            config: None,
            current_user: None,
            auth_params_key: None,
            other_accounts: Vec::new(),
            permissions: None,
            cached: Map::new(),
        }
    }
}

impl StorageState {
    /// Snapshot for a freshly configured account.
    pub fn for_config(config: AppConfig) -> Self {
        Self {
            config: Some(config),
            ..Default::default()
        }
    }

    /// Normalized backend URL, or `""` when the snapshot has no config.
    pub fn backend_url(&self) -> &str {
        self.config
            .as_ref()
            .map(|c| remove_trailing_slash(&c.backend_url))
            .unwrap_or("")
    }

    /// Whether this snapshot points at the given backend.
    pub fn is_backend(&self, backend_url: &str) -> bool {
        self.backend_url() == remove_trailing_slash(backend_url)
    }

    /// Whether two snapshots refer to the same account.
    pub fn is_same_account(&self, other: &StorageState) -> bool {
        self.backend_url() == other.backend_url()
    }

    /// A cached payload by name.
    pub fn cached(&self, key: &str) -> Option<&Value> {
        self.cached.get(key)
    }

    /// Copy of this snapshot without its sibling list.
    pub fn detached(&self) -> StorageState {
        StorageState {
            other_accounts: Vec::new(),
            ..self.clone()
        }
    }

    /// Apply a shallow merge: every field present in the patch replaces the
    /// field of the snapshot.
    pub fn merge(&mut self, patch: StoragePatch) {
        if let Some(config) = patch.config {
            self.config = config;
        }
        if let Some(current_user) = patch.current_user {
            self.current_user = current_user;
        }
        if let Some(key) = patch.auth_params_key {
            self.auth_params_key = key;
        }
        if let Some(other_accounts) = patch.other_accounts {
            self.other_accounts = other_accounts;
        }
        if let Some(permissions) = patch.permissions {
            self.permissions = permissions;
        }
        for (key, value) in patch.cached {
            if value.is_null() {
                self.cached.remove(&key);
            } else {
                self.cached.insert(key, value);
            }
        }
    }
}

// ============================================================================
// StoragePatch
// ============================================================================

/// A partial update of a [`StorageState`].
///
/// `None` leaves a field untouched; `Some(None)` clears it. A `null` cached
/// payload removes that entry.
#[derive(Debug, Clone, Default)]
pub struct StoragePatch {
    pub config: Option<Option<AppConfig>>,
    pub current_user: Option<Option<CurrentUser>>,
    pub auth_params_key: Option<Option<String>>,
    pub other_accounts: Option<Vec<StorageState>>,
    pub permissions: Option<Option<Vec<Value>>>,
    pub cached: Map<String, Value>,
}

impl StoragePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(Some(config));
        self
    }

    pub fn current_user(mut self, user: CurrentUser) -> Self {
        self.current_user = Some(Some(user));
        self
    }

    pub fn clear_current_user(mut self) -> Self {
        self.current_user = Some(None);
        self
    }

    pub fn auth_params_key(mut self, key: impl Into<String>) -> Self {
        self.auth_params_key = Some(Some(key.into()));
        self
    }

    pub fn clear_auth_params_key(mut self) -> Self {
        self.auth_params_key = Some(None);
        self
    }

    pub fn other_accounts(mut self, accounts: Vec<StorageState>) -> Self {
        self.other_accounts = Some(accounts);
        self
    }

    pub fn permissions(mut self, permissions: Vec<Value>) -> Self {
        self.permissions = Some(Some(permissions));
        self
    }

    pub fn cached(mut self, key: impl Into<String>, value: Value) -> Self {
        self.cached.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ytm_config::AuthConfig;

    fn config(url: &str) -> AppConfig {
        AppConfig::new(url, AuthConfig::default())
    }

    #[test]
    fn test_default_has_current_version() {
        assert_eq!(StorageState::default().version, STORAGE_VERSION);
    }

    #[test]
    fn test_backend_url_normalized() {
        let state = StorageState::for_config(config("http://youtrack.example/"));
        assert_eq!(state.backend_url(), "http://youtrack.example");
        assert!(state.is_backend("http://youtrack.example"));
        assert!(state.is_backend("http://youtrack.example/"));
        assert_eq!(StorageState::default().backend_url(), "");
    }

    #[test]
    fn test_merge_replaces_only_present_fields() {
        let mut state = StorageState::for_config(config("http://a.example"));
        state.auth_params_key = Some("123".to_string());

        state.merge(StoragePatch::new().permissions(vec![json!({"key": "READ_ISSUE"})]));

        assert_eq!(state.backend_url(), "http://a.example");
        assert_eq!(state.auth_params_key.as_deref(), Some("123"));
        assert_eq!(state.permissions.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_clears_fields() {
        let mut state = StorageState::for_config(config("http://a.example"));
        state.auth_params_key = Some("123".to_string());
        state.current_user = Some(CurrentUser::default());

        state.merge(
            StoragePatch::new()
                .clear_auth_params_key()
                .clear_current_user(),
        );

        assert!(state.auth_params_key.is_none());
        assert!(state.current_user.is_none());
        assert!(state.config.is_some());
    }

    #[test]
    fn test_merge_cached_payloads() {
        let mut state = StorageState::default();
        state.merge(StoragePatch::new().cached("inboxCache", json!([1, 2])));
        assert_eq!(state.cached("inboxCache"), Some(&json!([1, 2])));

        state.merge(StoragePatch::new().cached("inboxCache", Value::Null));
        assert!(state.cached("inboxCache").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let mut state = StorageState::for_config(config("http://a.example"));
        state.auth_params_key = Some("1700000000".to_string());
        state.cached.insert("agileZoomIn".to_string(), json!(true));
        state
            .other_accounts
            .push(StorageState::for_config(config("http://b.example")));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["authParamsKey"], "1700000000");
        assert_eq!(json["config"]["backendUrl"], "http://a.example");
        assert_eq!(json["otherAccounts"][0]["config"]["backendUrl"], "http://b.example");
        assert_eq!(json["agileZoomIn"], true);

        let parsed: StorageState = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_current_user_keeps_unknown_fields() {
        let user = CurrentUser::from_hub_payload(json!({
            "id": "u1",
            "name": "John",
            "guest": false,
        }));
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.extra.get("guest"), Some(&json!(false)));
    }

    #[test]
    fn test_detached_drops_siblings() {
        let mut state = StorageState::for_config(config("http://a.example"));
        state
            .other_accounts
            .push(StorageState::for_config(config("http://b.example")));
        assert!(state.detached().other_accounts.is_empty());
    }

    #[test]
    fn test_mistyped_hub_payload_is_kept() {
        let payload = json!({"id": 42, "login": "john", "name": "John"});
        let user = CurrentUser::from_hub_payload(payload.clone());

        assert!(user.id.is_none());
        assert_eq!(user.extra["hubPayload"], payload);

        let state = StorageState {
            current_user: Some(user.clone()),
            ..StorageState::for_config(config("http://a.example"))
        };
        let reloaded: StorageState =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(reloaded.current_user, Some(user));
    }
}
