//! Backend configuration types.
//!
//! These mirror the shape of the configuration blob persisted alongside each
//! account, so they serialize camelCase:
//!
//! ```json
//! {
//!   "backendUrl": "https://youtrack.example",
//!   "auth": {
//!     "serverUri": "https://youtrack.example/hub",
//!     "clientId": "client-id",
//!     "clientSecret": "client-secret",
//!     "scopes": "0-0-0-0-0 youtrack-service-id",
//!     "landingUrl": "ytoauth://landing.url",
//!     "youtrackServiceId": "youtrack-service-id"
//!   },
//!   "statisticsEnabled": false,
//!   "version": "2023.1"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Path of the OAuth2 authorization endpoint, relative to the Hub server URI.
pub const AUTHORIZE_PATH: &str = "/api/rest/oauth2/auth";

/// Path of the OAuth2 token endpoint, relative to the Hub server URI.
pub const TOKEN_PATH: &str = "/api/rest/oauth2/token";

/// Strip trailing slashes from a URL.
///
/// Two accounts are the same account iff their backend URLs are equal after
/// this normalization.
pub fn remove_trailing_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthConfig
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth client configuration for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Hub (identity provider) base URL.
    pub server_uri: String,

    /// OAuth client id registered for the mobile service.
    pub client_id: String,

    /// OAuth client secret, if the service has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Space-separated scopes.
    #[serde(default)]
    pub scopes: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,

    /// Redirect URL for the authorization-code flow.
    #[serde(default)]
    pub landing_url: String,

    /// Service id of the tracker inside Hub.
    #[serde(default)]
    pub youtrack_service_id: String,
}

impl AuthConfig {
    /// Hub base URL without trailing slashes.
    pub fn server_base(&self) -> &str {
        remove_trailing_slash(&self.server_uri)
    }

    /// Full URL of the authorization endpoint.
    pub fn authorize_endpoint(&self) -> String {
        format!("{}{}", self.server_base(), AUTHORIZE_PATH)
    }

    /// Full URL of the token endpoint.
    pub fn token_endpoint(&self) -> String {
        format!("{}{}", self.server_base(), TOKEN_PATH)
    }

    /// Scopes as a list.
    pub fn scope_list(&self) -> Vec<String> {
        self.scopes
            .split(' ')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Client secret, or the empty string when the client is public.
    pub fn client_secret_or_empty(&self) -> &str {
        self.client_secret.as_deref().unwrap_or("")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AppConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration of one backend: where it lives and how to authenticate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Tracker base URL.
    pub backend_url: String,

    /// OAuth client configuration.
    pub auth: AuthConfig,

    #[serde(default)]
    pub statistics_enabled: bool,

    /// Server version string, e.g. `2023.1`.
    #[serde(default)]
    pub version: String,
}

impl AppConfig {
    /// Create a config for a backend with the given auth settings.
    pub fn new(backend_url: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            backend_url: backend_url.into(),
            auth,
            statistics_enabled: false,
            version: String::new(),
        }
    }

    /// Set the server version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Backend URL without trailing slashes.
    pub fn normalized_backend_url(&self) -> &str {
        remove_trailing_slash(&self.backend_url)
    }

    /// Check that the fields every network call relies on are present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("backendUrl", self.backend_url.as_str()),
            ("auth.serverUri", self.auth.server_uri.as_str()),
            ("auth.clientId", self.auth.client_id.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                    context: "app config".to_string(),
                });
            }
        }
        Ok(())
    }
}
