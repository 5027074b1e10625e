//! OAuth2 session for one account.
//!
//! State machine:
//!
//! ```text
//! LoggedOut ─► Authenticating ─► Authenticated ─(401)─► Refreshing ─► Authenticated
//!                    │                                       │
//!                    └──────────────► LoggedOut ◄────────────┘ (failure)
//! ```
//!
//! A failed refresh is terminal for the session: the held tokens are dropped,
//! the state becomes [`AuthState::LoggedOut`] and the caller gets
//! [`AuthError::RefreshFailed`].

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::watch;
use ytm_config::AppConfig;
use ytm_storage::{DEFAULT_CREDENTIALS_KEY, SharedCredentialCache, Storage};

use crate::error::{AuthError, Result};
use crate::flow::{AuthFlow, OAuthFlowConfig, SharedAuthFlow};
use crate::params::AuthParams;
use crate::token::{form_body, request_token};

/// Fields requested from the current-user lookup.
pub const CURRENT_USER_FIELDS: &str =
    "id,guest,name,profile/avatar/url,endUserAgreementConsent(accepted,majorVersion,minorVersion)";

/// Path of the current-user lookup, relative to the backend URL.
const CURRENT_USER_PATH: &str = "/api/rest/users/me";

// ============================================================================
// AuthState
// ============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::LoggedOut => write!(f, "logged out"),
            AuthState::Authenticating => write!(f, "authenticating"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Refreshing => write!(f, "refreshing"),
        }
    }
}

// ============================================================================
// AuthSession
// ============================================================================

/// Token lifecycle of one account.
pub struct AuthSession {
    config: AppConfig,
    http: reqwest::Client,
    flow: SharedAuthFlow,
    credentials: SharedCredentialCache,
    auth_params_key: String,
    params: RwLock<Option<AuthParams>>,
    state: watch::Sender<AuthState>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("backend_url", &self.config.backend_url)
            .field("auth_params_key", &self.auth_params_key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Shared session for use across async contexts.
pub type SharedAuthSession = Arc<AuthSession>;

impl AuthSession {
    /// Create a logged-out session for a backend.
    pub fn new(config: AppConfig, flow: SharedAuthFlow, credentials: SharedCredentialCache) -> Self {
        let (state, _) = watch::channel(AuthState::LoggedOut);
        Self {
            config,
            http: reqwest::Client::new(),
            flow,
            credentials,
            auth_params_key: DEFAULT_CREDENTIALS_KEY.to_string(),
            params: RwLock::new(None),
            state,
        }
    }

    /// Create a session for the active account of a storage context.
    pub fn from_storage(
        storage: &Storage,
        flow: SharedAuthFlow,
        credentials: SharedCredentialCache,
    ) -> Result<Self> {
        let config = storage
            .config()
            .ok_or_else(|| AuthError::Config("no backend configured".to_string()))?;
        let key = storage
            .auth_params_key()
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_KEY.to_string());

        Ok(Self::new(config, flow, credentials).with_auth_params_key(key))
    }

    /// Use a custom HTTP client (timeouts, proxies, ...).
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Namespace the cached tokens under `key`.
    pub fn with_auth_params_key(mut self, key: impl Into<String>) -> Self {
        self.auth_params_key = key.into();
        self
    }

    /// Start from an already obtained token set.
    pub fn with_auth_params(self, params: AuthParams) -> Self {
        self.set_auth_params(params);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn auth_params_key(&self) -> &str {
        &self.auth_params_key
    }

    /// The token set currently held.
    pub fn auth_params(&self) -> Option<AuthParams> {
        self.params.read().clone()
    }

    /// Replace the held token set.
    pub fn set_auth_params(&self, params: AuthParams) {
        let authenticated = params.has_access_token();
        *self.params.write() = Some(params);
        self.transition(if authenticated {
            AuthState::Authenticated
        } else {
            AuthState::LoggedOut
        });
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn transition(&self, next: AuthState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "auth state changed");
        }
    }

    fn reset(&self) {
        *self.params.write() = None;
        self.transition(AuthState::LoggedOut);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token acquisition
    // ─────────────────────────────────────────────────────────────────────────

    /// Password grant against the Hub token endpoint.
    pub async fn obtain_token_by_credentials(
        http: &reqwest::Client,
        username: &str,
        password: &str,
        config: &AppConfig,
    ) -> Result<AuthParams> {
        tracing::info!(server = %config.auth.server_uri, "obtaining token by credentials");

        let body = form_body(&[
            ("grant_type", "password"),
            ("access_type", "offline"),
            ("username", username),
            ("password", password),
            ("scope", config.auth.scopes.as_str()),
        ]);

        request_token(
            http,
            &config.auth.token_endpoint(),
            &config.auth.client_id,
            config.auth.client_secret_or_empty(),
            body,
        )
        .await
    }

    /// Authorization-code login through the platform flow.
    pub async fn obtain_token_with_oauth_code(
        flow: &dyn AuthFlow,
        config: &AppConfig,
    ) -> Result<AuthParams> {
        tracing::info!(server = %config.auth.server_uri, "obtaining token with OAuth code flow");
        let result = flow
            .authorize(&OAuthFlowConfig::for_authorization(config))
            .await?;
        Ok(result.into_auth_params())
    }

    /// Verify a token set by loading the current user.
    ///
    /// Anything but HTTP 200 is a rejection.
    pub async fn load_current_user(&self, params: &AuthParams) -> Result<Value> {
        let url = format!(
            "{}{}",
            self.config.normalized_backend_url(),
            CURRENT_USER_PATH
        );

        let response = self
            .http
            .get(&url)
            .query(&[("fields", CURRENT_USER_FIELDS)])
            .header(AUTHORIZATION, params.authorization_value()?)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "current user lookup rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credential cache
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt and persist a token set; returns it for chaining.
    pub async fn cache_auth_params(
        &self,
        params: AuthParams,
        key: Option<&str>,
    ) -> Result<AuthParams> {
        let key = key.unwrap_or(DEFAULT_CREDENTIALS_KEY);
        let json = serde_json::to_string(&params)
            .map_err(|e| AuthError::Serialization(format!("Failed to serialize tokens: {}", e)))?;
        self.credentials.store(key, &json).await?;
        Ok(params)
    }

    /// Read a cached token set.
    pub async fn get_cached_auth_params(&self, key: Option<&str>) -> Result<AuthParams> {
        let key = key.unwrap_or(DEFAULT_CREDENTIALS_KEY);
        let Some(json) = self.credentials.load(key).await? else {
            tracing::debug!(key, "no cached credentials");
            return Err(AuthError::NoCachedCredentials(key.to_string()));
        };
        serde_json::from_str(&json)
            .map_err(|e| AuthError::Serialization(format!("Failed to parse cached tokens: {}", e)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Headers
    // ─────────────────────────────────────────────────────────────────────────

    /// `<token_type> <access_token>` of the held token set.
    pub fn authorization_header(&self) -> Result<String> {
        self.params
            .read()
            .as_ref()
            .ok_or(AuthError::NotAuthenticated)?
            .authorization_value()
    }

    /// Headers carrying the held token set.
    pub fn authorization_headers(&self) -> Result<HeaderMap> {
        let value = HeaderValue::from_str(&self.authorization_header()?).map_err(|_| {
            AuthError::InvalidRequest("access token is not a valid header value".to_string())
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Refresh the held token set.
    ///
    /// The new tokens are verified and cached before they replace the old
    /// ones. Safe to call concurrently; each call refreshes independently.
    pub async fn refresh_token(&self) -> Result<AuthParams> {
        self.refresh_and_verify().await.map(|(params, _)| params)
    }

    async fn refresh_and_verify(&self) -> Result<(AuthParams, Value)> {
        self.transition(AuthState::Refreshing);
        tracing::info!("refreshing access token");

        match self.try_refresh().await {
            Ok((params, user)) => {
                *self.params.write() = Some(params.clone());
                self.transition(AuthState::Authenticated);
                tracing::info!("access token refreshed");
                Ok((params, user))
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, logging out");
                self.reset();
                Err(AuthError::RefreshFailed(Box::new(e)))
            }
        }
    }

    async fn try_refresh(&self) -> Result<(AuthParams, Value)> {
        let current = match self.auth_params() {
            Some(params) => params,
            None => self.get_cached_auth_params(Some(&self.auth_params_key)).await?,
        };
        if current.refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let result = self
            .flow
            .refresh(
                &OAuthFlowConfig::for_refresh(&self.config),
                &current.refresh_token,
            )
            .await?;

        let mut params = result.into_auth_params();
        if params.refresh_token.is_empty() {
            params.refresh_token = current.refresh_token;
        }
        params.in_app_login = current.in_app_login;

        let user = self.load_current_user(&params).await?;
        let params = self
            .cache_auth_params(params, Some(&self.auth_params_key))
            .await?;
        Ok((params, user))
    }

    /// Log in with username and password. Returns the current user.
    pub async fn login_with_credentials(&self, username: &str, password: &str) -> Result<Value> {
        self.transition(AuthState::Authenticating);
        let result = async {
            let mut params =
                Self::obtain_token_by_credentials(&self.http, username, password, &self.config)
                    .await?;
            params.in_app_login = Some(true);
            self.complete_login(params).await
        }
        .await;

        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Log in through the authorization-code flow. Returns the current user.
    pub async fn login_with_oauth_code(&self) -> Result<Value> {
        self.transition(AuthState::Authenticating);
        let result = async {
            let params =
                Self::obtain_token_with_oauth_code(self.flow.as_ref(), &self.config).await?;
            self.complete_login(params).await
        }
        .await;

        if result.is_err() {
            self.reset();
        }
        result
    }

    async fn complete_login(&self, params: AuthParams) -> Result<Value> {
        let user = self.load_current_user(&params).await?;
        let params = self
            .cache_auth_params(params, Some(&self.auth_params_key))
            .await?;
        *self.params.write() = Some(params);
        self.transition(AuthState::Authenticated);
        tracing::info!(backend = %self.config.backend_url, "logged in");
        Ok(user)
    }

    /// Resume from cached tokens. Returns the current user.
    ///
    /// A 401 from the lookup triggers one refresh; any other failure leaves
    /// the session logged out.
    pub async fn restore(&self) -> Result<Value> {
        self.transition(AuthState::Authenticating);

        let cached = match self.get_cached_auth_params(Some(&self.auth_params_key)).await {
            Ok(params) => params,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        *self.params.write() = Some(cached.clone());

        match self.load_current_user(&cached).await {
            Ok(user) => {
                self.transition(AuthState::Authenticated);
                Ok(user)
            }
            Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED.as_u16()) => {
                tracing::info!("cached token rejected, trying refresh");
                self.refresh_and_verify().await.map(|(_, user)| user)
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Forget the tokens of this session, cached copy included.
    pub async fn logout(&self) -> Result<()> {
        self.credentials.remove(&self.auth_params_key).await?;
        self.reset();
        tracing::info!(backend = %self.config.backend_url, "logged out");
        Ok(())
    }
}
