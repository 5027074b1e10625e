//! Authorization-code and refresh flows.
//!
//! On mobile these are platform primitives; the session only sees the
//! [`AuthFlow`] trait. [`HttpAuthFlow`] is the portable implementation: it
//! builds the authorization URL, hands it to an [`AuthorizationCodeSource`]
//! (browser + paste, local redirect listener, ...) and talks to the token
//! endpoint directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ytm_config::AppConfig;

use crate::error::{AuthError, Result};
use crate::params::AuthParams;
use crate::token::{form_body, request_token};

// ============================================================================
// Flow configuration
// ============================================================================

/// Authorization server endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfiguration {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// Everything a flow needs to talk to the authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlowConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub additional_parameters: BTreeMap<String, String>,
    #[serde(rename = "usePKCE")]
    pub use_pkce: bool,
    pub service_configuration: ServiceConfiguration,
    pub dangerously_allow_insecure_http_requests: bool,
}

impl OAuthFlowConfig {
    fn base(config: &AppConfig) -> Self {
        Self {
            client_id: config.auth.client_id.clone(),
            client_secret: config.auth.client_secret.clone(),
            redirect_url: config.auth.landing_url.clone(),
            scopes: Vec::new(),
            additional_parameters: BTreeMap::new(),
            use_pkce: false,
            service_configuration: ServiceConfiguration {
                authorization_endpoint: config.auth.authorize_endpoint(),
                token_endpoint: config.auth.token_endpoint(),
            },
            dangerously_allow_insecure_http_requests: true,
        }
    }

    /// Configuration of the authorization-code login.
    ///
    /// Requests offline access and forces the login prompt.
    pub fn for_authorization(config: &AppConfig) -> Self {
        let mut flow = Self::base(config);
        flow.scopes = config.auth.scope_list();
        flow.additional_parameters
            .insert("access_type".to_string(), "offline".to_string());
        flow.additional_parameters
            .insert("prompt".to_string(), "login".to_string());
        flow
    }

    /// Configuration of a token refresh.
    pub fn for_refresh(config: &AppConfig) -> Self {
        Self::base(config)
    }

    fn client_secret_or_empty(&self) -> &str {
        self.client_secret.as_deref().unwrap_or("")
    }

    fn check_transport(&self) -> Result<()> {
        let endpoints = [
            &self.service_configuration.authorization_endpoint,
            &self.service_configuration.token_endpoint,
        ];
        if !self.dangerously_allow_insecure_http_requests
            && endpoints.iter().any(|e| e.starts_with("http://"))
        {
            return Err(AuthError::Config(
                "insecure http endpoint and insecure requests are not allowed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a platform flow, in the platform's own field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlowResult {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub access_token_expiration_date: Option<String>,
}

impl OAuthFlowResult {
    /// Normalize into the token-endpoint shape.
    pub fn into_auth_params(self) -> AuthParams {
        AuthParams {
            access_token: self.access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            token_type: self.token_type,
            access_token_expiration_date: self.access_token_expiration_date,
            ..Default::default()
        }
    }
}

impl From<AuthParams> for OAuthFlowResult {
    fn from(params: AuthParams) -> Self {
        Self {
            access_token: params.access_token,
            refresh_token: Some(params.refresh_token).filter(|t| !t.is_empty()),
            token_type: params.token_type,
            access_token_expiration_date: params.access_token_expiration_date,
        }
    }
}

// ============================================================================
// AuthFlow Trait
// ============================================================================

/// Platform authorization-code and refresh primitives.
#[async_trait]
pub trait AuthFlow: Send + Sync + std::fmt::Debug {
    /// Run the interactive authorization-code flow.
    async fn authorize(&self, config: &OAuthFlowConfig) -> Result<OAuthFlowResult>;

    /// Exchange a refresh token for a new token set.
    async fn refresh(
        &self,
        config: &OAuthFlowConfig,
        refresh_token: &str,
    ) -> Result<OAuthFlowResult>;
}

/// Shared flow for use across async contexts.
pub type SharedAuthFlow = Arc<dyn AuthFlow>;

// ============================================================================
// PKCE / state
// ============================================================================

/// PKCE code verifier and S256 challenge.
///
/// Only used by [`HttpAuthFlow`] when a caller-built [`OAuthFlowConfig`] sets
/// `use_pkce`; the configs built from an [`AppConfig`] leave it off.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Random 32-byte verifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// `challenge = base64url(sha256(verifier))`.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Build the authorization URL for the code flow.
pub fn build_authorization_url(
    config: &OAuthFlowConfig,
    state: &str,
    pkce: Option<&PkceChallenge>,
) -> String {
    let scope = config.scopes.join(" ");
    let mut params: Vec<(&str, &str)> = vec![
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_url.as_str()),
        ("scope", scope.as_str()),
        ("state", state),
    ];
    if let Some(pkce) = pkce {
        params.push(("code_challenge", pkce.challenge.as_str()));
        params.push(("code_challenge_method", "S256"));
    }
    for (k, v) in &config.additional_parameters {
        params.push((k.as_str(), v.as_str()));
    }

    format!(
        "{}?{}",
        config.service_configuration.authorization_endpoint,
        form_body(&params)
    )
}

/// Extract the authorization code from what the user agent landed on.
///
/// Accepts either the full redirect URL (`<landing>?code=..&state=..`) or a
/// bare code. A `state` in the redirect must match `expected_state`.
pub fn parse_redirect(input: &str, expected_state: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidRequest(
            "Missing authorization code".to_string(),
        ));
    }

    let Ok(url) = url::Url::parse(trimmed) else {
        return Ok(trimmed.to_string());
    };

    let query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = query.get("error") {
        let description = query.get("error_description").cloned().unwrap_or_default();
        return Err(AuthError::Flow(
            format!("{} {}", error, description).trim().to_string(),
        ));
    }

    if let Some(state) = query.get("state")
        && state != expected_state
    {
        return Err(AuthError::Flow(
            "State mismatch, expected state does not match".to_string(),
        ));
    }

    query
        .get("code")
        .filter(|c| !c.is_empty())
        .cloned()
        .ok_or_else(|| AuthError::InvalidRequest("Redirect has no code parameter".to_string()))
}

// ============================================================================
// HttpAuthFlow
// ============================================================================

/// Delivers the authorization code for a URL the user has to visit.
#[async_trait]
pub trait AuthorizationCodeSource: Send + Sync + std::fmt::Debug {
    /// Present `authorization_url` and return the redirect URL (or bare code)
    /// the user ends up with.
    async fn receive_code(&self, authorization_url: &str) -> Result<String>;
}

/// Flow talking to the token endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthFlow {
    http: reqwest::Client,
    code_source: Option<Arc<dyn AuthorizationCodeSource>>,
}

impl HttpAuthFlow {
    /// Flow that can only refresh (no interactive login).
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            code_source: None,
        }
    }

    /// Set where authorization codes come from.
    pub fn with_code_source(mut self, source: Arc<dyn AuthorizationCodeSource>) -> Self {
        self.code_source = Some(source);
        self
    }
}

#[async_trait]
impl AuthFlow for HttpAuthFlow {
    async fn authorize(&self, config: &OAuthFlowConfig) -> Result<OAuthFlowResult> {
        config.check_transport()?;
        let source = self.code_source.as_ref().ok_or_else(|| {
            AuthError::Config("no authorization code source configured".to_string())
        })?;

        let state = generate_state();
        let pkce = config.use_pkce.then(PkceChallenge::generate);
        let url = build_authorization_url(config, &state, pkce.as_ref());

        let redirect = source.receive_code(&url).await?;
        let code = parse_redirect(&redirect, &state)?;

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
        ];
        if let Some(pkce) = &pkce {
            params.push(("code_verifier", pkce.verifier.as_str()));
        }

        let tokens = request_token(
            &self.http,
            &config.service_configuration.token_endpoint,
            &config.client_id,
            config.client_secret_or_empty(),
            form_body(&params),
        )
        .await?;

        tracing::info!("authorization code exchanged for tokens");
        Ok(tokens.into())
    }

    async fn refresh(
        &self,
        config: &OAuthFlowConfig,
        refresh_token: &str,
    ) -> Result<OAuthFlowResult> {
        config.check_transport()?;

        let body = form_body(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        let tokens = request_token(
            &self.http,
            &config.service_configuration.token_endpoint,
            &config.client_id,
            config.client_secret_or_empty(),
            body,
        )
        .await?;

        Ok(tokens.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytm_config::AuthConfig;

    fn app_config() -> AppConfig {
        AppConfig::new(
            "http://youtrack.example",
            AuthConfig {
                server_uri: "http://youtrack/pm.example".to_string(),
                client_id: "client-id".to_string(),
                client_secret: Some("client-secret".to_string()),
                scopes: "scope1 scope2".to_string(),
                session_cookie: None,
                landing_url: "ytoauth://landing.url".to_string(),
                youtrack_service_id: "yt-service-id".to_string(),
            },
        )
    }

    #[test]
    fn test_authorization_config() {
        let flow = OAuthFlowConfig::for_authorization(&app_config());

        assert_eq!(flow.client_id, "client-id");
        assert_eq!(flow.client_secret.as_deref(), Some("client-secret"));
        assert_eq!(flow.redirect_url, "ytoauth://landing.url");
        assert_eq!(flow.scopes, vec!["scope1", "scope2"]);
        assert!(!flow.use_pkce);
        assert!(flow.dangerously_allow_insecure_http_requests);
        assert_eq!(flow.additional_parameters["access_type"], "offline");
        assert_eq!(flow.additional_parameters["prompt"], "login");
        assert_eq!(
            flow.service_configuration,
            ServiceConfiguration {
                authorization_endpoint: "http://youtrack/pm.example/api/rest/oauth2/auth"
                    .to_string(),
                token_endpoint: "http://youtrack/pm.example/api/rest/oauth2/token".to_string(),
            }
        );
    }

    #[test]
    fn test_refresh_config_has_no_login_parameters() {
        let flow = OAuthFlowConfig::for_refresh(&app_config());
        assert!(flow.scopes.is_empty());
        assert!(flow.additional_parameters.is_empty());
        assert_eq!(
            flow.service_configuration.token_endpoint,
            "http://youtrack/pm.example/api/rest/oauth2/token"
        );
    }

    #[test]
    fn test_insecure_transport_check() {
        let mut flow = OAuthFlowConfig::for_refresh(&app_config());
        assert!(flow.check_transport().is_ok());
        flow.dangerously_allow_insecure_http_requests = false;
        assert!(matches!(flow.check_transport(), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_flow_result_normalization() {
        let result = OAuthFlowResult {
            access_token: "accessToken".to_string(),
            refresh_token: Some("refreshToken".to_string()),
            token_type: "tokenType".to_string(),
            access_token_expiration_date: None,
        };
        let params = result.into_auth_params();
        assert_eq!(params, AuthParams::new("accessToken", "refreshToken", "tokenType"));
    }

    #[test]
    fn test_pkce_challenge() {
        let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");

        let generated = PkceChallenge::generate();
        assert_eq!(generated.verifier.len(), 43);
        assert_ne!(generated.verifier, PkceChallenge::generate().verifier);
    }

    #[test]
    fn test_state_generation() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn test_authorization_url() {
        let flow = OAuthFlowConfig::for_authorization(&app_config());
        let url = build_authorization_url(&flow, "test_state", None);

        assert!(url.starts_with("http://youtrack/pm.example/api/rest/oauth2/auth?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("scope=scope1%20scope2"));
        assert!(url.contains("state=test_state"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=login"));
        assert!(url.contains("redirect_uri=ytoauth%3A%2F%2Flanding.url"));
        assert!(!url.contains("code_challenge"));

        let pkce = PkceChallenge::generate();
        let url = build_authorization_url(&flow, "test_state", Some(&pkce));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn test_parse_redirect() {
        assert_eq!(
            parse_redirect("ytoauth://landing.url?code=abc&state=s1", "s1").unwrap(),
            "abc"
        );
        assert_eq!(parse_redirect("  bare-code ", "s1").unwrap(), "bare-code");
        assert!(matches!(
            parse_redirect("ytoauth://landing.url?code=abc&state=other", "s1"),
            Err(AuthError::Flow(_))
        ));
        assert!(matches!(
            parse_redirect("ytoauth://landing.url?error=access_denied", "s1"),
            Err(AuthError::Flow(_))
        ));
        assert!(matches!(
            parse_redirect("ytoauth://landing.url?state=s1", "s1"),
            Err(AuthError::InvalidRequest(_))
        ));
        assert!(parse_redirect("", "s1").is_err());
    }
}
