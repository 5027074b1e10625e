//! Authorized request client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use ytm_auth::AuthSession;

use crate::error::{ClientError, FailedResponse, Result};
use crate::retry::with_refresh_retry;

/// Longest query string some servers accept without truncating it.
pub const MAX_QUERY_LENGTH: usize = 2048;

const ACCEPT_VALUE: &str = "application/json, text/plain, */*";

// ============================================================================
// RequestAuthorizer
// ============================================================================

/// Supplies authorization headers and recovers from expired tokens.
#[async_trait]
pub trait RequestAuthorizer: Send + Sync {
    /// Headers for the current token set.
    fn authorization_headers(&self) -> ytm_auth::Result<HeaderMap>;

    /// Obtain a new token set after a 401.
    async fn refresh(&self) -> ytm_auth::Result<()>;
}

#[async_trait]
impl RequestAuthorizer for AuthSession {
    fn authorization_headers(&self) -> ytm_auth::Result<HeaderMap> {
        AuthSession::authorization_headers(self)
    }

    async fn refresh(&self) -> ytm_auth::Result<()> {
        self.refresh_token().await.map(|_| ())
    }
}

// ============================================================================
// Request types
// ============================================================================

/// Per-request options.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    /// Parse the body as JSON (default), or hand back the raw response.
    pub parse_json: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { parse_json: true }
    }
}

impl RequestOptions {
    /// Options returning the raw response.
    pub fn raw() -> Self {
        Self { parse_json: false }
    }
}

/// Result of an authorized request.
#[derive(Debug)]
pub enum ApiResponse {
    Json(Value),
    Raw(reqwest::Response),
}

impl ApiResponse {
    /// The JSON body; raw responses are parsed now.
    pub async fn into_json(self) -> Result<Value> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::Raw(response) => {
                let text = response.text().await?;
                Ok(serde_json::from_str(&text)?)
            }
        }
    }

    /// The raw response, when the request asked for one.
    pub fn into_raw(self) -> Option<reqwest::Response> {
        match self {
            ApiResponse::Raw(response) => Some(response),
            ApiResponse::Json(_) => None,
        }
    }
}

/// Warn when the query part of `url` is too long for some servers.
///
/// The query is everything after the first `?`, with further `?` removed.
/// Returns whether the warning fired.
pub fn check_query_length(url: &str) -> bool {
    let query: String = url.split('?').skip(1).collect();
    let length = query.chars().count();
    if length > MAX_QUERY_LENGTH {
        tracing::warn!(
            length,
            max = MAX_QUERY_LENGTH,
            url,
            "query string is longer than some servers accept"
        );
        return true;
    }
    false
}

// ============================================================================
// AuthorizedClient
// ============================================================================

/// HTTP client that authorizes every request and retries once after a 401.
///
/// Cheap to clone; clones share the HTTP pool and the authorizer.
pub struct AuthorizedClient<A: RequestAuthorizer + ?Sized = AuthSession> {
    http: reqwest::Client,
    authorizer: Arc<A>,
}

impl<A: RequestAuthorizer + ?Sized> Clone for AuthorizedClient<A> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<A: RequestAuthorizer + ?Sized> std::fmt::Debug for AuthorizedClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient").finish_non_exhaustive()
    }
}

impl<A: RequestAuthorizer + ?Sized> AuthorizedClient<A> {
    pub fn new(authorizer: Arc<A>) -> Self {
        Self {
            http: reqwest::Client::new(),
            authorizer,
        }
    }

    /// Use a custom HTTP client.
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    /// Perform one authorized request.
    ///
    /// `method` defaults to GET. A 401 triggers one token refresh and one
    /// resend of the identical request; anything outside [200, 300) after
    /// that fails with [`ClientError::HttpStatus`].
    pub async fn make_authorized_request(
        &self,
        url: &str,
        method: Option<Method>,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let method = method.unwrap_or(Method::GET);
        tracing::debug!(%method, url, "making request");
        check_query_length(url);

        let payload = body.map(serde_json::to_vec).transpose()?;

        let response = with_refresh_retry(
            || self.send(method.clone(), url, payload.clone()),
            |response: &reqwest::Response| response.status() == StatusCode::UNAUTHORIZED,
            || async move { self.authorizer.refresh().await.map_err(ClientError::from) },
        )
        .await?;

        if !response.status().is_success() {
            let failed = FailedResponse::read(response).await;
            tracing::debug!(
                status = failed.status,
                url = %failed.url,
                body = %failed.body,
                "request failed"
            );
            return Err(ClientError::HttpStatus(Box::new(failed)));
        }

        if !options.parse_json {
            return Ok(ApiResponse::Raw(response));
        }
        let text = response.text().await?;
        Ok(ApiResponse::Json(serde_json::from_str(&text)?))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE))
            .headers(self.authorizer.authorization_headers()?);
        if let Some(payload) = payload {
            request = request.body(payload);
        }
        Ok(request.send().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// GET and deserialize.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let value = self
            .make_authorized_request(url, None, None, RequestOptions::default())
            .await?
            .into_json()
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST a body and deserialize the answer.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let value = self
            .make_authorized_request(url, Some(Method::POST), Some(&body), RequestOptions::default())
            .await?
            .into_json()
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// DELETE, ignoring the body.
    pub async fn delete(&self, url: &str) -> Result<()> {
        self.make_authorized_request(url, Some(Method::DELETE), None, RequestOptions::raw())
            .await?;
        Ok(())
    }
}
