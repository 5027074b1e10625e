//! Client error types.

use reqwest::header::HeaderMap;
use thiserror::Error;
use ytm_auth::AuthError;

/// A response outside the 2xx range, kept for error-message extraction.
#[derive(Debug, Clone)]
pub struct FailedResponse {
    /// HTTP status code.
    pub status: u16,
    /// URL of the final request.
    pub url: String,
    pub headers: HeaderMap,
    /// Body as text; empty when it could not be read.
    pub body: String,
}

impl FailedResponse {
    /// Drain a response into a `FailedResponse`.
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Self {
            status,
            url,
            headers,
            body,
        }
    }

    /// The body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Authorization headers or token refresh failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// HTTP request failed at the transport level.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered outside [200, 300).
    #[error("Request to {} failed with status {}", .0.url, .0.status)]
    HttpStatus(Box<FailedResponse>),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The backend is not usable from this client.
    #[error("Incompatible server: {0}")]
    IncompatibleServer(String),
}

impl ClientError {
    /// HTTP status of the failure, if there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::HttpStatus(response) => Some(response.status),
            ClientError::Auth(e) => e.status(),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The failed response, for `HttpStatus` errors.
    pub fn failed_response(&self) -> Option<&FailedResponse> {
        match self {
            ClientError::HttpStatus(response) => Some(&**response),
            _ => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::Auth(_)) || self.status() == Some(401)
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::HttpStatus(r) if r.status == 404)
    }

    /// Whether the user has to log in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::Auth(e) if e.requires_login())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
