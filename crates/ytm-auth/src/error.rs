//! Error types for the auth session.

use ytm_storage::StorageError;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while obtaining, refreshing or using tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Nothing cached under the key; the user has to log in.
    #[error("No cached credentials for key '{0}'")]
    NoCachedCredentials(String),

    /// Token, verification or refresh endpoint answered with a non-success status.
    #[error("Authentication rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Refreshing the token failed; the session has been logged out.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Box<AuthError>),

    /// The token set has no access token.
    #[error("Access token is missing")]
    MissingAccessToken,

    /// The token set has no refresh token.
    #[error("Refresh token is missing")]
    MissingRefreshToken,

    /// No token set is held by the session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The platform authorization flow failed.
    #[error("Authorization flow error: {0}")]
    Flow(String),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Credential cache failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Rejected { status, .. } => Some(*status),
            AuthError::RefreshFailed(inner) => inner.status(),
            AuthError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the caller should send the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NoCachedCredentials(_)
                | AuthError::RefreshFailed(_)
                | AuthError::MissingAccessToken
                | AuthError::MissingRefreshToken
                | AuthError::NotAuthenticated
        )
    }
}
