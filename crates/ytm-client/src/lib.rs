//! Authorized HTTP access to a YouTrack backend.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ytm_auth::{AuthSession, HttpAuthFlow};
//! use ytm_client::{ApiEndpoints, AuthorizedClient};
//! use ytm_storage::MemoryCredentialCache;
//!
//! # async fn example(config: ytm_config::AppConfig) -> anyhow::Result<()> {
//! let session = Arc::new(AuthSession::new(
//!     config.clone(),
//!     Arc::new(HttpAuthFlow::new(reqwest::Client::new())),
//!     Arc::new(MemoryCredentialCache::new()),
//! ));
//! session.restore().await?;
//!
//! let client = AuthorizedClient::new(session);
//! let me: serde_json::Value = client
//!     .get_json(&ApiEndpoints::from_config(&config).current_user())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod app_config;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod error_message;
pub mod retry;

pub use app_config::{CONFIG_FIELDS, RemoteConfig, fetch_app_config};
pub use client::{
    ApiResponse, AuthorizedClient, MAX_QUERY_LENGTH, RequestAuthorizer, RequestOptions,
    check_query_length,
};
pub use endpoints::{ApiEndpoints, resolve_relative_url, version_at_least};
pub use error::{ClientError, FailedResponse, Result};
pub use error_message::{
    DEFAULT_ERROR_MESSAGE, ErrorPayload, extract_error_message, resolve_error_message,
};
pub use retry::with_refresh_retry;
