//! OAuth2 session lifecycle for a YouTrack backend.
//!
//! # Components
//!
//! - [`session`]: token acquisition, verification, caching and refresh
//! - [`flow`]: the authorization-code/refresh seam and its HTTP implementation
//! - [`token`]: token endpoint requests (Basic client auth, form bodies)
//! - [`params`]: the cached [`AuthParams`] bundle
//! - [`accounts`]: which known account an external event refers to

pub mod accounts;
pub mod error;
pub mod flow;
pub mod params;
pub mod session;
pub mod token;

pub use accounts::{
    NotificationRoute, PushNotification, find_target_account, resolve_target_account,
    route_notification,
};
pub use error::{AuthError, Result};
pub use flow::{
    AuthFlow, AuthorizationCodeSource, HttpAuthFlow, OAuthFlowConfig, OAuthFlowResult,
    PkceChallenge, ServiceConfiguration, SharedAuthFlow, build_authorization_url, generate_state,
    parse_redirect,
};
pub use params::AuthParams;
pub use session::{AuthSession, AuthState, CURRENT_USER_FIELDS, SharedAuthSession};
