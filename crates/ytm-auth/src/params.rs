//! The OAuth token bundle.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Token set granted by the identity provider.
///
/// Serialized with the token endpoint's own field names so the cached JSON
/// matches what the server returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: String,

    #[serde(default)]
    pub token_type: String,

    /// RFC 3339 expiry of the access token.
    #[serde(
        rename = "accessTokenExpirationDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token_expiration_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Lifetime in seconds, as returned by the token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Set when the tokens came from the in-app credentials form.
    #[serde(rename = "inAppLogin", default, skip_serializing_if = "Option::is_none")]
    pub in_app_login: Option<bool>,
}

impl AuthParams {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: token_type.into(),
            ..Default::default()
        }
    }

    /// Parse a token endpoint response.
    ///
    /// Fills `accessTokenExpirationDate` from `expires_in` when the server
    /// only sends the lifetime.
    pub fn from_token_response(body: &str) -> Result<Self> {
        let mut params: AuthParams = serde_json::from_str(body).map_err(|e| {
            AuthError::Serialization(format!("Failed to parse token response: {}", e))
        })?;

        if params.access_token_expiration_date.is_none()
            && let Some(expires_in) = params.expires_in
        {
            params.access_token_expiration_date =
                expiry_after(expires_in).map(|at| at.to_rfc3339());
            if params.access_token_expiration_date.is_none() {
                tracing::warn!(expires_in, "token lifetime out of range, expiry unknown");
            }
        }

        Ok(params)
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Value of the `Authorization` header: `<token_type> <access_token>`.
    ///
    /// Fails when there is no access token.
    pub fn authorization_value(&self) -> Result<String> {
        if !self.has_access_token() {
            return Err(AuthError::MissingAccessToken);
        }
        Ok(format!("{} {}", self.token_type, self.access_token))
    }

    /// Parsed expiry, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_token_expiration_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whether the access token is known to be expired at `now`.
    ///
    /// Unknown expiry counts as not expired; the server's 401 is the
    /// authoritative signal.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }
}

/// `now + seconds`, or `None` when it does not fit a timestamp.
fn expiry_after(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    Utc::now().checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_value() {
        let params = AuthParams::new("fake-access-token", "fake-refresh-token", "bearer");
        assert_eq!(
            params.authorization_value().unwrap(),
            "bearer fake-access-token"
        );
    }

    #[test]
    fn test_authorization_value_requires_access_token() {
        let params = AuthParams::new("", "refresh", "bearer");
        assert!(matches!(
            params.authorization_value(),
            Err(AuthError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_from_token_response_fills_expiry() {
        let params = AuthParams::from_token_response(
            r#"{"access_token":"a","refresh_token":"r","token_type":"Bearer","expires_in":3600,"scope":"s"}"#,
        )
        .unwrap();
        assert_eq!(params.access_token, "a");
        assert_eq!(params.scope.as_deref(), Some("s"));

        let expires_at = params.expires_at().unwrap();
        assert!(expires_at > Utc::now() + TimeDelta::minutes(59));
        assert!(!params.is_expired_at(Utc::now()));
        assert!(params.is_expired_at(Utc::now() + TimeDelta::hours(2)));
    }

    #[test]
    fn test_from_token_response_out_of_range_lifetime() {
        let params = AuthParams::from_token_response(
            r#"{"access_token":"a","token_type":"bearer","expires_in":10000000000000}"#,
        )
        .unwrap();
        assert_eq!(params.expires_in, Some(10_000_000_000_000));
        assert!(params.access_token_expiration_date.is_none());
        assert!(!params.is_expired_at(Utc::now()));

        let params = AuthParams::from_token_response(
            r#"{"access_token":"a","token_type":"bearer","expires_in":18446744073709551615}"#,
        )
        .unwrap();
        assert!(params.access_token_expiration_date.is_none());
        assert!(!params.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_from_token_response_without_access_token() {
        let params = AuthParams::from_token_response(r#"{"error_code":"bad"}"#).unwrap();
        assert!(!params.has_access_token());
        assert_eq!(params.error_code.as_deref(), Some("bad"));
    }

    #[test]
    fn test_from_token_response_invalid_json() {
        assert!(matches!(
            AuthParams::from_token_response("<html>"),
            Err(AuthError::Serialization(_))
        ));
    }

    #[test]
    fn test_serialized_field_names() {
        let params = AuthParams {
            access_token_expiration_date: Some("2030-01-01T00:00:00Z".to_string()),
            in_app_login: Some(true),
            ..AuthParams::new("a", "r", "bearer")
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["accessTokenExpirationDate"], "2030-01-01T00:00:00Z");
        assert_eq!(json["inAppLogin"], true);
        assert!(json.get("error_code").is_none());
    }

    #[test]
    fn test_unknown_expiry_is_not_expired() {
        let params = AuthParams::new("a", "r", "bearer");
        assert!(params.expires_at().is_none());
        assert!(!params.is_expired_at(Utc::now()));
    }
}
