//! Token endpoint requests.

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::error::{AuthError, Result};
use crate::params::AuthParams;

/// Content type of token endpoint requests.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `Basic base64(client_id:client_secret)`.
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, client_secret))
    )
}

/// Build a form body, percent-encoding every value.
///
/// Spaces encode as `%20`, not `+`.
pub fn form_body(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// POST a form to a token endpoint with client Basic auth.
pub async fn request_token(
    http: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    client_secret: &str,
    body: String,
) -> Result<AuthParams> {
    let response = http
        .post(endpoint)
        .header(AUTHORIZATION, basic_auth_header(client_id, client_secret))
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), endpoint, "token request rejected");
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            body: text,
        });
    }

    AuthParams::from_token_response(&text)
}
