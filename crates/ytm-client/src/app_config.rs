//! Backend configuration discovery.

use serde::Deserialize;
use ytm_config::{AppConfig, AuthConfig, remove_trailing_slash};

use crate::endpoints::resolve_relative_url;
use crate::error::{ClientError, FailedResponse, Result};

/// Fields requested from `/api/config`.
pub const CONFIG_FIELDS: &str =
    "ring(url,serviceId),mobile(serviceSecret,serviceId),version,statisticsEnabled";

/// Hub's own service id, always part of the requested scope.
const HUB_SERVICE_ID: &str = "0-0-0-0-0";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RingConfig {
    #[serde(default)]
    url: String,
    #[serde(default)]
    service_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileConfig {
    #[serde(default)]
    service_id: Option<String>,
    #[serde(default)]
    service_secret: Option<String>,
}

/// Body of `GET /api/config`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    ring: RingConfig,
    #[serde(default)]
    mobile: Option<MobileConfig>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    statistics_enabled: bool,
}

impl RemoteConfig {
    /// Build the client configuration for `backend_url`.
    ///
    /// Fails when the server has no mobile client registered.
    pub fn into_app_config(self, backend_url: &str, landing_url: &str) -> Result<AppConfig> {
        let backend_url = remove_trailing_slash(backend_url);
        let mobile = self.mobile.unwrap_or_default();
        let client_id = mobile
            .service_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ClientError::IncompatibleServer(format!(
                    "{} has no mobile application service configured",
                    backend_url
                ))
            })?;

        let auth = AuthConfig {
            server_uri: resolve_relative_url(backend_url, &self.ring.url),
            client_id,
            client_secret: mobile.service_secret.filter(|s| !s.is_empty()),
            scopes: format!("{} {}", HUB_SERVICE_ID, self.ring.service_id)
                .trim()
                .to_string(),
            session_cookie: None,
            landing_url: landing_url.to_string(),
            youtrack_service_id: self.ring.service_id,
        };

        let mut config = AppConfig::new(backend_url, auth);
        config.statistics_enabled = self.statistics_enabled;
        if let Some(version) = self.version {
            config = config.with_version(version);
        }
        Ok(config)
    }
}

/// Discover the configuration of a backend. No authorization is needed.
pub async fn fetch_app_config(
    http: &reqwest::Client,
    backend_url: &str,
    landing_url: &str,
) -> Result<AppConfig> {
    let base = remove_trailing_slash(backend_url);
    let url = url::Url::parse_with_params(
        &format!("{}/api/config", base),
        &[("fields", CONFIG_FIELDS)],
    )?;
    tracing::info!(backend = base, "loading backend config");

    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        let failed = FailedResponse::read(response).await;
        tracing::warn!(status = failed.status, backend = base, "backend config request failed");
        return Err(ClientError::HttpStatus(Box::new(failed)));
    }

    let text = response.text().await?;
    let remote: RemoteConfig = serde_json::from_str(&text).map_err(|e| {
        ClientError::IncompatibleServer(format!("{} did not return a YouTrack config: {}", base, e))
    })?;
    remote.into_app_config(base, landing_url)
}
