//! URLs of the backend's REST API.

use ytm_config::{AppConfig, remove_trailing_slash};

/// First server version serving users under `/api/users`.
const ACTUAL_USERS_API: (u32, u32) = (2022, 3);

/// Whether `version` (`"2022.3.12345"`, `"2023.1"`) is at least `major.minor`.
///
/// Unparseable versions count as older.
pub fn version_at_least(version: &str, major: u32, minor: u32) -> bool {
    let mut parts = version.trim().split('.').map(|p| p.parse::<u32>());
    match (parts.next(), parts.next()) {
        (Some(Ok(v_major)), Some(Ok(v_minor))) => (v_major, v_minor) >= (major, minor),
        (Some(Ok(v_major)), None) => v_major > major || (v_major == major && minor == 0),
        _ => false,
    }
}

/// Prefix root-relative URLs (avatars, attachments) with the backend URL.
pub fn resolve_relative_url(backend_url: &str, url: &str) -> String {
    if url.starts_with('/') && !url.starts_with("//") {
        format!("{}{}", remove_trailing_slash(backend_url), url)
    } else {
        url.to_string()
    }
}

/// API entry points of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    backend_url: String,
    actual_api: bool,
}

impl ApiEndpoints {
    pub fn new(backend_url: &str, version: &str) -> Self {
        Self {
            backend_url: remove_trailing_slash(backend_url).to_string(),
            actual_api: version_at_least(version, ACTUAL_USERS_API.0, ACTUAL_USERS_API.1),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.backend_url, &config.version)
    }

    /// Normalized backend URL.
    pub fn youtrack_url(&self) -> &str {
        &self.backend_url
    }

    /// Whether the server has the current (non-admin) users API.
    pub fn is_actual_api(&self) -> bool {
        self.actual_api
    }

    pub fn issues(&self) -> String {
        format!("{}/api/issues", self.backend_url)
    }

    pub fn issue(&self, issue_id: &str) -> String {
        format!("{}/{}", self.issues(), issue_id)
    }

    pub fn users_api(&self) -> String {
        if self.actual_api {
            format!("{}/api/users", self.backend_url)
        } else {
            format!("{}/api/admin/users", self.backend_url)
        }
    }

    pub fn current_user(&self) -> String {
        format!("{}/me", self.users_api())
    }

    pub fn drafts(&self) -> String {
        format!("{}/me/drafts", self.users_api())
    }

    pub fn projects(&self) -> String {
        format!("{}/api/admin/projects", self.backend_url)
    }

    /// See [`resolve_relative_url`].
    pub fn resolve(&self, url: &str) -> String {
        resolve_relative_url(&self.backend_url, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "http://foo.bar";

    #[test]
    fn test_version_at_least() {
        assert!(version_at_least("2022.3", 2022, 3));
        assert!(version_at_least("2022.3.1234", 2022, 3));
        assert!(version_at_least("2023.1", 2022, 3));
        assert!(!version_at_least("2022.2", 2022, 3));
        assert!(!version_at_least("2021.3", 2022, 3));
        assert!(version_at_least("2023", 2022, 3));
        assert!(!version_at_least("", 2022, 3));
        assert!(!version_at_least("dev", 2022, 3));
    }

    #[test]
    fn test_actual_api_endpoints() {
        for version in ["2022.3", "2023.1"] {
            let api = ApiEndpoints::new(SERVER, version);
            assert!(api.is_actual_api());
            assert_eq!(api.users_api(), "http://foo.bar/api/users");
            assert_eq!(api.drafts(), "http://foo.bar/api/users/me/drafts");
            assert_eq!(api.current_user(), "http://foo.bar/api/users/me");
            assert_eq!(api.projects(), "http://foo.bar/api/admin/projects");
        }
    }

    #[test]
    fn test_legacy_api_endpoints() {
        for version in ["2022.2", "2021.3", ""] {
            let api = ApiEndpoints::new(SERVER, version);
            assert!(!api.is_actual_api());
            assert_eq!(api.users_api(), "http://foo.bar/api/admin/users");
            assert_eq!(api.drafts(), "http://foo.bar/api/admin/users/me/drafts");
            assert_eq!(api.current_user(), "http://foo.bar/api/admin/users/me");
            assert_eq!(api.projects(), "http://foo.bar/api/admin/projects");
        }
    }

    #[test]
    fn test_issue_urls() {
        let api = ApiEndpoints::new("http://foo.bar/", "2023.1");
        assert_eq!(api.youtrack_url(), SERVER);
        assert_eq!(api.issues(), "http://foo.bar/api/issues");
        assert_eq!(api.issue("test-id"), "http://foo.bar/api/issues/test-id");
    }

    #[test]
    fn test_resolve_relative_url() {
        assert_eq!(
            resolve_relative_url(SERVER, "/hub/users/123"),
            "http://foo.bar/hub/users/123"
        );
        assert_eq!(
            resolve_relative_url("http://foo.bar/", "/persistent/123"),
            "http://foo.bar/persistent/123"
        );
        assert_eq!(
            resolve_relative_url(SERVER, "http://cdn.bar/a.png"),
            "http://cdn.bar/a.png"
        );
        assert_eq!(
            resolve_relative_url(SERVER, "//cdn.bar/a.png"),
            "//cdn.bar/a.png"
        );
    }
}
