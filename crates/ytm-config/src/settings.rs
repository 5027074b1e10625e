//! Client settings file.
//!
//! Local settings for the client itself (not per backend):
//!
//! ```yaml
//! default-backend: https://youtrack.example
//! timeout: 30
//! landing-url: ytoauth://landing.url
//! data-dir: ~/.local/share/ytm
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default redirect URL registered for the mobile OAuth client.
pub const DEFAULT_LANDING_URL: &str = "ytoauth://landing.url";

/// Name of the persisted storage state file inside the data dir.
pub const STATE_FILE: &str = "state.json";

/// Name of the credential directory inside the data dir.
pub const CREDENTIALS_DIR: &str = "credentials";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientSettings {
    /// Backend used when a command does not name one.
    pub default_backend: Option<String>,

    /// Transport timeout in seconds.
    pub timeout: u64,

    /// Redirect URL for the authorization-code flow.
    pub landing_url: String,

    /// Override for the data directory (state + credentials).
    pub data_dir: Option<PathBuf>,

    /// Override for the log directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_backend: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            landing_url: DEFAULT_LANDING_URL.to_string(),
            data_dir: None,
            log_dir: None,
        }
    }
}

impl ClientSettings {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Effective data directory, defaulting to the config directory.
    pub fn effective_data_dir(&self, config_dir: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| config_dir.to_path_buf())
    }

    /// Effective log directory, defaulting to `<config dir>/logs`.
    pub fn effective_log_dir(&self, config_dir: &Path) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("logs"))
    }

    /// Path of the persisted storage state.
    pub fn state_path(&self, config_dir: &Path) -> PathBuf {
        self.effective_data_dir(config_dir).join(STATE_FILE)
    }

    /// Directory holding encrypted credentials.
    pub fn credentials_dir(&self, config_dir: &Path) -> PathBuf {
        self.effective_data_dir(config_dir).join(CREDENTIALS_DIR)
    }
}
