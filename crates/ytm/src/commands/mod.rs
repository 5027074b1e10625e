//! CLI command handlers.

pub mod accounts;
pub mod config;
pub mod login;
pub mod logout;
pub mod notify;
pub mod request;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use ytm_auth::{AuthSession, HttpAuthFlow, SharedAuthFlow};
use ytm_config::ClientSettings;
use ytm_storage::{EncryptedFileCache, FileStateStore, SharedCredentialCache, Storage};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// YouTrack URL given on the command line.
    pub server_url: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Where settings, state and credentials live.
    pub config_dir: PathBuf,
    pub settings: ClientSettings,
}

impl Context {
    /// HTTP client honoring the configured timeout.
    pub fn http(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.settings.timeout())
            .user_agent(format!("ytm/{}", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    /// Load the persisted account state.
    pub async fn storage(&self) -> Result<Storage> {
        let path = self.settings.state_path(&self.config_dir);
        Storage::init(Arc::new(FileStateStore::new(&path)))
            .await
            .with_context(|| format!("Failed to load state from {}", path.display()))
    }

    /// Open the encrypted credential cache.
    pub fn credentials(&self) -> Result<SharedCredentialCache> {
        let dir = self.settings.credentials_dir(&self.config_dir);
        let cache = EncryptedFileCache::open(&dir)
            .with_context(|| format!("Failed to open credentials in {}", dir.display()))?;
        Ok(Arc::new(cache))
    }

    /// Auth flow that asks the user for authorization codes on the terminal.
    pub fn flow(&self, http: reqwest::Client) -> SharedAuthFlow {
        Arc::new(HttpAuthFlow::new(http).with_code_source(Arc::new(login::TerminalCodeSource)))
    }

    /// Session of the active account, restored from the credential cache.
    pub async fn active_session(&self, storage: &Storage) -> Result<Arc<AuthSession>> {
        if storage.config().is_none() {
            anyhow::bail!("Not logged in. Run 'ytm login' first.");
        }

        let http = self.http()?;
        let session =
            AuthSession::from_storage(storage, self.flow(http.clone()), self.credentials()?)?
                .with_http(http);

        match session.restore().await {
            Ok(user) => {
                tracing::debug!(user = %user, "session restored");
                Ok(Arc::new(session))
            }
            Err(e) if e.requires_login() => Err(anyhow::anyhow!(
                "Session expired ({}). Run 'ytm login' again.",
                e
            )),
            Err(e) => Err(e.into()),
        }
    }
}
