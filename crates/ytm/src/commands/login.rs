//! Login command - authenticate against a YouTrack server.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use console::style;
use serde::Serialize;
use ytm_auth::{AuthError, AuthSession, AuthorizationCodeSource};
use ytm_client::{
    ApiEndpoints, AuthorizedClient, ClientError, fetch_app_config, resolve_error_message,
};
use ytm_storage::{CredentialCache, CurrentUser, Storage};

use super::Context;

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// YouTrack URL (overrides --server and `default-backend`)
    pub url: Option<String>,

    /// Username for the password login (prompted when missing)
    #[arg(short, long, conflicts_with = "oauth")]
    pub username: Option<String>,

    /// Log in through the browser (authorization code flow)
    #[arg(long)]
    pub oauth: bool,
}

#[derive(Debug, Serialize)]
struct LoginOutput {
    backend_url: String,
    user: Option<String>,
    auth_params_key: String,
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    let backend = args
        .url
        .or_else(|| ctx.server_url.clone())
        .or_else(|| ctx.settings.default_backend.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No server given. Pass a URL or set `default-backend` in settings.")
        })?;

    let http = ctx.http()?;
    let config = fetch_app_config(&http, &backend, &ctx.settings.landing_url)
        .await
        .map_err(|e| anyhow::anyhow!("{}", resolve_error_message(&e, false)))?;

    let storage = ctx.storage().await?;
    let credentials = ctx.credentials()?;
    let key = chrono::Utc::now().timestamp_millis().to_string();

    let session = AuthSession::new(config.clone(), ctx.flow(http.clone()), credentials.clone())
        .with_http(http.clone())
        .with_auth_params_key(key.clone());

    let login = if args.oauth {
        session.login_with_oauth_code().await
    } else {
        let username = match args.username {
            Some(username) => username,
            None => prompt("Username: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        session.login_with_credentials(&username, &password).await
    };

    let hub_user = match login {
        Ok(user) => user,
        Err(e @ AuthError::Rejected { .. }) => {
            anyhow::bail!("{}", resolve_error_message(&ClientError::from(e), true))
        }
        Err(e) => return Err(e.into()),
    };

    forget_replaced_account(&storage, credentials.as_ref(), config.normalized_backend_url())
        .await;
    storage.begin_account(config.clone(), key.clone()).await?;
    storage
        .store_current_user(CurrentUser::from_hub_payload(hub_user))
        .await?;

    let session = Arc::new(session);
    let client = AuthorizedClient::new(session).with_http(http);
    match client
        .get_json(&ApiEndpoints::from_config(&config).current_user())
        .await
    {
        Ok(user) => storage.store_yt_current_user(user).await?,
        Err(e) => tracing::warn!(error = %e, "could not load the YouTrack user"),
    }

    let user = storage.state().current_user.and_then(|u| u.name.or(u.login));
    if ctx.json_output {
        let output = LoginOutput {
            backend_url: config.normalized_backend_url().to_string(),
            user,
            auth_params_key: key,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!(
            "{} Logged in to {}",
            style("✓").green(),
            style(config.normalized_backend_url()).bold()
        );
        if let Some(user) = user {
            println!("  as {}", user);
        }
        println!();
    }

    Ok(())
}

/// Drop the cached tokens of an account that a new login replaces.
async fn forget_replaced_account(
    storage: &Storage,
    credentials: &dyn CredentialCache,
    backend: &str,
) {
    let state = storage.state();
    let replaced = std::iter::once(&state)
        .chain(state.other_accounts.iter())
        .filter(|account| account.is_backend(backend))
        .filter_map(|account| account.auth_params_key.clone());

    for key in replaced {
        if let Err(e) = credentials.remove(&key).await {
            tracing::warn!(key, error = %e, "could not remove replaced credentials");
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Terminal code source
// ─────────────────────────────────────────────────────────────────────────────

/// Shows the authorization URL and reads the redirect URL back from stdin.
#[derive(Debug)]
pub struct TerminalCodeSource;

#[async_trait]
impl AuthorizationCodeSource for TerminalCodeSource {
    async fn receive_code(&self, authorization_url: &str) -> ytm_auth::Result<String> {
        println!();
        println!("Open this URL in your browser:");
        println!();
        println!("  {}", authorization_url);
        println!();
        println!("After logging in, copy the address you were redirected to");
        println!("(or just the code) and paste it here:");
        println!();

        if open_url(authorization_url).is_err() {
            println!("(Could not open browser automatically)");
            println!();
        }

        let input = tokio::task::spawn_blocking(|| prompt("code> "))
            .await
            .map_err(|e| AuthError::Flow(e.to_string()))?
            .map_err(|e| AuthError::Flow(e.to_string()))?;

        if input.is_empty() {
            return Err(AuthError::Flow("No input provided".to_string()));
        }
        Ok(input)
    }
}

/// Try to open a URL in the default browser.
fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).status()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).status()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .status()?;
    }
    Ok(())
}
