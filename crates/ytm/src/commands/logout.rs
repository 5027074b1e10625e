//! Logout command - forget the active account.

use anyhow::Result;
use clap::Args;
use console::style;
use ytm_auth::AuthSession;
use ytm_storage::CredentialCache;

use super::Context;

/// Arguments for the logout command.
#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Forget every logged-in account
    #[arg(long)]
    pub all: bool,
}

/// Run the logout command.
pub async fn run(args: LogoutArgs, ctx: &Context) -> Result<()> {
    let storage = ctx.storage().await?;
    if storage.config().is_none() {
        println!("Not logged in.");
        return Ok(());
    }

    let http = ctx.http()?;
    let credentials = ctx.credentials()?;

    if args.all {
        for account in storage.other_accounts() {
            if let Some(key) = &account.auth_params_key {
                credentials.remove(key).await?;
            }
        }
    }

    let session = AuthSession::from_storage(&storage, ctx.flow(http), credentials)?;
    session.logout().await?;
    let backend = session.config().normalized_backend_url().to_string();

    let next = if args.all {
        storage.clear().await?;
        None
    } else {
        storage.remove_active_account().await?
    };

    if ctx.json_output {
        let output = serde_json::json!({
            "loggedOut": backend,
            "active": next.as_ref().map(|s| s.backend_url().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Logged out of {}", style(&backend).bold());
    match next {
        Some(state) => println!("Active account is now {}", style(state.backend_url()).bold()),
        None if args.all => println!("All accounts removed."),
        None => println!("No other accounts."),
    }

    Ok(())
}
