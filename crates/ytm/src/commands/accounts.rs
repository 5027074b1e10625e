//! Accounts command - list, switch and resolve logged-in accounts.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde::Serialize;
use ytm_auth::resolve_target_account;
use ytm_storage::StorageState;

use super::Context;

/// Arguments for the accounts command.
#[derive(Args, Debug)]
pub struct AccountsArgs {
    #[command(subcommand)]
    pub command: AccountsCommand,
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// List logged-in accounts
    List,

    /// Make another logged-in account active
    Switch {
        /// Backend URL of the account
        url: String,
    },

    /// Show which account a backend URL refers to
    Resolve {
        /// Backend URL to resolve
        url: String,
    },
}

#[derive(Debug, Serialize)]
struct AccountRow {
    backend_url: String,
    user: Option<String>,
    active: bool,
}

impl AccountRow {
    fn new(state: &StorageState, active: bool) -> Self {
        Self {
            backend_url: state.backend_url().to_string(),
            user: state
                .current_user
                .as_ref()
                .and_then(|u| u.name.clone().or_else(|| u.login.clone())),
            active,
        }
    }
}

/// Run the accounts command.
pub async fn run(args: AccountsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AccountsCommand::List => cmd_list(ctx).await,
        AccountsCommand::Switch { url } => cmd_switch(&url, ctx).await,
        AccountsCommand::Resolve { url } => cmd_resolve(&url, ctx).await,
    }
}

async fn cmd_list(ctx: &Context) -> Result<()> {
    let storage = ctx.storage().await?;
    let state = storage.state();

    let mut rows = Vec::new();
    if state.config.is_some() {
        rows.push(AccountRow::new(&state, true));
    }
    rows.extend(state.other_accounts.iter().map(|a| AccountRow::new(a, false)));

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No accounts. Log in with: ytm login <url>");
        return Ok(());
    }

    let dim = Style::new().dim();
    for row in rows {
        let marker = if row.active {
            style("●").green()
        } else {
            style("○").dim()
        };
        let user = row.user.unwrap_or_default();
        println!("{} {} {}", marker, row.backend_url, dim.apply_to(user));
    }

    Ok(())
}

async fn cmd_switch(url: &str, ctx: &Context) -> Result<()> {
    let storage = ctx.storage().await?;
    let state = storage.state();

    if state.config.is_some() && state.is_backend(url) {
        println!("{} is already active.", style(state.backend_url()).bold());
        return Ok(());
    }

    let Some(target) = resolve_target_account(&storage, url) else {
        anyhow::bail!("No logged-in account for {}. Log in with: ytm login {}", url, url);
    };

    let active = storage.switch_account(&target).await?;
    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&AccountRow::new(&active, true))?
        );
    } else {
        println!("Switched to {}", style(active.backend_url()).bold());
    }

    Ok(())
}

async fn cmd_resolve(url: &str, ctx: &Context) -> Result<()> {
    let storage = ctx.storage().await?;
    let target = resolve_target_account(&storage, url);

    if ctx.json_output {
        let output = serde_json::json!({
            "switchTo": target.as_ref().map(|t| t.backend_url().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match target {
        Some(account) => println!("Switch to {}", style(account.backend_url()).bold()),
        None => println!("No switch needed"),
    }

    Ok(())
}
