//! Status command - shows the active account and session state.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use ytm_auth::{AuthSession, AuthState};

use super::Context;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Skip verifying the session with the server
    #[arg(long)]
    pub offline: bool,
}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    backend_url: Option<String>,
    version: Option<String>,
    user: Option<String>,
    state: String,
    other_accounts: Vec<String>,
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let storage = ctx.storage().await?;
    let state = storage.state();

    let mut error = None;
    let session_state = match state.config.as_ref() {
        None => AuthState::LoggedOut,
        Some(_) if args.offline => AuthState::LoggedOut,
        Some(_) => {
            let http = ctx.http()?;
            let session =
                AuthSession::from_storage(&storage, ctx.flow(http.clone()), ctx.credentials()?)?
                    .with_http(http);
            if let Err(e) = session.restore().await {
                error = Some(e.to_string());
            }
            session.state()
        }
    };

    let output = StatusOutput {
        backend_url: state.config.as_ref().map(|_| state.backend_url().to_string()),
        version: state
            .config
            .as_ref()
            .map(|c| c.version.clone())
            .filter(|v| !v.is_empty()),
        user: state
            .current_user
            .as_ref()
            .and_then(|u| u.name.clone().or_else(|| u.login.clone())),
        state: if args.offline && state.config.is_some() {
            "unknown".to_string()
        } else {
            session_state.to_string()
        },
        other_accounts: state
            .other_accounts
            .iter()
            .map(|a| a.backend_url().to_string())
            .collect(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("ytm Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    let Some(backend) = &output.backend_url else {
        println!("  {} {}", dim.apply_to("Status:"), style("● not logged in").red());
        println!();
        println!("  {}", dim.apply_to("Log in with: ytm login <url>"));
        println!();
        return Ok(());
    };

    let status = match session_state {
        AuthState::Authenticated => style(format!("● {}", output.state)).green(),
        _ if args.offline => style(format!("● {}", output.state)).yellow(),
        _ => style(format!("● {}", output.state)).red(),
    };
    println!("  {} {}", dim.apply_to("Status:"), status);
    println!("  {} {}", dim.apply_to("Server:"), backend);
    if let Some(version) = &output.version {
        println!("  {} {}", dim.apply_to("Version:"), version);
    }
    if let Some(user) = &output.user {
        println!("  {} {}", dim.apply_to("User:"), user);
    }
    if !output.other_accounts.is_empty() {
        println!(
            "  {} {}",
            dim.apply_to("Other accounts:"),
            output.other_accounts.join(", ")
        );
    }

    if let Some(error) = error
        && ctx.verbose
    {
        println!();
        println!("  {} {}", dim.apply_to("Error:"), error);
    }
    println!();

    Ok(())
}
