//! Notify command - route an opened push notification.

use anyhow::Result;
use clap::Args;
use console::style;
use ytm_auth::{NotificationRoute, PushNotification, route_notification};
use ytm_client::ApiEndpoints;

use super::Context;

/// Arguments for the notify command.
#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Notification payload as JSON (`{"title":..,"ytIssueId":..,"backendUrl":..}`)
    #[arg(long, conflicts_with_all = ["title", "issue_id", "backend_url"])]
    pub payload: Option<String>,

    /// Notification title (silent notifications have none)
    #[arg(long)]
    pub title: Option<String>,

    /// Issue the notification is about
    #[arg(long)]
    pub issue_id: Option<String>,

    /// Backend the notification came from
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Only print the decision, do not switch accounts
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the notify command.
pub async fn run(args: NotifyArgs, ctx: &Context) -> Result<()> {
    let notification = match &args.payload {
        Some(payload) => serde_json::from_str(payload)
            .map_err(|e| anyhow::anyhow!("Invalid notification payload: {}", e))?,
        None => PushNotification {
            title: args.title,
            issue_id: args.issue_id,
            backend_url: args.backend_url,
        },
    };

    let storage = ctx.storage().await?;
    let route = route_notification(&storage, &notification);

    let issue_url = match &route {
        NotificationRoute::Ignore => None,
        NotificationRoute::OpenIssue { issue_id } => storage
            .config()
            .map(|c| ApiEndpoints::from_config(&c).issue(issue_id)),
        NotificationRoute::SwitchAccount { account, issue_id } => {
            if !args.dry_run {
                storage.switch_account(account).await?;
            }
            account
                .config
                .as_ref()
                .map(|c| ApiEndpoints::from_config(c).issue(issue_id))
        }
    };

    if ctx.json_output {
        let output = match &route {
            NotificationRoute::Ignore => serde_json::json!({"route": "ignore"}),
            NotificationRoute::OpenIssue { issue_id } => serde_json::json!({
                "route": "openIssue",
                "issueId": issue_id,
                "url": issue_url,
            }),
            NotificationRoute::SwitchAccount { account, issue_id } => serde_json::json!({
                "route": "switchAccount",
                "backendUrl": account.backend_url(),
                "issueId": issue_id,
                "url": issue_url,
                "switched": !args.dry_run,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match route {
        NotificationRoute::Ignore => println!("Nothing to open."),
        NotificationRoute::OpenIssue { issue_id } => {
            println!("Open {}", style(&issue_id).bold());
        }
        NotificationRoute::SwitchAccount { account, issue_id } => {
            let verb = if args.dry_run { "Would switch" } else { "Switched" };
            println!(
                "{} to {}, open {}",
                verb,
                style(account.backend_url()).bold(),
                style(&issue_id).bold()
            );
        }
    }
    if let Some(url) = issue_url {
        println!("  {}", url);
    }

    Ok(())
}
