//! ytm - YouTrack session and account manager
//!
//! Main entry point for the ytm CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{accounts, config, login, logout, notify, request, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// ytm - YouTrack session and account manager
#[derive(Parser)]
#[command(name = "ytm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// YouTrack URL (default: the active account, then `default-backend`)
    #[arg(long, global = true, env = "YTM_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to a YouTrack server
    Login(login::LoginArgs),

    /// Log out of the active account
    Logout(logout::LogoutArgs),

    /// Show the active account and session state
    Status(status::StatusArgs),

    /// Make an authorized request to the active account
    Request(request::RequestArgs),

    /// List and switch logged-in accounts
    Accounts(accounts::AccountsArgs),

    /// Route a push notification to the right account
    Notify(notify::NotifyArgs),

    /// Client settings
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = ytm_config::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    let settings = ytm_config::load_settings()?;

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "ytm=debug,ytm_auth=debug,ytm_client=debug,ytm_storage=debug,ytm_config=debug,info"
    } else {
        "ytm=info,ytm_auth=info,ytm_client=info,ytm_storage=info,warn"
    };

    let log_dir = settings.effective_log_dir(&config_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ytm.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "ytm=trace,ytm_auth=trace,ytm_client=trace,ytm_storage=trace,ytm_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        server_url: cli.server,
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir,
        settings,
    };

    match cli.command {
        Commands::Login(args) => login::run(args, &ctx).await,
        Commands::Logout(args) => logout::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Request(args) => request::run(args, &ctx).await,
        Commands::Accounts(args) => accounts::run(args, &ctx).await,
        Commands::Notify(args) => notify::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
