//! Config command - client settings management.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective settings
    Show,

    /// Show where settings, state, credentials and logs live
    Path,

    /// Change a setting
    Set {
        /// Server used by `ytm login` when no URL is given
        #[arg(long)]
        default_backend: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// OAuth redirect URL
        #[arg(long)]
        landing_url: Option<String>,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Set {
            default_backend,
            timeout,
            landing_url,
        } => cmd_set(ctx, default_backend, timeout, landing_url),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&ctx.settings)?);
    } else {
        print!("{}", ctx.settings.to_yaml()?);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let dir = &ctx.config_dir;
    let settings = ytm_config::settings_path().unwrap_or_else(|| dir.join("settings.yaml"));
    let paths = [
        ("settings", settings),
        ("state", ctx.settings.state_path(dir)),
        ("credentials", ctx.settings.credentials_dir(dir)),
        ("logs", ctx.settings.effective_log_dir(dir)),
    ];

    if ctx.json_output {
        let output: serde_json::Map<String, serde_json::Value> = paths
            .iter()
            .map(|(name, path)| (name.to_string(), path.display().to_string().into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (name, path) in &paths {
            println!("{:<12} {}", name, path.display());
        }
    }
    Ok(())
}

fn cmd_set(
    ctx: &Context,
    default_backend: Option<String>,
    timeout: Option<u64>,
    landing_url: Option<String>,
) -> Result<()> {
    let mut settings = ctx.settings.clone();
    if let Some(backend) = default_backend {
        settings.default_backend = Some(backend);
    }
    if let Some(timeout) = timeout {
        settings.timeout = timeout;
    }
    if let Some(landing_url) = landing_url {
        settings.landing_url = landing_url;
    }

    ytm_config::save_settings(&settings)?;
    println!("Settings saved.");
    Ok(())
}
