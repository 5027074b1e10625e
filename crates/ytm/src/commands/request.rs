//! Request command - authorized HTTP request to the active account.

use anyhow::Result;
use clap::Args;
use reqwest::Method;
use serde_json::Value;
use ytm_client::{
    ApiEndpoints, ApiResponse, AuthorizedClient, RequestOptions, resolve_error_message,
};

use super::Context;

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Absolute URL, or a path relative to the server (`/api/issues?fields=id`)
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Print the body as-is instead of parsing JSON
    #[arg(long)]
    pub raw: bool,
}

/// Run the request command.
pub async fn run(args: RequestArgs, ctx: &Context) -> Result<()> {
    let method: Method = args
        .method
        .to_uppercase()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid HTTP method: {}", args.method))?;
    let body: Option<Value> = args
        .data
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Request body is not valid JSON: {}", e))?;

    let storage = ctx.storage().await?;
    let session = ctx.active_session(&storage).await?;
    let endpoints = ApiEndpoints::from_config(session.config());
    let url = endpoints.resolve(&args.url);

    let client = AuthorizedClient::new(session).with_http(ctx.http()?);
    let options = if args.raw {
        RequestOptions::raw()
    } else {
        RequestOptions::default()
    };

    let response = match client
        .make_authorized_request(&url, Some(method), body.as_ref(), options)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            if ctx.verbose
                && let Some(failed) = e.failed_response()
            {
                eprintln!("{} {}", failed.status, failed.url);
            }
            anyhow::bail!("{}", resolve_error_message(&e, false));
        }
    };

    match response {
        ApiResponse::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        ApiResponse::Raw(response) => println!("{}", response.text().await?),
    }

    Ok(())
}
