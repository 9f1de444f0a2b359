use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::oauth::OAuthToken;
use crate::AppState;

/// qbo-gateway — QuickBooks Online OAuth connector and report proxy
#[derive(Parser)]
#[command(name = "qbo-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to PORT, then 10000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Refresh the stored token pair once and print the new expiry
    Refresh,

    /// Print metadata about the stored token pair
    Status,
}

/// `refresh`: rotate the stored pair once and describe the result.
pub async fn refresh_report(state: &AppState) -> anyhow::Result<String> {
    let token = state
        .tokens
        .refresh()
        .await
        .context("refreshing stored token")?;
    Ok(format!("Token refreshed:\n{}", describe(state, &token)))
}

/// `status`: describe the stored pair without printing token values.
pub async fn status_report(state: &AppState) -> anyhow::Result<String> {
    Ok(match state.tokens.current().await? {
        Some(token) => format!(
            "Connected:\n{}\n  Policy:         {}",
            describe(state, &token),
            state.tokens.policy()
        ),
        None => "Not connected. Visit /connect to authorize.".to_string(),
    })
}

fn describe(state: &AppState, token: &OAuthToken) -> String {
    format!(
        "  Realm:          {}\n  Expires at:     {}\n  Refresh expiry: {}",
        state.accounting.resolve_realm(token).unwrap_or_else(|| "-".into()),
        token.expires_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
        token.refresh_expires_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
    )
}
