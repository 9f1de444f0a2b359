//! qbo-gateway: OAuth2 connector and report proxy for QuickBooks Online.
//!
//! Library crate shared by the binary and the integration tests in `tests/`.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod oauth;
pub mod proxy;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use config::Config;
use oauth::{OAuthClient, StateStore, TokenManager};
use proxy::AccountingClient;
use store::TokenStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: Config,
    pub oauth: OAuthClient,
    pub states: StateStore,
    pub tokens: TokenManager,
    pub accounting: AccountingClient,
}

impl AppState {
    /// Open the configured token store and wire up the clients.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = store::open(&config).await?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        let oauth = OAuthClient::new(&config).context("building OAuth client")?;
        let accounting = AccountingClient::new(&config).context("building accounting client")?;
        let tokens = TokenManager::new(
            oauth.clone(),
            store,
            config.refresh_policy,
            config.refresh_skew_secs,
        );

        Ok(Self {
            states: StateStore::new(Duration::from_secs(config.state_ttl_secs)),
            oauth,
            tokens,
            accounting,
            config,
        })
    }
}
