pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::oauth::OAuthToken;

/// Abstraction over the single token slot.
/// Implementations: MemoryStore (process memory), FileStore (JSON file).
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current token pair, if one has been stored.
    async fn load(&self) -> anyhow::Result<Option<OAuthToken>>;

    /// Replace the stored pair.
    async fn save(&self, token: &OAuthToken) -> anyhow::Result<()>;

    /// Forget the stored pair.
    async fn clear(&self) -> anyhow::Result<()>;
}

/// Open the backend selected by `TOKEN_STORE_PATH` and seed it from
/// `ACCESS_TOKEN` / `REFRESH_TOKEN` when it holds nothing yet.
pub async fn open(cfg: &Config) -> anyhow::Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match &cfg.token_store_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using file token store");
            Arc::new(FileStore::new(path.clone()))
        }
        None => {
            tracing::info!("Using in-memory token store; tokens are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if store.load().await?.is_none() {
        if let Some(seed) = OAuthToken::seeded(cfg.access_token.clone(), cfg.refresh_token.clone()) {
            tracing::info!(
                has_access_token = !seed.access_token.is_empty(),
                has_refresh_token = seed.has_refresh_token(),
                "Seeding token store from environment"
            );
            store.save(&seed).await?;
        }
    }

    Ok(store)
}
