use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TokenStore;
use crate::oauth::OAuthToken;

/// Token slot held in process memory. Lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    slot: RwLock<Option<OAuthToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<Option<OAuthToken>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, token: &OAuthToken) -> anyhow::Result<()> {
        *self.slot.write().await = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.slot.write().await.take();
        Ok(())
    }
}
