use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{OAuthClient, OAuthError, OAuthToken};
use crate::config::RefreshPolicy;
use crate::store::TokenStore;

/// Owns the token lifecycle: stores the pair obtained on callback and hands
/// out access tokens, refreshing them according to the configured policy.
///
/// All writes to the store go through `write_lock`, so concurrent refreshes
/// never race on a rotating refresh token.
pub struct TokenManager {
    oauth: OAuthClient,
    store: Arc<dyn TokenStore>,
    policy: RefreshPolicy,
    skew: Duration,
    write_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        oauth: OAuthClient,
        store: Arc<dyn TokenStore>,
        policy: RefreshPolicy,
        skew_secs: i64,
    ) -> Self {
        Self {
            oauth,
            store,
            policy,
            skew: Duration::try_seconds(skew_secs).unwrap_or_else(Duration::zero),
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Whether a 401 from the API should trigger one refresh-and-retry.
    pub fn retries_on_unauthorized(&self) -> bool {
        self.policy == RefreshPolicy::OnUnauthorized
    }

    pub async fn current(&self) -> Result<Option<OAuthToken>, OAuthError> {
        Ok(self.store.load().await?)
    }

    /// Redeem the callback's code and store the resulting pair with the realm.
    pub async fn complete_authorization(
        &self,
        code: &str,
        realm_id: Option<String>,
    ) -> Result<OAuthToken, OAuthError> {
        let _guard = self.write_lock.lock().await;
        let mut token = self.oauth.exchange_code(code).await?;
        token.realm_id = realm_id;
        self.store.save(&token).await?;
        info!(
            realm_id = ?token.realm_id,
            expires_at = ?token.expires_at,
            "QuickBooks connected"
        );
        Ok(token)
    }

    /// Token to use for the next API call, refreshed first if the policy says so.
    pub async fn access_token(&self) -> Result<OAuthToken, OAuthError> {
        let token = self.current().await?.ok_or(OAuthError::NotConnected)?;
        let refresh = match self.policy {
            RefreshPolicy::Always => true,
            RefreshPolicy::OnExpiry => self.due(&token),
            RefreshPolicy::OnUnauthorized => token.access_token.is_empty(),
        };
        if !refresh {
            return Ok(token);
        }

        let _guard = self.write_lock.lock().await;
        let latest = self.current().await?.ok_or(OAuthError::NotConnected)?;
        // Another request may have refreshed while we waited on the lock.
        if self.policy != RefreshPolicy::Always
            && latest.access_token != token.access_token
            && !self.due(&latest)
        {
            debug!("Access token already refreshed by a concurrent request");
            return Ok(latest);
        }
        self.refresh_locked(&latest).await
    }

    /// Unconditionally refresh the stored pair.
    pub async fn refresh(&self) -> Result<OAuthToken, OAuthError> {
        let _guard = self.write_lock.lock().await;
        let current = self.current().await?.ok_or(OAuthError::NotConnected)?;
        self.refresh_locked(&current).await
    }

    /// Refresh after the API rejected `stale_access`, unless a concurrent
    /// request already replaced it.
    pub async fn refresh_after_unauthorized(
        &self,
        stale_access: &str,
    ) -> Result<OAuthToken, OAuthError> {
        let _guard = self.write_lock.lock().await;
        let current = self.current().await?.ok_or(OAuthError::NotConnected)?;
        if !current.access_token.is_empty() && current.access_token != stale_access {
            debug!("Access token already refreshed by a concurrent request");
            return Ok(current);
        }
        warn!("Upstream returned 401, refreshing access token");
        self.refresh_locked(&current).await
    }

    /// Revoke the stored refresh token upstream (best effort) and clear the store.
    pub async fn disconnect(&self) -> Result<Option<OAuthToken>, OAuthError> {
        let _guard = self.write_lock.lock().await;
        let current = self.current().await?;
        if let Some(token) = &current {
            let target = if token.has_refresh_token() {
                token.refresh_token.as_str()
            } else {
                token.access_token.as_str()
            };
            if !target.is_empty() {
                if let Err(e) = self.oauth.revoke(target).await {
                    warn!(error = %e, "Token revocation failed; clearing local token anyway");
                }
            }
        }
        self.store.clear().await?;
        info!(realm_id = ?current.as_ref().and_then(|t| t.realm_id.as_ref()), "QuickBooks disconnected");
        Ok(current)
    }

    /// `on_expiry` check. A refreshable token with no recorded expiry is due,
    /// since this policy never retries on a 401.
    fn due(&self, token: &OAuthToken) -> bool {
        token.needs_refresh(Utc::now(), self.skew) || token.expiry_unknown()
    }

    async fn refresh_locked(&self, current: &OAuthToken) -> Result<OAuthToken, OAuthError> {
        let next = match self.oauth.refresh(current).await {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, policy = %self.policy, "Error refreshing access token");
                return Err(e);
            }
        };
        self.store.save(&next).await?;
        info!(
            policy = %self.policy,
            expires_at = ?next.expires_at,
            "Access token refreshed successfully"
        );
        Ok(next)
    }
}
