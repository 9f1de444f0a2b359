use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The token pair held in the token store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token stops being accepted (usually one hour).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// When the refresh token itself expires (usually ~100 days).
    #[serde(default)]
    pub refresh_expires_at: Option<DateTime<Utc>>,
    /// Realm captured from the authorization callback.
    #[serde(default)]
    pub realm_id: Option<String>,
}

impl OAuthToken {
    /// Token restored from `ACCESS_TOKEN` / `REFRESH_TOKEN` with no known expiry.
    pub fn seeded(access_token: Option<String>, refresh_token: Option<String>) -> Option<Self> {
        if access_token.is_none() && refresh_token.is_none() {
            return None;
        }
        Some(Self {
            access_token: access_token.unwrap_or_default(),
            refresh_token: refresh_token.unwrap_or_default(),
            expires_at: None,
            refresh_expires_at: None,
            realm_id: None,
        })
    }

    /// Build a token from an endpoint reply received at `now`.
    pub fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.unwrap_or_default(),
            expires_at: resp.expires_in.and_then(|s| expiry_after(now, s)),
            refresh_expires_at: resp.x_refresh_token_expires_in.and_then(|s| expiry_after(now, s)),
            realm_id: None,
        }
    }

    /// Replace this token with a refresh reply. A reply without a new
    /// refresh token keeps the old one, and the realm always carries over.
    pub fn refreshed(&self, resp: TokenResponse, now: DateTime<Utc>) -> Self {
        let mut next = Self::from_response(resp, now);
        if next.refresh_token.is_empty() {
            next.refresh_token = self.refresh_token.clone();
            next.refresh_expires_at = next.refresh_expires_at.or(self.refresh_expires_at);
        }
        next.realm_id = self.realm_id.clone();
        next
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// A refreshable token whose lifetime was never learned, e.g. one seeded
    /// from the environment. Refreshing it once records the real expiry.
    pub fn expiry_unknown(&self) -> bool {
        self.expires_at.is_none() && self.has_refresh_token()
    }

    /// True when the access token is missing or expires within `skew`.
    /// An unknown expiry is trusted until the API says otherwise.
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at {
            Some(at) => at - skew <= now,
            None => false,
        }
    }
}

/// `now + secs`, or `None` when the lifetime is out of range.
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
}

/// Reply body of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub x_refresh_token_expires_in: Option<i64>,
}
