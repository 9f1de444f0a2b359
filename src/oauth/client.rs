use std::time::Duration;

use chrono::Utc;
use url::Url;

use super::token::{OAuthToken, TokenResponse};
use super::OAuthError;
use crate::config::Config;

/// Talks to the authorization server: builds the consent URL and calls the
/// token and revoke endpoints with the client's basic-auth credentials.
///
/// Token calls use a plain client with no retry middleware since an
/// authorization code may only be redeemed once.
#[derive(Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    authorize_url: String,
    token_url: String,
    revoke_url: String,
}

impl OAuthClient {
    pub fn new(cfg: &Config) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.upstream_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("qbo-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_uri: cfg.redirect_uri.clone(),
            scope: cfg.scope.clone(),
            authorize_url: cfg.authorize_url.clone(),
            token_url: cfg.token_url.clone(),
            revoke_url: cfg.revoke_url.clone(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Consent page URL the user agent is redirected to.
    pub fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::InvalidUrl(format!("{}: {}", self.authorize_url, e)))
    }

    /// Redeem an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken, OAuthError> {
        let resp = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        Ok(OAuthToken::from_response(resp, Utc::now()))
    }

    /// Trade `current`'s refresh token for a new pair.
    pub async fn refresh(&self, current: &OAuthToken) -> Result<OAuthToken, OAuthError> {
        if !current.has_refresh_token() {
            return Err(OAuthError::MissingRefreshToken);
        }
        let resp = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .await?;
        Ok(current.refreshed(resp, Utc::now()))
    }

    /// Revoke a refresh (or access) token so the connection is dropped upstream.
    pub async fn revoke(&self, token: &str) -> Result<(), OAuthError> {
        let resp = self
            .client
            .post(&self.revoke_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(OAuthError::Rejected { status, body })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected { status, body });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| OAuthError::Malformed(e.to_string()))
    }
}
