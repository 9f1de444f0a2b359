use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use serde::Serialize;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://appcenter.intuit.com/connect/oauth2";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";
pub const DEFAULT_REVOKE_URL: &str = "https://developer.api.intuit.com/v2/oauth2/tokens/revoke";
pub const DEFAULT_SCOPE: &str = "com.intuit.quickbooks.accounting";

/// Upper bound for `TOKEN_REFRESH_SKEW_SECS` and `OAUTH_STATE_TTL_SECS`.
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Which QuickBooks cluster the report calls go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn api_base_url(self) -> &'static str {
        match self {
            Environment::Production => "https://quickbooks.api.intuit.com",
            Environment::Sandbox => "https://sandbox-quickbooks.api.intuit.com",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "sandbox" | "development" | "dev" => Ok(Environment::Sandbox),
            other => anyhow::bail!("unknown QBO_ENVIRONMENT '{}' (expected production or sandbox)", other),
        }
    }
}

/// When the access token gets refreshed before a report call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Refresh before every proxied request.
    Always,
    /// Refresh when the locally tracked expiry is close.
    OnExpiry,
    /// Use the stored token; refresh and retry once on a 401.
    OnUnauthorized,
}

impl FromStr for RefreshPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always" => Ok(RefreshPolicy::Always),
            "on_expiry" | "expiry" => Ok(RefreshPolicy::OnExpiry),
            "on_unauthorized" | "on_401" | "unauthorized" => Ok(RefreshPolicy::OnUnauthorized),
            other => anyhow::bail!(
                "unknown TOKEN_REFRESH_POLICY '{}' (expected always, on_expiry or on_unauthorized)",
                other
            ),
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefreshPolicy::Always => "always",
            RefreshPolicy::OnExpiry => "on_expiry",
            RefreshPolicy::OnUnauthorized => "on_unauthorized",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    /// Fallback realm when the callback did not capture one.
    pub realm_id: Option<String>,
    pub environment: Environment,
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub api_base_url: String,
    pub minor_version: u32,
    pub refresh_policy: RefreshPolicy,
    /// Seconds before `expires_at` at which `on_expiry` starts refreshing.
    pub refresh_skew_secs: i64,
    /// Persist tokens to this JSON file instead of process memory.
    pub token_store_path: Option<PathBuf>,
    /// Seed values for an empty token store.
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub validate_state: bool,
    pub state_ttl_secs: u64,
    pub upstream_max_retries: u32,
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Origin the service is reachable at, derived from the redirect URI.
    pub fn public_base_url(&self) -> String {
        self.redirect_uri
            .strip_suffix("/callback")
            .unwrap_or(&self.redirect_uri)
            .to_string()
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{} must be set", key));

        let environment: Environment = parse_or(&get, "QBO_ENVIRONMENT", Environment::Production)?;

        let refresh_skew_secs: i64 = parse_or(&get, "TOKEN_REFRESH_SKEW_SECS", 60)?;
        if !(0..=MAX_WINDOW_SECS as i64).contains(&refresh_skew_secs) {
            anyhow::bail!(
                "TOKEN_REFRESH_SKEW_SECS must be between 0 and {} (got {})",
                MAX_WINDOW_SECS,
                refresh_skew_secs
            );
        }
        let state_ttl_secs: u64 = parse_or(&get, "OAUTH_STATE_TTL_SECS", 600)?;
        if !(1..=MAX_WINDOW_SECS).contains(&state_ttl_secs) {
            anyhow::bail!(
                "OAUTH_STATE_TTL_SECS must be between 1 and {} (got {})",
                MAX_WINDOW_SECS,
                state_ttl_secs
            );
        }

        Ok(Config {
            port: parse_or(&get, "PORT", 10000)?,
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            redirect_uri: required("REDIRECT_URI")?,
            scope: get("QBO_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.into()),
            realm_id: get("REALM_ID"),
            environment,
            authorize_url: get("QBO_AUTHORIZE_URL").unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.into()),
            token_url: get("QBO_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            revoke_url: get("QBO_REVOKE_URL").unwrap_or_else(|| DEFAULT_REVOKE_URL.into()),
            api_base_url: get("QBO_API_BASE_URL")
                .unwrap_or_else(|| environment.api_base_url().into())
                .trim_end_matches('/')
                .to_string(),
            minor_version: parse_or(&get, "QBO_MINOR_VERSION", 65)?,
            refresh_policy: parse_or(&get, "TOKEN_REFRESH_POLICY", RefreshPolicy::Always)?,
            refresh_skew_secs,
            token_store_path: get("TOKEN_STORE_PATH").map(PathBuf::from),
            access_token: get("ACCESS_TOKEN"),
            refresh_token: get("REFRESH_TOKEN"),
            validate_state: parse_bool_or(&get, "OAUTH_VALIDATE_STATE", true)?,
            state_ttl_secs,
            upstream_max_retries: parse_or(&get, "UPSTREAM_MAX_RETRIES", 2)?,
            upstream_timeout_secs: parse_or(&get, "UPSTREAM_TIMEOUT_SECS", 30)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> anyhow::Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("invalid {} '{}': expected true or false", key, v),
        },
        None => Ok(default),
    }
}

/// Load configuration from `.env` (if present) and the process environment.
pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_lookup(|key| std::env::var(key).ok())
}
