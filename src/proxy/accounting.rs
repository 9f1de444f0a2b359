//! Calls against the QuickBooks accounting REST API.
//!
//! Both endpoints are realm-scoped reads. The response body is handed back
//! untouched so callers can return it verbatim.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::upstream::UpstreamClient;
use crate::config::Config;
use crate::oauth::{OAuthError, OAuthToken, TokenManager};

pub const DEFAULT_DATE_MACRO: &str = "ThisFiscalYear";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Token(#[from] OAuthError),

    #[error("no realm id: complete /connect or set REALM_ID")]
    MissingRealm,

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),

    #[error("reading upstream body failed: {0}")]
    Body(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Optional filters for the profit-and-loss report, taken from the inbound
/// query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfitLossQuery {
    pub date_macro: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub accounting_method: Option<String>,
    pub summarize_column_by: Option<String>,
}

impl ProfitLossQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let explicit_range = self.start_date.is_some() || self.end_date.is_some();
        match &self.date_macro {
            Some(m) => params.push(("date_macro", m.clone())),
            None if !explicit_range => params.push(("date_macro", DEFAULT_DATE_MACRO.to_string())),
            None => {}
        }
        let optional = [
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("accounting_method", &self.accounting_method),
            ("summarize_column_by", &self.summarize_column_by),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                params.push((key, v.clone()));
            }
        }
        params
    }
}

#[derive(Debug, Clone)]
pub enum Report {
    CompanyInfo,
    ProfitAndLoss(ProfitLossQuery),
}

impl Report {
    fn name(&self) -> &'static str {
        match self {
            Report::CompanyInfo => "CompanyInfo",
            Report::ProfitAndLoss(_) => "ProfitAndLoss",
        }
    }

    fn url(&self, base_url: &str, realm: &str) -> String {
        let realm = urlencoding::encode(realm);
        match self {
            Report::CompanyInfo => format!("{}/v3/company/{}/companyinfo/{}", base_url, realm, realm),
            Report::ProfitAndLoss(_) => {
                format!("{}/v3/company/{}/reports/ProfitAndLoss", base_url, realm)
            }
        }
    }

    fn query(&self, minor_version: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("minorversion", minor_version.to_string())];
        if let Report::ProfitAndLoss(q) = self {
            query.extend(q.params());
        }
        query
    }
}

pub struct AccountingClient {
    upstream: UpstreamClient,
    base_url: String,
    minor_version: u32,
    default_realm: Option<String>,
}

impl AccountingClient {
    pub fn new(cfg: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            upstream: UpstreamClient::new(
                cfg.upstream_max_retries,
                Duration::from_secs(cfg.upstream_timeout_secs),
            )?,
            base_url: cfg.api_base_url.clone(),
            minor_version: cfg.minor_version,
            default_realm: cfg.realm_id.clone(),
        })
    }

    /// Realm captured on callback, falling back to the configured one.
    pub fn resolve_realm(&self, token: &OAuthToken) -> Option<String> {
        token.realm_id.clone().or_else(|| self.default_realm.clone())
    }

    pub async fn company_info(&self, tokens: &TokenManager) -> Result<Bytes, ApiError> {
        self.fetch(tokens, &Report::CompanyInfo).await
    }

    pub async fn profit_and_loss(
        &self,
        tokens: &TokenManager,
        query: ProfitLossQuery,
    ) -> Result<Bytes, ApiError> {
        self.fetch(tokens, &Report::ProfitAndLoss(query)).await
    }

    async fn fetch(&self, tokens: &TokenManager, report: &Report) -> Result<Bytes, ApiError> {
        let token = tokens.access_token().await?;
        let realm = self.resolve_realm(&token).ok_or(ApiError::MissingRealm)?;
        let url = report.url(&self.base_url, &realm);
        let query = report.query(self.minor_version);

        let mut resp = self.upstream.get_json(&url, &query, &token.access_token).await?;

        if resp.status() == StatusCode::UNAUTHORIZED && tokens.retries_on_unauthorized() {
            let token = tokens.refresh_after_unauthorized(&token.access_token).await?;
            resp = self.upstream.get_json(&url, &query, &token.access_token).await?;
        }

        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        debug!(report = report.name(), realm_id = %realm, bytes = body.len(), "Fetched report");
        Ok(body)
    }
}
