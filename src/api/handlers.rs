use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RefreshPolicy;
use crate::errors::AppError;
use crate::proxy::ProfitLossQuery;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

/// Query string Intuit appends when redirecting back to `/callback`.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "realmId")]
    pub realm_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub realm_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub refresh_policy: RefreshPolicy,
}

/// Upstream JSON body passed through without re-serialization.
pub struct UpstreamJson(pub Bytes);

impl IntoResponse for UpstreamJson {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/json")], self.0).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /connect — redirect the user agent to the consent page
pub async fn connect(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let csrf = state.states.issue();
    let url = state
        .oauth
        .authorize_url(&csrf)
        .map_err(|e| AppError::Internal(e.into()))?;

    tracing::info!(client_id = %state.oauth.client_id(), "Redirecting to QuickBooks authorization");
    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}

/// GET /callback — redeem the authorization code and store the token pair
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<&'static str, AppError> {
    if let Some(error) = params.error {
        return Err(AppError::AuthorizationDenied(error));
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AppError::MissingCode)?;

    if state.config.validate_state {
        let valid = params
            .state
            .as_deref()
            .map(|s| state.states.consume(s))
            .unwrap_or(false);
        if !valid {
            return Err(AppError::InvalidState);
        }
    }

    state
        .tokens
        .complete_authorization(&code, params.realm_id)
        .await
        .map_err(AppError::TokenExchange)?;

    Ok("QuickBooks connected successfully! You can now use /profitloss and /company routes.")
}

/// GET /company — company info for the connected realm
pub async fn company(State(state): State<Arc<AppState>>) -> Result<UpstreamJson, AppError> {
    state
        .accounting
        .company_info(&state.tokens)
        .await
        .map(UpstreamJson)
        .map_err(AppError::CompanyInfo)
}

/// GET /profitloss — profit-and-loss report for the connected realm
pub async fn profit_loss(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProfitLossQuery>,
) -> Result<UpstreamJson, AppError> {
    state
        .accounting
        .profit_and_loss(&state.tokens, query)
        .await
        .map(UpstreamJson)
        .map_err(AppError::ProfitAndLoss)
}

/// GET /status — connection metadata; token values are never exposed
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let token = state
        .tokens
        .current()
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let resp = match token {
        Some(t) => StatusResponse {
            connected: !t.access_token.is_empty() || t.has_refresh_token(),
            realm_id: state.accounting.resolve_realm(&t),
            expires_at: t.expires_at,
            refresh_expires_at: t.refresh_expires_at,
            refresh_policy: state.tokens.policy(),
        },
        None => StatusResponse {
            connected: false,
            realm_id: state.config.realm_id.clone(),
            expires_at: None,
            refresh_expires_at: None,
            refresh_policy: state.tokens.policy(),
        },
    };
    Ok(Json(resp))
}

/// POST /disconnect — revoke upstream and forget the stored tokens
pub async fn disconnect(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    let dropped = state
        .tokens
        .disconnect()
        .await
        .map_err(AppError::Disconnect)?;

    Ok(if dropped.is_some() {
        "QuickBooks disconnected."
    } else {
        "No QuickBooks connection to disconnect."
    })
}
