use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::oauth::OAuthError;
use crate::proxy::ApiError;

/// Errors surfaced by the route handlers.
///
/// The full chain (upstream bodies included) goes to the log; clients only
/// ever see a static message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authorization code missing")]
    MissingCode,

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("unknown or expired state parameter")]
    InvalidState,

    #[error("error exchanging code for tokens: {0}")]
    TokenExchange(#[source] OAuthError),

    #[error("error fetching company info: {0}")]
    CompanyInfo(#[source] ApiError),

    #[error("error fetching Profit & Loss report: {0}")]
    ProfitAndLoss(#[source] ApiError),

    #[error("error disconnecting: {0}")]
    Disconnect(#[source] OAuthError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCode | AppError::AuthorizationDenied(_) | AppError::InvalidState => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Static text returned to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::MissingCode => "Authorization code missing",
            AppError::AuthorizationDenied(_) => "Authorization was denied",
            AppError::InvalidState => "Invalid state parameter",
            AppError::TokenExchange(_) => "Failed to connect to QuickBooks",
            AppError::CompanyInfo(_) => "Error fetching company info",
            AppError::ProfitAndLoss(_) => "Error fetching Profit & Loss report",
            AppError::Disconnect(_) => "Failed to disconnect from QuickBooks",
            AppError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Rejected request");
        }
        (status, self.public_message()).into_response()
    }
}
