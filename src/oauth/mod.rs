//! OAuth2 authorization-code flow against the Intuit authorization server.
//!
//! - [`OAuthClient`] builds the consent URL and calls the token/revoke endpoints.
//! - [`StateStore`] issues and checks the CSRF `state` parameter.
//! - [`TokenManager`] owns the token lifecycle: storing the pair obtained on
//!   callback and refreshing it according to the configured policy.

pub mod client;
pub mod manager;
pub mod state;
pub mod token;

pub use client::OAuthClient;
pub use manager::TokenManager;
pub use state::StateStore;
pub use token::{OAuthToken, TokenResponse};

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("not connected: no token has been stored yet")]
    NotConnected,

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("authorization server returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("unreadable token response: {0}")]
    Malformed(String),

    #[error("invalid endpoint url {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token store error: {0}")]
    Store(#[from] anyhow::Error),
}
