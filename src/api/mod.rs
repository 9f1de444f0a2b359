use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod handlers;

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        // OAuth flow
        .route("/connect", get(handlers::connect))
        .route("/callback", get(handlers::callback))
        .route("/disconnect", post(handlers::disconnect))
        .route("/status", get(handlers::status))
        // Proxied reads
        .route("/company", get(handlers::company))
        .route("/profitloss", get(handlers::profit_loss))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(crate::middleware::request_id))
        .layer(middleware::from_fn(crate::middleware::security_headers))
}
