//! Shared helpers: a config aimed at a wiremock server and a router driver.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use wiremock::ResponseTemplate;

use qbo_gateway::config::Config;
use qbo_gateway::oauth::OAuthToken;
use qbo_gateway::store::{MemoryStore, TokenStore};
use qbo_gateway::{api, AppState};

pub const CLIENT_ID: &str = "ABq9TestClient";
pub const REALM: &str = "4620816365";

/// Config whose authorize, token, revoke and API endpoints all live on `base`.
pub fn config(base: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("CLIENT_ID", CLIENT_ID.to_string()),
        ("CLIENT_SECRET", "test-secret".to_string()),
        ("REDIRECT_URI", "http://localhost:10000/callback".to_string()),
        ("QBO_AUTHORIZE_URL", format!("{}/connect/oauth2", base)),
        ("QBO_TOKEN_URL", format!("{}/oauth2/v1/tokens/bearer", base)),
        ("QBO_REVOKE_URL", format!("{}/v2/oauth2/tokens/revoke", base)),
        ("QBO_API_BASE_URL", base.to_string()),
        ("UPSTREAM_MAX_RETRIES", "0".to_string()),
        ("UPSTREAM_TIMEOUT_SECS", "5".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new(cfg: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::with_store(cfg, store.clone()).expect("app state"));
        Self {
            router: api::router(state.clone()),
            state,
            store,
        }
    }

    pub async fn with_token(cfg: Config, token: OAuthToken) -> Self {
        let app = Self::new(cfg);
        app.store.save(&token).await.expect("seed token");
        app
    }

    /// Memory store seeded from `ACCESS_TOKEN` / `REFRESH_TOKEN`, as at startup.
    pub async fn seeded(cfg: Config) -> Self {
        let seed = OAuthToken::seeded(cfg.access_token.clone(), cfg.refresh_token.clone());
        let app = Self::new(cfg);
        if let Some(seed) = seed {
            app.store.save(&seed).await.expect("seed token");
        }
        app
    }

    pub async fn request(&self, method: &str, uri: &str) -> (StatusCode, HeaderMap, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let resp = self.router.clone().oneshot(req).await.expect("response");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, String) {
        self.request("GET", uri).await
    }

    pub async fn stored(&self) -> Option<OAuthToken> {
        self.store.load().await.expect("load token")
    }
}

pub fn token(access: &str, refresh: &str, realm: Option<&str>) -> OAuthToken {
    OAuthToken {
        access_token: access.into(),
        refresh_token: refresh.into(),
        expires_at: Some(chrono::Utc::now() + chrono::Duration::seconds(3600)),
        refresh_expires_at: None,
        realm_id: realm.map(String::from),
    }
}

pub fn token_reply(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 3600,
        "x_refresh_token_expires_in": 8726400
    }))
}
