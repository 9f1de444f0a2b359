//! Integration tests for the authorization-code flow routes.
//!
//! Every upstream (authorize page, token endpoint, revoke endpoint) is a
//! wiremock server; the router is driven in-process with `oneshot`.

mod common;

use axum::http::{header, StatusCode};
use common::{config, token, token_reply, TestApp, CLIENT_ID, REALM};
use qbo_gateway::store::TokenStore;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state_from_location(location: &str) -> String {
    url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state in authorize url")
}

#[tokio::test]
async fn test_connect_redirects_with_client_id_and_scope() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[]));

    let (status, headers, _) = app.get("/connect").await;
    assert_eq!(status, StatusCode::FOUND);

    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/connect/oauth2?", server.uri())));
    assert!(location.contains(&format!("client_id={}", CLIENT_ID)));
    assert!(location.contains("scope=com.intuit.quickbooks.accounting"));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("redirect_uri=http%3A%2F%2Flocalhost%3A10000%2Fcallback"));
    assert!(!state_from_location(location).is_empty());

    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(app.state.states.len(), 1);
}

#[tokio::test]
async fn test_each_connect_issues_a_fresh_state() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[]));

    let (_, first, _) = app.get("/connect").await;
    let (_, second, _) = app.get("/connect").await;
    assert_ne!(
        state_from_location(first[header::LOCATION].to_str().unwrap()),
        state_from_location(second[header::LOCATION].to_str().unwrap())
    );
}

#[tokio::test]
async fn test_callback_without_code_is_400() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = TestApp::new(config(&server.uri(), &[]));

    let (status, _, body) = app.get("/callback?state=abc&realmId=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Authorization code missing");

    let (status, _, _) = app.get("/callback?code=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_denied_consent_is_400() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[]));

    let (status, _, body) = app.get("/callback?error=access_denied&state=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Authorization was denied");
}

#[tokio::test]
async fn test_callback_with_unknown_state_never_exchanges() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_reply("at", "rt"))
        .expect(0)
        .mount(&server)
        .await;
    let app = TestApp::new(config(&server.uri(), &[]));
    app.get("/connect").await;

    let (status, _, body) = app.get("/callback?code=abc&state=forged").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid state parameter");

    let (status, _, _) = app.get("/callback?code=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "missing state is rejected too");
    assert!(app.stored().await.is_none());
}

#[tokio::test]
async fn test_full_flow_stores_token_and_realm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/v1/tokens/bearer"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .respond_with(token_reply("at-1", "rt-1"))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::new(config(&server.uri(), &[]));

    let (_, headers, _) = app.get("/connect").await;
    let state = state_from_location(headers[header::LOCATION].to_str().unwrap());

    let (status, _, body) = app
        .get(&format!("/callback?code=auth-code-1&state={}&realmId={}", state, REALM))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("QuickBooks connected successfully!"));

    let stored = app.stored().await.expect("token stored");
    assert_eq!(stored.access_token, "at-1");
    assert_eq!(stored.refresh_token, "rt-1");
    assert_eq!(stored.realm_id.as_deref(), Some(REALM));
    assert!(stored.expires_at.is_some());

    // The state was consumed; replaying the callback fails.
    let (status, _, _) = app
        .get(&format!("/callback?code=auth-code-1&state={}", state))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_skips_state_check_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_reply("at-1", "rt-1"))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::new(config(&server.uri(), &[("OAUTH_VALIDATE_STATE", "false")]));

    let (status, _, _) = app.get("/callback?code=abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stored().await.unwrap().access_token, "at-1");
}

#[tokio::test]
async fn test_callback_survives_out_of_range_lifetime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": i64::MAX
        })))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::new(config(&server.uri(), &[("OAUTH_VALIDATE_STATE", "false")]));

    let (status, _, _) = app.get("/callback?code=abc").await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.stored().await.unwrap();
    assert_eq!(stored.access_token, "at");
    assert!(stored.expires_at.is_none());
}

#[tokio::test]
async fn test_failed_exchange_is_500_with_static_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant","detail":"xyz"}"#),
        )
        .mount(&server)
        .await;
    let app = TestApp::new(config(&server.uri(), &[("OAUTH_VALIDATE_STATE", "false")]));

    let (status, _, body) = app.get("/callback?code=expired").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to connect to QuickBooks");
    assert!(app.stored().await.is_none());
}

#[tokio::test]
async fn test_status_reports_metadata_without_tokens() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[("TOKEN_REFRESH_POLICY", "on_expiry")]));

    let (status, _, body) = app.get("/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["connected"], false);
    assert_eq!(json["refresh_policy"], "on_expiry");

    app.store
        .save(&token("secret-access", "secret-refresh", Some(REALM)))
        .await
        .unwrap();
    let (_, _, body) = app.get("/status").await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["connected"], true);
    assert_eq!(json["realm_id"], REALM);
    assert!(!body.contains("secret-access"));
    assert!(!body.contains("secret-refresh"));
}

#[tokio::test]
async fn test_disconnect_revokes_and_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/tokens/revoke"))
        .and(body_string_contains("rt-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::with_token(config(&server.uri(), &[]), token("at-1", "rt-1", Some(REALM))).await;

    let (status, _, body) = app.request("POST", "/disconnect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "QuickBooks disconnected.");
    assert!(app.stored().await.is_none());

    let (status, _, body) = app.request("POST", "/disconnect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "No QuickBooks connection to disconnect.");
}

#[tokio::test]
async fn test_healthz() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[]));
    let (status, _, body) = app.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}
