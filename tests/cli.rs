//! Tests for the `refresh` and `status` subcommand reports.

mod common;

use common::{config, token, token_reply, TestApp, REALM};
use qbo_gateway::cli::{refresh_report, status_report};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer};

#[tokio::test]
async fn test_status_report_without_connection() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[]));

    let report = status_report(&app.state).await.unwrap();
    assert_eq!(report, "Not connected. Visit /connect to authorize.");
}

#[tokio::test]
async fn test_status_report_hides_token_values() {
    let server = MockServer::start().await;
    let app = TestApp::with_token(
        config(&server.uri(), &[("TOKEN_REFRESH_POLICY", "on_expiry")]),
        token("secret-access", "secret-refresh", Some(REALM)),
    )
    .await;

    let report = status_report(&app.state).await.unwrap();
    assert!(report.starts_with("Connected:"));
    assert!(report.contains(REALM));
    assert!(report.contains("on_expiry"));
    assert!(!report.contains("secret-access"));
    assert!(!report.contains("secret-refresh"));
}

#[tokio::test]
async fn test_refresh_report_rotates_stored_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=rt-old"))
        .respond_with(token_reply("at-new", "rt-new"))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::with_token(
        config(&server.uri(), &[]),
        token("at-old", "rt-old", Some(REALM)),
    )
    .await;

    let report = refresh_report(&app.state).await.unwrap();
    assert!(report.starts_with("Token refreshed:"));
    assert!(!report.contains("at-new"));
    assert_eq!(app.stored().await.unwrap().refresh_token, "rt-new");
}

#[tokio::test]
async fn test_refresh_report_fails_when_not_connected() {
    let server = MockServer::start().await;
    let app = TestApp::new(config(&server.uri(), &[]));
    assert!(refresh_report(&app.state).await.is_err());
}
