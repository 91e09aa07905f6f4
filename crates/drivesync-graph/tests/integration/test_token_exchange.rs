//! Integration tests for the refresh-token exchange and OAuthTokenSource

use std::sync::Arc;
use std::time::Duration;

use drivesync_core::{
    domain::OwnerId,
    ports::{IAccessTokenSource, ICredentialStore},
};
use drivesync_graph::{auth::OAuthClient, GraphError};
use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common::{self, MemoryStore, TOKEN_PATH};

// ============================================================================
// OAuthClient
// ============================================================================

#[tokio::test]
async fn test_exchange_posts_refresh_token_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "Files.ReadWrite.All offline_access"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = common::oauth_client(&server)
        .exchange("rt-1")
        .await
        .expect("exchange failed");

    assert_eq!(response.access_token, "at-1");
    assert_eq!(response.expires_in, Some(3600));
}

#[tokio::test]
async fn test_exchange_non_success_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS70000: expired"
        })))
        .mount(&server)
        .await;

    let err = common::oauth_client(&server)
        .exchange("stale")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "token exchange failed: status 400");
    match err {
        GraphError::TokenExchange { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_exchange_transport_failure_is_network_error() {
    // Bind and release a port so nothing is listening on it
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = OAuthClient::new(
        reqwest::Client::new(),
        format!("http://{addr}{TOKEN_PATH}"),
        "client-id",
        "client-secret",
    );

    let err = client.exchange("rt").await.unwrap_err();
    assert!(matches!(err, GraphError::NetworkError(_)));
}

#[tokio::test]
async fn test_exchange_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = common::oauth_client(&server).exchange("rt").await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidResponse(_)));
}

// ============================================================================
// OAuthTokenSource
// ============================================================================

#[tokio::test]
async fn test_token_source_exchanges_stored_refresh_token() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(123);
    let store = Arc::new(MemoryStore::with_token(owner, "rt-1"));
    common::mount_token(&server, "rt-1", json!({"access_token": "at-1"})).await;

    let tokens = common::token_source(&server, store, false);
    assert_eq!(tokens.access_token(owner).await.unwrap(), "at-1");
}

#[tokio::test]
async fn test_token_source_without_integration_fails() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::default());

    let tokens = common::token_source(&server, store, false);
    let err = tokens.access_token(OwnerId::new(9)).await.unwrap_err();

    assert!(err.to_string().contains("no integration found"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_token_source_persists_rotated_refresh_token() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(7);
    let store = Arc::new(MemoryStore::with_token(owner, "rt-old"));
    common::mount_token(
        &server,
        "rt-old",
        json!({"access_token": "at", "refresh_token": "rt-new", "expires_in": 3600}),
    )
    .await;

    let tokens = common::token_source(&server, store.clone(), false);
    tokens.access_token(owner).await.unwrap();

    assert_eq!(store.refresh_token(owner).as_deref(), Some("rt-new"));
}

#[tokio::test]
async fn test_token_source_keeps_authorization_saved_during_exchange() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(123);
    let store = Arc::new(MemoryStore::with_token(owner, "rt-old"));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=rt-old"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "at", "refresh_token": "rt-old-rotated"}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let tokens = Arc::new(common::token_source(&server, store.clone(), false));
    let exchange = tokio::spawn({
        let tokens = tokens.clone();
        async move { tokens.access_token(owner).await }
    });

    // Re-authorize once the exchange of rt-old is on the wire
    while server.received_requests().await.unwrap().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    store.save_refresh_token(owner, "u2", "rt-fresh").await.unwrap();

    assert_eq!(exchange.await.unwrap().unwrap(), "at");
    assert_eq!(store.user_id(owner).as_deref(), Some("u2"));
    assert_eq!(store.refresh_token(owner).as_deref(), Some("rt-fresh"));
}

#[tokio::test]
async fn test_token_source_rotation_failure_does_not_fail_call() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(7);
    let mut store = MemoryStore::with_token(owner, "rt-old");
    store.fail_rotation = true;
    let store = Arc::new(store);
    common::mount_token(
        &server,
        "rt-old",
        json!({"access_token": "at", "refresh_token": "rt-new"}),
    )
    .await;

    let tokens = common::token_source(&server, store.clone(), false);
    assert_eq!(tokens.access_token(owner).await.unwrap(), "at");
    assert_eq!(store.refresh_token(owner).as_deref(), Some("rt-old"));
}

#[tokio::test]
async fn test_token_source_without_cache_exchanges_every_call() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(1);
    let store = Arc::new(MemoryStore::with_token(owner, "rt"));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "at", "expires_in": 3600})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let tokens = common::token_source(&server, store, false);
    tokens.access_token(owner).await.unwrap();
    tokens.access_token(owner).await.unwrap();
}

#[tokio::test]
async fn test_token_source_cache_reuses_until_invalidated() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(1);
    let store = Arc::new(MemoryStore::with_token(owner, "rt"));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "at", "expires_in": 3600})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let tokens = common::token_source(&server, store, true);
    tokens.access_token(owner).await.unwrap();
    tokens.access_token(owner).await.unwrap();
    tokens.invalidate(owner);
    tokens.access_token(owner).await.unwrap();
}

#[tokio::test]
async fn test_token_source_cache_skips_short_lived_tokens() {
    let server = MockServer::start().await;
    let owner = OwnerId::new(1);
    let store = Arc::new(MemoryStore::with_token(owner, "rt"));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "at", "expires_in": 30})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let tokens = common::token_source(&server, store, true);
    tokens.access_token(owner).await.unwrap();
    tokens.access_token(owner).await.unwrap();
}
