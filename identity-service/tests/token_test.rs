//! Key issuance, validation and identity resolution.

mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use identity_service::models::{KeyType, PageParams};
use identity_service::services::{IssueParams, ServiceError};
use service_core::error::{AppError, ErrorKind};

fn api_params(expires_at: Option<chrono::DateTime<Utc>>) -> IssueParams {
    IssueParams {
        key_type: KeyType::Api,
        issuer_id: String::new(),
        subject: String::new(),
        expires_at,
    }
}

#[tokio::test]
async fn login_key_identifies_its_user() {
    let app = TestApp::spawn();
    let token = app.login("alice", "alice@example.com").await;

    let identity = app.state.tokens.identify(&token).await.unwrap();
    assert_eq!(identity.id, "alice");
    assert_eq!(identity.email, "alice@example.com");
}

#[tokio::test]
async fn empty_token_is_invalid_argument_not_unauthenticated() {
    let app = TestApp::spawn();
    let err = app.state.tokens.identify("").await.unwrap_err();
    assert!(matches!(err, ServiceError::EmptyToken));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = app.state.tokens.identify("garbage").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn expired_api_key_is_distinct_from_unknown_key() {
    let app = TestApp::spawn();
    let login = app.login("alice", "alice@example.com").await;
    let key = app
        .state
        .tokens
        .issue(&login, api_params(Some(Utc::now() - Duration::minutes(1))))
        .await
        .unwrap();

    let expired = app.state.tokens.identify(&key.secret).await.unwrap_err();
    assert!(matches!(expired, ServiceError::KeyExpired));
    assert_eq!(AppError::from(expired).code(), "key_expired");

    let unknown = app
        .state
        .tokens
        .identify("api_doesnotexist")
        .await
        .unwrap_err();
    assert!(matches!(unknown, ServiceError::Unauthenticated(_)));
}

#[tokio::test]
async fn api_key_can_be_listed_and_revoked_by_its_issuer_only() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let bob = app.login("bob", "bob@example.com").await;
    let key = app
        .state
        .tokens
        .issue(&alice, api_params(Some(Utc::now() + Duration::days(30))))
        .await
        .unwrap();

    let page = app
        .state
        .tokens
        .list_keys(&alice, &PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, key.id);

    let err = app.state.tokens.retrieve_key(&bob, key.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    app.state.tokens.revoke_key(&alice, key.id).await.unwrap();
    let err = app.state.tokens.identify(&key.secret).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated(_)));
}

#[tokio::test]
async fn recovery_key_only_serves_password_reset() {
    let app = TestApp::spawn();
    let recovery = app
        .issue(KeyType::Recovery, "alice", "alice@example.com")
        .await;
    let login = app.login("alice", "alice@example.com").await;

    let err = app.state.tokens.identify(&recovery).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated(_)));

    let identity = app.state.tokens.validate_recovery(&recovery).await.unwrap();
    assert_eq!(identity.id, "alice");

    assert!(app.state.tokens.validate_recovery(&login).await.is_err());
}
