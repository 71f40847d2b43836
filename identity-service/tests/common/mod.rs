//! Shared setup for identity-service integration tests.
//!
//! Every test gets its own in-memory store, a recording notifier and an RSA
//! key pair written to temp files the way a deployment would mount them.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{InviteConfig, JwtConfig, SecurityConfig},
    middleware::SERVICE_API_KEY_HEADER,
    models::{KeyType, Org},
    repository::InMemoryRepository,
    services::{IssueParams, JwtService, MockNotifier, NewOrg},
    AppState,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/jwt_private.pem");
const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/jwt_public.pem");

pub const INVITE_BASE_URL: &str = "https://console.example.com";
pub const SERVICE_API_KEY: &str = "test-service-key-0123456789abcdef";

pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
    pub notifier: Arc<MockNotifier>,
    _key_files: (NamedTempFile, NamedTempFile),
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_invite_config(InviteConfig {
            expiry_hours: 168,
            base_url: INVITE_BASE_URL.to_string(),
        })
    }

    pub fn with_invite_config(invite: InviteConfig) -> Self {
        let (private_file, public_file) = create_test_keys().expect("Failed to create test keys");
        let config = JwtConfig {
            private_key_path: private_file.path().to_str().unwrap().to_string(),
            public_key_path: public_file.path().to_str().unwrap().to_string(),
            issuer: "identity-service-test".to_string(),
            login_token_expiry_minutes: 60,
            recovery_token_expiry_minutes: 5,
        };
        let jwt = JwtService::new(&config).expect("Failed to create JWT service");

        let repo = Arc::new(InMemoryRepository::new());
        let notifier = Arc::new(MockNotifier::new());
        let security = SecurityConfig {
            service_api_key: SERVICE_API_KEY.to_string(),
        };
        let state = AppState::new(repo.clone(), jwt, notifier.clone(), invite, security);

        Self {
            state,
            repo,
            notifier,
            _key_files: (private_file, public_file),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Login key for `user_id`.
    pub async fn login(&self, user_id: &str, email: &str) -> String {
        self.issue(KeyType::Login, user_id, email).await
    }

    pub async fn issue(&self, key_type: KeyType, user_id: &str, email: &str) -> String {
        self.state
            .tokens
            .issue(
                "",
                IssueParams {
                    key_type,
                    issuer_id: user_id.to_string(),
                    subject: email.to_string(),
                    expires_at: None,
                },
            )
            .await
            .expect("Failed to issue key")
            .secret
    }

    pub async fn create_org(&self, token: &str, name: &str) -> Org {
        self.state
            .orgs
            .create_org(
                token,
                NewOrg {
                    name: name.to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to create org")
    }

    /// Send a request through the full router and decode the JSON body
    /// (`Null` for empty bodies).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let headers: Vec<(&str, String)> = token
            .map(|t| ("authorization", format!("Bearer {}", t)))
            .into_iter()
            .collect();
        self.send(method, uri, &headers, body).await
    }

    /// Call one method through `POST /rpc` as a trusted service.
    pub async fn rpc(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.rpc_with_key(Some(SERVICE_API_KEY), method, params).await
    }

    /// Call one method through `POST /rpc` with an arbitrary service key.
    pub async fn rpc_with_key(
        &self,
        service_key: Option<&str>,
        method: &str,
        params: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let headers: Vec<(&str, String)> = service_key
            .map(|k| (SERVICE_API_KEY_HEADER, k.to_string()))
            .into_iter()
            .collect();
        self.send(
            "POST",
            "/rpc",
            &headers,
            Some(serde_json::json!({ "method": method, "params": params })),
        )
        .await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        (status, json)
    }
}

fn create_test_keys() -> std::io::Result<(NamedTempFile, NamedTempFile)> {
    let mut private_file = NamedTempFile::new()?;
    private_file.write_all(TEST_PRIVATE_KEY.as_bytes())?;
    let mut public_file = NamedTempFile::new()?;
    public_file.write_all(TEST_PUBLIC_KEY.as_bytes())?;
    Ok((private_file, public_file))
}
