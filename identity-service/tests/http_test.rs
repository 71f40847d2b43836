//! HTTP surface: invite routes, the JSON RPC endpoint, health and docs.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn();
    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"], "up");
}

#[tokio::test]
async fn openapi_document_lists_invite_routes() {
    let app = TestApp::spawn();
    let (status, body) = app
        .request("GET", "/.well-known/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/invites/{id}"].is_object());
    assert!(body["paths"]["/groups/{id}/invites"].is_object());
    assert!(body["components"]["securitySchemes"]["service_api_key"].is_object());
}

#[tokio::test]
async fn invite_routes_require_a_bearer_token() {
    let app = TestApp::spawn();
    let (status, body) = app
        .request("GET", &format!("/invites/{}", uuid::Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn invite_is_created_viewed_and_accepted_over_http() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let acme = app.create_org(&alice, "Acme").await;

    let (status, invite) = app
        .request(
            "POST",
            &format!("/groups/{}/invites", acme.id),
            Some(&alice),
            Some(json!({
                "invitee_email": "carol@example.com",
                "invitee_id": "carol",
                "role": "editor",
                "redirect_path": "/orgs"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invite["state"], "pending");
    let invite_id = invite["id"].as_str().unwrap().to_string();

    let carol = app.login("carol", "carol@example.com").await;
    let (status, viewed) = app
        .request("GET", &format!("/invites/{}", invite_id), Some(&carol), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(viewed["invitee_role"], "editor");

    let (status, membership) = app
        .request(
            "POST",
            &format!("/invites/{}/accept", invite_id),
            Some(&carol),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(membership["member_id"], "carol");
    assert_eq!(membership["role"], "editor");

    let (status, body) = app
        .request(
            "POST",
            &format!("/invites/{}/decline", invite_id),
            Some(&carol),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, page) = app
        .request("GET", "/users/carol/invites/received?limit=5", Some(&carol), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["items"][0]["state"], "accepted");
}

#[tokio::test]
async fn invite_can_be_declined_or_revoked_over_http() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let acme = app.create_org(&alice, "Acme").await;

    let mut ids = Vec::new();
    for email in ["carol@example.com", "dave@example.com"] {
        let (status, invite) = app
            .request(
                "POST",
                &format!("/groups/{}/invites", acme.id),
                Some(&alice),
                Some(json!({
                    "invitee_email": email,
                    "role": "viewer",
                    "redirect_path": "/orgs"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(invite["id"].as_str().unwrap().to_string());
    }
    assert_eq!(app.notifier.sent().len(), 2);

    let carol = app.login("carol", "carol@example.com").await;
    let (status, body) = app
        .request(
            "POST",
            &format!("/invites/{}/decline", ids[0]),
            Some(&carol),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app
        .request("DELETE", &format!("/invites/{}", ids[1]), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, sent) = app
        .request("GET", "/users/alice/invites/sent", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["total"], 2);
}

#[tokio::test]
async fn invalid_invite_body_is_rejected() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let acme = app.create_org(&alice, "Acme").await;

    let (status, body) = app
        .request(
            "POST",
            &format!("/groups/{}/invites", acme.id),
            Some(&alice),
            Some(json!({
                "invitee_email": "not-an-email",
                "role": "viewer",
                "redirect_path": "/orgs"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn rpc_requires_the_service_key() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let acme = app.create_org(&alice, "Acme").await;

    for key in [None, Some("not-the-service-key")] {
        let (status, body) = app
            .rpc_with_key(key, "assign_role", json!({"id": "mallory", "role": "admin"}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");

        let (status, body) = app
            .rpc_with_key(
                key,
                "issue",
                json!({"issuer_id": "mallory", "email": "m@example.com", "key_type": "login"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("value").is_none());

        let (status, _) = app
            .rpc_with_key(key, "remove_orgs", json!({"token": alice, "ids": [acme.id]}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = app.rpc("retrieve_role", json!({"id": "mallory"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert!(app.state.orgs.view_org(&alice, acme.id).await.is_ok());
}

#[tokio::test]
async fn rpc_issue_identify_and_authorize() {
    let app = TestApp::spawn();

    let (status, issued) = app
        .rpc(
            "issue",
            json!({"issuer_id": "alice", "email": "alice@example.com", "key_type": "login"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issued["key_type"], "login");
    let token = issued["value"].as_str().unwrap().to_string();

    let (status, identity) = app.rpc("identify", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(identity["id"], "alice");
    assert_eq!(identity["email"], "alice@example.com");

    let (status, org) = app
        .rpc("create_org", json!({"token": token, "name": "Acme"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(org["owner_id"], "alice");

    let (status, _) = app
        .rpc(
            "authorize",
            json!({"token": token, "object": org["id"], "subject": "organizations", "action": "delete"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .rpc(
            "authorize",
            json!({"token": token, "object": org["id"], "subject": "things", "action": "view"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");

    let (status, owner) = app
        .rpc("get_owner_id_by_org", json!({"id": org["id"]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner["owner_id"], "alice");
}

#[tokio::test]
async fn rpc_error_codes() {
    let app = TestApp::spawn();

    let (status, body) = app.rpc("identify", json!({"token": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Empty token");

    let (status, body) = app.rpc("identify", json!({"token": "forged"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, body) = app
        .rpc("issue", json!({"issuer_id": "alice", "email": "a@example.com", "key_type": "magic"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid auth key type");

    let login = app.login("alice", "alice@example.com").await;
    let (status, issued) = app
        .rpc(
            "issue",
            json!({
                "token": login,
                "key_type": "api",
                "expires_at": Utc::now() - Duration::minutes(5)
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .rpc("identify", json!({"token": issued["value"]}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "key_expired");

    let (status, body) = app
        .rpc("retrieve_role", json!({"id": "nobody"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn rpc_dormant_invite_round_trip() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let acme = app.create_org(&alice, "Acme").await;

    let (status, created) = app
        .rpc(
            "create_dormant_org_invite",
            json!({
                "token": alice,
                "org_id": acme.id,
                "invitee_email": "bob@example.com",
                "role": "editor",
                "platform_invite_id": "pinv-9"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, activated) = app
        .rpc(
            "activate_org_invite",
            json!({"platform_invite_id": "pinv-9", "user_id": "bob", "redirect_path": "/orgs"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activated["id"], created["id"]);

    let bob = app.login("bob", "bob@example.com").await;
    let (status, responded) = app
        .rpc(
            "respond_org_invite",
            json!({"token": bob, "invite_id": created["id"], "accept": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(responded["membership"]["role"], "editor");

    let (status, body) = app
        .rpc("remove_orgs", json!({"token": bob, "ids": [acme.id]}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "authorization");
}
