//! Org & membership management.

mod common;

use common::TestApp;
use identity_service::models::{OrgRole, OrgUpdate, PageParams};
use identity_service::repository::OrgRepository;
use identity_service::services::{NewOrg, ServiceError};

#[tokio::test]
async fn creator_becomes_the_single_owner() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let org = app.create_org(&alice, "Acme").await;

    assert_eq!(org.owner_id, "alice");
    assert_eq!(app.state.orgs.get_owner_id_by_org(org.id).await.unwrap(), "alice");

    let members = app
        .state
        .orgs
        .list_members(&alice, org.id, &PageParams::default())
        .await
        .unwrap();
    assert_eq!(members.total, 1);
    assert_eq!(members.items[0].member_id, "alice");
    assert_eq!(members.items[0].role, OrgRole::Owner);
}

#[tokio::test]
async fn org_creation_is_atomic() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    app.repo.fail_membership_writes(true);

    let result = app
        .state
        .orgs
        .create_org(
            &alice,
            NewOrg {
                name: "Acme".to_string(),
                ..Default::default()
            },
        )
        .await;
    assert!(result.is_err());

    let page = app.repo.list_orgs(&PageParams::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn owner_cannot_be_removed_or_demoted() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let org = app.create_org(&alice, "Acme").await;

    let err = app
        .state
        .orgs
        .remove_member(&alice, org.id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app
        .state
        .orgs
        .update_member_role(&alice, org.id, "alice", OrgRole::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app
        .state
        .orgs
        .assign_member(&alice, org.id, "bob", OrgRole::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(app.state.orgs.get_owner_id_by_org(org.id).await.unwrap(), "alice");
}

#[tokio::test]
async fn ownership_transfer_keeps_exactly_one_owner() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let org = app.create_org(&alice, "Acme").await;

    let err = app
        .state
        .orgs
        .transfer_ownership(&alice, org.id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));

    app.state
        .orgs
        .assign_member(&alice, org.id, "bob", OrgRole::Editor)
        .await
        .unwrap();
    let org = app
        .state
        .orgs
        .transfer_ownership(&alice, org.id, "bob")
        .await
        .unwrap();
    assert_eq!(org.owner_id, "bob");

    let members = app
        .state
        .orgs
        .list_members(&alice, org.id, &PageParams::default())
        .await
        .unwrap();
    let owners: Vec<_> = members
        .items
        .iter()
        .filter(|m| m.role == OrgRole::Owner)
        .map(|m| m.member_id.as_str())
        .collect();
    assert_eq!(owners, vec!["bob"]);
    assert!(members
        .items
        .iter()
        .any(|m| m.member_id == "alice" && m.role == OrgRole::Admin));

    // alice is no longer the owner
    let err = app
        .state
        .orgs
        .transfer_ownership(&alice, org.id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authorization(_)));
}

#[tokio::test]
async fn remove_orgs_checks_every_org_before_deleting() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let empty = app.create_org(&alice, "Empty").await;
    let busy = app.create_org(&alice, "Busy").await;
    app.state
        .orgs
        .assign_member(&alice, busy.id, "bob", OrgRole::Viewer)
        .await
        .unwrap();

    let err = app
        .state
        .orgs
        .remove_orgs(&alice, &[empty.id, busy.id])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert!(app.state.orgs.view_org(&alice, empty.id).await.is_ok());

    app.state.orgs.remove_orgs(&alice, &[empty.id]).await.unwrap();
    assert!(matches!(
        app.state.orgs.view_org(&alice, empty.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn remove_orgs_for_owner_and_platform_admin() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    let first = app.create_org(&alice, "First").await;
    let second = app.create_org(&alice, "Second").await;
    app.state
        .orgs
        .assign_member(&alice, first.id, "bob", OrgRole::Admin)
        .await
        .unwrap();

    let bob = app.login("bob", "bob@example.com").await;
    assert!(matches!(
        app.state.orgs.remove_orgs(&bob, &[first.id]).await,
        Err(ServiceError::Authorization(_))
    ));

    app.state.authz.assign_role("ops", "admin").await.unwrap();
    let ops = app.login("ops", "ops@example.com").await;
    app.state.orgs.remove_orgs(&ops, &[second.id]).await.unwrap();
    assert!(app.repo.find_org(second.id).await.unwrap().is_none());
    assert!(app.repo.find_org(first.id).await.unwrap().is_some());
}

#[tokio::test]
async fn empty_update_is_rejected_before_the_token_is_checked() {
    let app = TestApp::spawn();
    let err = app
        .state
        .orgs
        .update_org("not-a-token", uuid::Uuid::new_v4(), OrgUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
}

#[tokio::test]
async fn list_orgs_pages_and_filters_by_name() {
    let app = TestApp::spawn();
    let alice = app.login("alice", "alice@example.com").await;
    for name in ["Acme", "Acme Labs", "Globex"] {
        app.create_org(&alice, name).await;
    }

    let page = app
        .state
        .orgs
        .list_orgs(
            &alice,
            &PageParams {
                name: Some("acme".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let page = app
        .state
        .orgs
        .list_orgs(
            &alice,
            &PageParams {
                offset: 1,
                limit: Some(1),
                name: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);

    let bob = app.login("bob", "bob@example.com").await;
    let page = app
        .state
        .orgs
        .list_orgs(&bob, &PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}
