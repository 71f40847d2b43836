//! Storage contracts for the identity core.
//!
//! All cross-request coordination happens here: uniqueness of memberships and
//! pending invites, and the multi-row writes (org + owner membership, invite
//! acceptance + membership, ownership transfer, org removal) which must
//! commit or roll back together.

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    InviteState, Key, Org, OrgInvite, OrgMembership, OrgRole, Page, PageParams, PlatformRole,
    RoleAssignment, StoredKey,
};
use crate::services::error::ServiceResult;

/// Persisted API keys.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    async fn save_key(&self, key: &StoredKey) -> ServiceResult<()>;

    async fn find_key_by_secret_hash(&self, secret_hash: &str) -> ServiceResult<Option<Key>>;

    async fn find_key(&self, issuer_id: &str, id: Uuid) -> ServiceResult<Option<Key>>;

    async fn list_keys(&self, issuer_id: &str, page: &PageParams) -> ServiceResult<Page<Key>>;

    /// Returns false when no such key exists for this issuer.
    async fn remove_key(&self, issuer_id: &str, id: Uuid) -> ServiceResult<bool>;
}

/// Platform-scoped role assignments, one per entity.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Insert or overwrite.
    async fn upsert_role(&self, assignment: &RoleAssignment) -> ServiceResult<()>;

    async fn find_role(&self, entity_id: &str) -> ServiceResult<Option<PlatformRole>>;
}

/// Orgs and their memberships.
#[async_trait]
pub trait OrgRepository: Send + Sync {
    /// Persist the org and its owner membership in one transaction.
    async fn create_org_with_owner(&self, org: &Org, owner: &OrgMembership) -> ServiceResult<()>;

    async fn find_org(&self, id: Uuid) -> ServiceResult<Option<Org>>;

    async fn update_org(&self, org: &Org) -> ServiceResult<()>;

    async fn list_orgs(&self, page: &PageParams) -> ServiceResult<Page<Org>>;

    async fn list_orgs_for_member(
        &self,
        member_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<Org>>;

    /// Delete every org in `ids` together with its memberships and invites,
    /// in one transaction. Fails without deleting anything when an org is
    /// missing (`NotFound`), is not owned by `owner_id` when one is given
    /// (`Authorization`), or has members besides its owner (`Conflict`).
    async fn remove_orgs(&self, ids: &[Uuid], owner_id: Option<&str>) -> ServiceResult<()>;

    async fn find_membership(
        &self,
        org_id: Uuid,
        member_id: &str,
    ) -> ServiceResult<Option<OrgMembership>>;

    async fn list_members(
        &self,
        org_id: Uuid,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgMembership>>;

    /// Insert; `Conflict` when the member already belongs to the org.
    async fn save_membership(&self, membership: &OrgMembership) -> ServiceResult<()>;

    async fn update_membership_role(
        &self,
        org_id: Uuid,
        member_id: &str,
        role: OrgRole,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool>;

    async fn remove_membership(&self, org_id: Uuid, member_id: &str) -> ServiceResult<bool>;

    /// Demote the current owner to admin, promote `new_owner` and update
    /// `Org.owner_id`, atomically.
    async fn transfer_ownership(
        &self,
        org_id: Uuid,
        current_owner: &str,
        new_owner: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()>;
}

/// Org invites.
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Insert; `Conflict` when a pending invite for the same org and e-mail
    /// (or the same platform invite id) already exists.
    async fn save_invite(&self, invite: &OrgInvite) -> ServiceResult<()>;

    async fn find_invite(&self, id: Uuid) -> ServiceResult<Option<OrgInvite>>;

    async fn find_invite_by_platform_invite(
        &self,
        platform_invite_id: &str,
    ) -> ServiceResult<Option<OrgInvite>>;

    async fn find_pending_invite(
        &self,
        org_id: Uuid,
        invitee_email: &str,
    ) -> ServiceResult<Option<OrgInvite>>;

    /// Bind the invitee id of a dormant invite. Returns false when the invite
    /// is no longer pending or already bound.
    async fn activate_invite(
        &self,
        id: Uuid,
        invitee_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool>;

    /// Move a pending invite to `state`. Returns false when it was no longer
    /// pending.
    async fn close_invite(
        &self,
        id: Uuid,
        state: InviteState,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool>;

    /// Mark the invite accepted (binding `membership.member_id` as invitee)
    /// and insert the membership in one transaction. `Conflict` when the
    /// invite is no longer pending or the membership already exists.
    async fn accept_invite(
        &self,
        id: Uuid,
        membership: &OrgMembership,
        now: DateTime<Utc>,
    ) -> ServiceResult<()>;

    async fn list_invites_by_inviter(
        &self,
        inviter_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>>;

    /// Invites bound to `invitee_id`, plus unbound invites sent to `email`.
    async fn list_invites_for_invitee(
        &self,
        invitee_id: &str,
        email: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>>;
}

/// Everything the service needs from one backing store.
#[async_trait]
pub trait Repository: KeyRepository + RoleRepository + OrgRepository + InviteRepository {
    async fn health_check(&self) -> ServiceResult<()>;
}
