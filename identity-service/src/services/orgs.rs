//! Org & Membership Manager.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Org, OrgMembership, OrgRole, OrgUpdate, Page, PageParams};
use crate::repository::Repository;
use crate::services::authz::AuthzService;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::tokens::TokenService;

/// Fields of a new org.
#[derive(Debug, Clone, Default)]
pub struct NewOrg {
    pub name: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

pub struct OrgService {
    repo: Arc<dyn Repository>,
    tokens: Arc<TokenService>,
    authz: Arc<AuthzService>,
}

impl OrgService {
    pub fn new(
        repo: Arc<dyn Repository>,
        tokens: Arc<TokenService>,
        authz: Arc<AuthzService>,
    ) -> Self {
        Self {
            repo,
            tokens,
            authz,
        }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Org> {
        self.repo
            .find_org(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Org not found"))
    }

    /// Create an org owned by the caller. The org row and the owner
    /// membership are written in one transaction.
    #[tracing::instrument(skip(self, token, org), fields(name = %org.name))]
    pub async fn create_org(&self, token: &str, org: NewOrg) -> ServiceResult<Org> {
        let caller = self.tokens.identify(token).await?;
        let metadata = if org.metadata.is_null() {
            serde_json::json!({})
        } else {
            org.metadata
        };

        let org = Org::new(caller.id.clone(), org.name, org.description, metadata);
        let owner = OrgMembership::new(org.id, caller.id.clone(), OrgRole::Owner);
        self.repo.create_org_with_owner(&org, &owner).await?;

        tracing::info!(org_id = %org.id, owner_id = %caller.id, "Org created");
        Ok(org)
    }

    #[tracing::instrument(skip(self, token, update))]
    pub async fn update_org(&self, token: &str, id: Uuid, update: OrgUpdate) -> ServiceResult<Org> {
        if update.is_empty() {
            return Err(ServiceError::invalid("Nothing to update"));
        }
        self.authz.can_access_org(token, id, OrgRole::Admin).await?;

        let mut org = self.load(id).await?;
        update.apply(&mut org, Utc::now());
        self.repo.update_org(&org).await?;
        Ok(org)
    }

    pub async fn view_org(&self, token: &str, id: Uuid) -> ServiceResult<Org> {
        self.authz.can_access_org(token, id, OrgRole::Viewer).await?;
        self.load(id).await
    }

    /// Platform admins see every org, everyone else only orgs they belong to.
    pub async fn list_orgs(&self, token: &str, page: &PageParams) -> ServiceResult<Page<Org>> {
        let caller = self.tokens.identify(token).await?;
        if self.authz.is_platform_admin(&caller.id).await? {
            self.repo.list_orgs(page).await
        } else {
            self.repo.list_orgs_for_member(&caller.id, page).await
        }
    }

    /// Remove orgs. The store re-checks ownership and emptiness under row
    /// locks and deletes all of them or none.
    #[tracing::instrument(skip(self, token))]
    pub async fn remove_orgs(&self, token: &str, ids: &[Uuid]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Err(ServiceError::MissingId);
        }
        let caller = self.tokens.identify(token).await?;

        for id in ids {
            self.authz.require_org_role(&caller, *id, OrgRole::Owner).await?;
        }

        let owner_id = if self.authz.is_platform_admin(&caller.id).await? {
            None
        } else {
            Some(caller.id.as_str())
        };
        self.repo.remove_orgs(ids, owner_id).await?;
        tracing::info!(org_ids = ?ids, caller = %caller.id, "Orgs removed");
        Ok(())
    }

    /// Internal lookup, no authorization.
    pub async fn get_owner_id_by_org(&self, id: Uuid) -> ServiceResult<String> {
        Ok(self.load(id).await?.owner_id)
    }

    /// Membership of `member_id` in `org_id`. Members may view their own
    /// membership; viewing someone else's requires the Viewer role.
    pub async fn view_membership(
        &self,
        token: &str,
        org_id: Uuid,
        member_id: &str,
    ) -> ServiceResult<OrgMembership> {
        if member_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        let caller = self.tokens.identify(token).await?;
        if caller.id != member_id {
            self.authz
                .require_org_role(&caller, org_id, OrgRole::Viewer)
                .await?;
        }
        self.repo
            .find_membership(org_id, member_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Membership not found"))
    }

    pub async fn list_members(
        &self,
        token: &str,
        org_id: Uuid,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgMembership>> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Viewer)
            .await?;
        self.repo.list_members(org_id, page).await
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn assign_member(
        &self,
        token: &str,
        org_id: Uuid,
        member_id: &str,
        role: OrgRole,
    ) -> ServiceResult<OrgMembership> {
        if member_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        if role == OrgRole::Owner {
            return Err(ServiceError::invalid(
                "Owner role can only be granted by ownership transfer",
            ));
        }
        self.authz.can_access_org(token, org_id, OrgRole::Admin).await?;

        let membership = OrgMembership::new(org_id, member_id.to_string(), role);
        self.repo.save_membership(&membership).await?;
        tracing::info!(%org_id, member_id, %role, "Member assigned");
        Ok(membership)
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn update_member_role(
        &self,
        token: &str,
        org_id: Uuid,
        member_id: &str,
        role: OrgRole,
    ) -> ServiceResult<OrgMembership> {
        if member_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        if role == OrgRole::Owner {
            return Err(ServiceError::invalid(
                "Owner role can only be granted by ownership transfer",
            ));
        }
        self.authz.can_access_org(token, org_id, OrgRole::Admin).await?;

        let current = self
            .repo
            .find_membership(org_id, member_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Membership not found"))?;
        if current.role == OrgRole::Owner {
            return Err(ServiceError::conflict("The owner's role cannot be changed"));
        }

        let now = Utc::now();
        self.repo
            .update_membership_role(org_id, member_id, role, now)
            .await?;
        Ok(OrgMembership {
            role,
            updated_at: now,
            ..current
        })
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn remove_member(
        &self,
        token: &str,
        org_id: Uuid,
        member_id: &str,
    ) -> ServiceResult<()> {
        if member_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        self.authz.can_access_org(token, org_id, OrgRole::Admin).await?;

        if self.load(org_id).await?.owner_id == member_id {
            return Err(ServiceError::conflict("The owner cannot be removed"));
        }
        if !self.repo.remove_membership(org_id, member_id).await? {
            return Err(ServiceError::not_found("Membership not found"));
        }
        tracing::info!(%org_id, member_id, "Member removed");
        Ok(())
    }

    /// Hand the org to an existing member. The previous owner stays on as
    /// Admin.
    #[tracing::instrument(skip(self, token))]
    pub async fn transfer_ownership(
        &self,
        token: &str,
        org_id: Uuid,
        new_owner_id: &str,
    ) -> ServiceResult<Org> {
        if new_owner_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        self.authz.can_access_org(token, org_id, OrgRole::Owner).await?;

        let org = self.load(org_id).await?;
        if org.owner_id == new_owner_id {
            return Ok(org);
        }
        if self.repo.find_membership(org_id, new_owner_id).await?.is_none() {
            return Err(ServiceError::invalid("New owner must already be a member"));
        }

        self.repo
            .transfer_ownership(org_id, &org.owner_id, new_owner_id, Utc::now())
            .await?;
        tracing::info!(%org_id, from = %org.owner_id, to = new_owner_id, "Ownership transferred");
        self.load(org_id).await
    }
}
