//! Authorization Evaluator and platform role store.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Action, Identity, OrgRole, PlatformRole, RoleAssignment};
use crate::repository::Repository;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::tokens::TokenService;

/// Scope an authorization request is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Platform scope; only platform admins pass.
    Root,
    /// Org scope; the object is an org id.
    Organizations,
}

impl std::str::FromStr for Subject {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Subject::Root),
            "organizations" => Ok(Subject::Organizations),
            other => Err(ServiceError::invalid(format!("Unknown subject: {}", other))),
        }
    }
}

pub struct AuthzService {
    repo: Arc<dyn Repository>,
    tokens: Arc<TokenService>,
}

impl AuthzService {
    pub fn new(repo: Arc<dyn Repository>, tokens: Arc<TokenService>) -> Self {
        Self { repo, tokens }
    }

    /// Decide whether the caller behind `token` may perform `action` on
    /// `object` within `subject`. Input is validated before the token is
    /// looked at.
    #[tracing::instrument(skip(self, token))]
    pub async fn authorize(
        &self,
        token: &str,
        object: &str,
        subject: &str,
        action: &str,
    ) -> ServiceResult<Identity> {
        let subject: Subject = subject.parse()?;
        let action: Action = action.parse().map_err(ServiceError::InvalidArgument)?;
        let org_id = match subject {
            Subject::Root => None,
            Subject::Organizations => Some(
                Uuid::parse_str(object)
                    .map_err(|_| ServiceError::invalid("Object must be an org id"))?,
            ),
        };

        let caller = self.tokens.identify(token).await?;
        if self.is_platform_admin(&caller.id).await? {
            return Ok(caller);
        }

        let Some(org_id) = org_id else {
            tracing::warn!(caller = %caller.id, "Platform-scoped action denied");
            return Err(ServiceError::forbidden("Platform admin role required"));
        };

        let role = self
            .repo
            .find_membership(org_id, &caller.id)
            .await?
            .map(|m| m.role);
        match role {
            Some(role) if role.satisfies(action.required_role()) => Ok(caller),
            _ => {
                tracing::warn!(caller = %caller.id, %org_id, ?action, "Authorization denied");
                Err(ServiceError::forbidden("Insufficient org role"))
            }
        }
    }

    /// Org-scoped access predicate. Returns the caller on success.
    ///
    /// Platform admins always pass. Everyone else needs a membership in an
    /// existing org whose role satisfies `required`.
    pub async fn can_access_org(
        &self,
        token: &str,
        org_id: Uuid,
        required: OrgRole,
    ) -> ServiceResult<Identity> {
        let caller = self.tokens.identify(token).await?;
        self.require_org_role(&caller, org_id, required).await?;
        Ok(caller)
    }

    /// Same as [`AuthzService::can_access_org`] for an already resolved caller.
    pub async fn require_org_role(
        &self,
        caller: &Identity,
        org_id: Uuid,
        required: OrgRole,
    ) -> ServiceResult<()> {
        if self.repo.find_org(org_id).await?.is_none() {
            return Err(ServiceError::not_found("Org not found"));
        }
        if self.is_platform_admin(&caller.id).await? {
            return Ok(());
        }
        match self.repo.find_membership(org_id, &caller.id).await? {
            Some(m) if m.role.satisfies(required) => Ok(()),
            _ => {
                tracing::warn!(caller = %caller.id, %org_id, %required, "Org access denied");
                Err(ServiceError::forbidden(format!(
                    "Org role {} required",
                    required
                )))
            }
        }
    }

    pub async fn is_platform_admin(&self, entity_id: &str) -> ServiceResult<bool> {
        Ok(self.repo.find_role(entity_id).await? == Some(PlatformRole::Admin))
    }

    /// Assign a platform role. Re-assignment overwrites; assigning the same
    /// role twice is a successful no-op.
    #[tracing::instrument(skip(self))]
    pub async fn assign_role(&self, entity_id: &str, role: &str) -> ServiceResult<()> {
        if entity_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        if role.is_empty() {
            return Err(ServiceError::MissingRole);
        }
        let role: PlatformRole = role.parse().map_err(ServiceError::InvalidArgument)?;
        self.repo
            .upsert_role(&RoleAssignment::new(entity_id.to_string(), role))
            .await?;
        tracing::info!(entity_id, %role, "Platform role assigned");
        Ok(())
    }

    pub async fn retrieve_role(&self, entity_id: &str) -> ServiceResult<PlatformRole> {
        if entity_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        self.repo
            .find_role(entity_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role not found"))
    }
}
