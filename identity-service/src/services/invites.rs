//! Org Invite Workflow.
//!
//! ```text
//! Pending --accept--> Accepted
//! Pending --decline--> Declined
//! Pending --revoke--> Revoked
//! Pending --TTL--> Expired   (applied lazily when the invite is read)
//! ```
//!
//! Dormant invites carry a platform invite id and stay unbound until the
//! invitee registers and [`InviteService::activate_invite`] binds their user
//! id. Activation keeps the invite `Pending`; the invitee still responds.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::config::InviteConfig;
use crate::models::{
    Identity, InviteClosed, InviteState, NewInvite, OrgInvite, OrgMembership, OrgRole, Page,
    PageParams,
};
use crate::repository::Repository;
use crate::services::authz::AuthzService;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notifier::{invite_link, InviteNotifier};
use crate::services::tokens::TokenService;

/// Invite to create. `invitee_id` is known when the invitee already has an
/// account.
#[derive(Debug, Clone)]
pub struct CreateInvite {
    pub invitee_email: String,
    pub invitee_id: Option<String>,
    pub role: OrgRole,
    pub redirect_path: String,
}

pub struct InviteService {
    repo: Arc<dyn Repository>,
    tokens: Arc<TokenService>,
    authz: Arc<AuthzService>,
    notifier: Arc<dyn InviteNotifier>,
    config: InviteConfig,
}

fn validate_target(email: &str, role: OrgRole) -> ServiceResult<()> {
    if email.is_empty() {
        return Err(ServiceError::invalid("Missing invitee email"));
    }
    if !email.validate_email() {
        return Err(ServiceError::invalid("Invalid invitee email"));
    }
    if role == OrgRole::Owner {
        return Err(ServiceError::invalid("Invites cannot grant the owner role"));
    }
    Ok(())
}

fn validate_redirect(path: &str) -> ServiceResult<()> {
    if !path.starts_with('/') || path.starts_with("//") {
        return Err(ServiceError::invalid(
            "Redirect path must be a relative path starting with '/'",
        ));
    }
    Ok(())
}

fn closed_error(closed: InviteClosed) -> ServiceError {
    match closed {
        InviteClosed::Expired => ServiceError::conflict("Invite expired"),
        InviteClosed::Terminal(state) => {
            ServiceError::conflict(format!("Invite already {}", state))
        }
    }
}

impl InviteService {
    pub fn new(
        repo: Arc<dyn Repository>,
        tokens: Arc<TokenService>,
        authz: Arc<AuthzService>,
        notifier: Arc<dyn InviteNotifier>,
        config: InviteConfig,
    ) -> Self {
        Self {
            repo,
            tokens,
            authz,
            notifier,
            config,
        }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<OrgInvite> {
        self.repo
            .find_invite(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invite not found"))
    }

    /// Persist the lazy `Pending -> Expired` transition for an invite read
    /// past its expiry, and return what the caller should see.
    async fn settle_expiry(&self, mut invite: OrgInvite) -> ServiceResult<OrgInvite> {
        let now = Utc::now();
        if invite.state == InviteState::Pending && invite.is_past_expiry(now) {
            self.repo
                .close_invite(invite.id, InviteState::Expired, now)
                .await?;
            invite.state = InviteState::Expired;
            invite.responded_at.get_or_insert(now);
        }
        Ok(invite)
    }

    /// Check that a fresh invite for `email` does not collide with an
    /// existing member or a live pending invite.
    async fn ensure_no_duplicate(
        &self,
        org_id: Uuid,
        email: &str,
        invitee_id: Option<&str>,
    ) -> ServiceResult<()> {
        if let Some(id) = invitee_id {
            if self.repo.find_membership(org_id, id).await?.is_some() {
                return Err(ServiceError::conflict("Invitee is already a member"));
            }
        }
        if let Some(existing) = self.repo.find_pending_invite(org_id, email).await? {
            let existing = self.settle_expiry(existing).await?;
            if existing.state == InviteState::Pending {
                return Err(ServiceError::conflict(
                    "A pending invite for this email already exists",
                ));
            }
        }
        Ok(())
    }

    async fn notify(&self, invite: &OrgInvite, redirect_path: &str) {
        let link = invite_link(&self.config.base_url, redirect_path, invite);
        if let Err(e) = self.notifier.send_invite(invite, &link).await {
            tracing::error!(invite_id = %invite.id, error = %e, "Invite notification failed");
        }
    }

    fn expires_at(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::hours(self.config.expiry_hours)
    }

    /// Invite someone to `org_id`. The inviter needs the Admin role.
    #[tracing::instrument(skip(self, token, req), fields(role = %req.role))]
    pub async fn create_invite(
        &self,
        token: &str,
        org_id: Uuid,
        req: CreateInvite,
    ) -> ServiceResult<OrgInvite> {
        validate_target(&req.invitee_email, req.role)?;
        validate_redirect(&req.redirect_path)?;
        let inviter = self
            .authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;

        let org = self
            .repo
            .find_org(org_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Org not found"))?;
        self.ensure_no_duplicate(org_id, &req.invitee_email, req.invitee_id.as_deref())
            .await?;

        let invite = OrgInvite::new(NewInvite {
            org_id,
            org_name: org.name,
            invitee_id: req.invitee_id,
            invitee_email: req.invitee_email,
            invitee_role: req.role,
            inviter_id: inviter.id,
            inviter_email: inviter.email,
            expires_at: self.expires_at(),
            platform_invite_id: None,
        });
        self.repo.save_invite(&invite).await?;
        tracing::info!(invite_id = %invite.id, %org_id, "Org invite created");

        self.notify(&invite, &req.redirect_path).await;
        Ok(invite)
    }

    /// Invite someone who has no platform account yet. The invite waits for
    /// [`InviteService::activate_invite`] with the same `platform_invite_id`.
    #[tracing::instrument(skip(self, token))]
    pub async fn create_dormant_invite(
        &self,
        token: &str,
        org_id: Uuid,
        invitee_email: &str,
        role: OrgRole,
        platform_invite_id: &str,
    ) -> ServiceResult<OrgInvite> {
        validate_target(invitee_email, role)?;
        if platform_invite_id.is_empty() {
            return Err(ServiceError::invalid("Missing platform invite id"));
        }
        let inviter = self
            .authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;

        let org = self
            .repo
            .find_org(org_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Org not found"))?;
        self.ensure_no_duplicate(org_id, invitee_email, None).await?;

        let invite = OrgInvite::new(NewInvite {
            org_id,
            org_name: org.name,
            invitee_id: None,
            invitee_email: invitee_email.to_string(),
            invitee_role: role,
            inviter_id: inviter.id,
            inviter_email: inviter.email,
            expires_at: self.expires_at(),
            platform_invite_id: Some(platform_invite_id.to_string()),
        });
        self.repo.save_invite(&invite).await?;
        tracing::info!(invite_id = %invite.id, %org_id, "Dormant org invite created");
        Ok(invite)
    }

    /// Bind a dormant invite to the user that completed registration.
    /// Calling it again for the same user returns the invite unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn activate_invite(
        &self,
        platform_invite_id: &str,
        user_id: &str,
        redirect_path: &str,
    ) -> ServiceResult<OrgInvite> {
        if platform_invite_id.is_empty() {
            return Err(ServiceError::invalid("Missing platform invite id"));
        }
        if user_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        validate_redirect(redirect_path)?;

        let invite = self.get_dormant_by_platform_invite(platform_invite_id).await?;
        match invite.invitee_id.as_deref() {
            Some(bound) if bound == user_id => return Ok(invite),
            Some(_) => {
                return Err(ServiceError::conflict(
                    "Invite already activated for another user",
                ))
            }
            None => {}
        }

        let invite = self.settle_expiry(invite).await?;
        invite.ensure_open(Utc::now()).map_err(closed_error)?;

        let now = Utc::now();
        if !self.repo.activate_invite(invite.id, user_id, now).await? {
            // lost a race with another activation or a state change
            let current = self.load(invite.id).await?;
            if current.invitee_id.as_deref() == Some(user_id) {
                return Ok(current);
            }
            return Err(ServiceError::conflict("Invite can no longer be activated"));
        }

        let invite = OrgInvite {
            invitee_id: Some(user_id.to_string()),
            activated_at: Some(now),
            ..invite
        };
        tracing::info!(invite_id = %invite.id, user_id, "Dormant org invite activated");
        self.notify(&invite, redirect_path).await;
        Ok(invite)
    }

    /// Accept or decline. Accepting creates the membership in the same
    /// transaction and returns it.
    #[tracing::instrument(skip(self, token))]
    pub async fn respond(
        &self,
        token: &str,
        invite_id: Uuid,
        accept: bool,
    ) -> ServiceResult<Option<OrgMembership>> {
        let caller = self.tokens.identify(token).await?;
        let invite = self.load(invite_id).await?;

        if !invite.is_addressed_to(&caller.id, &caller.email) {
            tracing::warn!(%invite_id, caller = %caller.id, "Response from non-invitee");
            return Err(ServiceError::forbidden("Only the invitee may respond"));
        }

        let now = Utc::now();
        if let Err(closed) = invite.ensure_open(now) {
            if closed == InviteClosed::Expired {
                self.repo
                    .close_invite(invite_id, InviteState::Expired, now)
                    .await?;
            }
            return Err(closed_error(closed));
        }
        if invite.is_dormant() {
            return Err(ServiceError::conflict("Invite is not activated yet"));
        }

        if accept {
            let membership =
                OrgMembership::new(invite.org_id, caller.id.clone(), invite.invitee_role);
            self.repo.accept_invite(invite_id, &membership, now).await?;
            tracing::info!(%invite_id, org_id = %invite.org_id, member_id = %caller.id, "Org invite accepted");
            Ok(Some(membership))
        } else {
            if !self
                .repo
                .close_invite(invite_id, InviteState::Declined, now)
                .await?
            {
                return Err(ServiceError::conflict("Invite is no longer pending"));
            }
            tracing::info!(%invite_id, caller = %caller.id, "Org invite declined");
            Ok(None)
        }
    }

    /// Withdraw a pending invite. Allowed for its inviter and org admins.
    #[tracing::instrument(skip(self, token))]
    pub async fn revoke(&self, token: &str, invite_id: Uuid) -> ServiceResult<()> {
        let caller = self.tokens.identify(token).await?;
        let invite = self.load(invite_id).await?;
        if invite.inviter_id != caller.id {
            self.authz
                .require_org_role(&caller, invite.org_id, OrgRole::Admin)
                .await?;
        }

        let invite = self.settle_expiry(invite).await?;
        invite.ensure_open(Utc::now()).map_err(closed_error)?;

        if !self
            .repo
            .close_invite(invite_id, InviteState::Revoked, Utc::now())
            .await?
        {
            return Err(ServiceError::conflict("Invite is no longer pending"));
        }
        tracing::info!(%invite_id, caller = %caller.id, "Org invite revoked");
        Ok(())
    }

    /// Visible to the invitee, the inviter and org admins.
    pub async fn view_invite(&self, token: &str, invite_id: Uuid) -> ServiceResult<OrgInvite> {
        let caller = self.tokens.identify(token).await?;
        let invite = self.load(invite_id).await?;
        if !invite.is_addressed_to(&caller.id, &caller.email) && invite.inviter_id != caller.id {
            self.authz
                .require_org_role(&caller, invite.org_id, OrgRole::Admin)
                .await?;
        }
        self.settle_expiry(invite).await
    }

    async fn require_self_or_admin(&self, caller: &Identity, user_id: &str) -> ServiceResult<()> {
        if caller.id == user_id || self.authz.is_platform_admin(&caller.id).await? {
            return Ok(());
        }
        Err(ServiceError::forbidden("Cannot list another user's invites"))
    }

    fn present(mut page: Page<OrgInvite>) -> Page<OrgInvite> {
        let now = Utc::now();
        for invite in &mut page.items {
            invite.state = invite.state_at(now);
        }
        page
    }

    pub async fn list_sent(
        &self,
        token: &str,
        user_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>> {
        let caller = self.tokens.identify(token).await?;
        self.require_self_or_admin(&caller, user_id).await?;
        Ok(Self::present(
            self.repo.list_invites_by_inviter(user_id, page).await?,
        ))
    }

    /// Invites bound to `user_id`, plus unbound ones sent to the caller's
    /// email when the caller is that user.
    pub async fn list_received(
        &self,
        token: &str,
        user_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>> {
        let caller = self.tokens.identify(token).await?;
        self.require_self_or_admin(&caller, user_id).await?;
        let email = if caller.id == user_id {
            caller.email.as_str()
        } else {
            ""
        };
        Ok(Self::present(
            self.repo
                .list_invites_for_invitee(user_id, email, page)
                .await?,
        ))
    }

    /// Internal lookup used by the registration workflow; no authorization.
    pub async fn get_dormant_by_platform_invite(
        &self,
        platform_invite_id: &str,
    ) -> ServiceResult<OrgInvite> {
        if platform_invite_id.is_empty() {
            return Err(ServiceError::invalid("Missing platform invite id"));
        }
        self.repo
            .find_invite_by_platform_invite(platform_invite_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invite not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_must_be_relative() {
        assert!(validate_redirect("/orgs").is_ok());
        assert!(validate_redirect("https://evil.example.com").is_err());
        assert!(validate_redirect("//evil.example.com").is_err());
        assert!(validate_redirect("").is_err());
    }

    #[test]
    fn test_owner_role_cannot_be_invited() {
        assert!(validate_target("bob@example.com", OrgRole::Admin).is_ok());
        assert!(matches!(
            validate_target("bob@example.com", OrgRole::Owner),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(validate_target("not-an-email", OrgRole::Viewer).is_err());
    }
}
