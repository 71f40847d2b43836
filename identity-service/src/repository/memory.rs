use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{InviteRepository, KeyRepository, OrgRepository, Repository, RoleRepository};
use crate::models::{
    InviteState, Key, Org, OrgInvite, OrgMembership, OrgRole, Page, PageParams, PlatformRole,
    RoleAssignment, StoredKey,
};
use crate::services::error::{ServiceError, ServiceResult};

#[derive(Default)]
struct State {
    keys: HashMap<Uuid, StoredKey>,
    roles: HashMap<String, RoleAssignment>,
    orgs: HashMap<Uuid, Org>,
    memberships: HashMap<(Uuid, String), OrgMembership>,
    invites: HashMap<Uuid, OrgInvite>,
}

/// Single-process store used by tests and local runs.
///
/// Every operation runs under one lock, which gives the same all-or-nothing
/// behaviour the Postgres store gets from transactions. `fail_membership_writes`
/// injects a failure into the membership half of multi-row writes.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
    fail_membership_writes: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent membership insert fail with an internal error.
    pub fn fail_membership_writes(&self, fail: bool) {
        self.fail_membership_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }

    fn membership_fault(&self) -> ServiceResult<()> {
        if self.fail_membership_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Injected membership write failure"
            )));
        }
        Ok(())
    }
}

fn sorted_orgs<'a>(orgs: impl Iterator<Item = &'a Org>, page: &PageParams) -> Vec<Org> {
    let filter = page.name.as_ref().map(|n| n.to_lowercase());
    let mut out: Vec<Org> = orgs
        .filter(|o| {
            filter
                .as_ref()
                .map_or(true, |f| o.name.to_lowercase().contains(f.as_str()))
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    out
}

fn sorted_invites<'a>(invites: impl Iterator<Item = &'a OrgInvite>) -> Vec<OrgInvite> {
    let mut out: Vec<OrgInvite> = invites.cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    out
}

#[async_trait]
impl KeyRepository for InMemoryRepository {
    async fn save_key(&self, key: &StoredKey) -> ServiceResult<()> {
        let mut state = self.lock()?;
        if state.keys.contains_key(&key.key.id) {
            return Err(ServiceError::conflict("Key already exists"));
        }
        state.keys.insert(key.key.id, key.clone());
        Ok(())
    }

    async fn find_key_by_secret_hash(&self, secret_hash: &str) -> ServiceResult<Option<Key>> {
        let state = self.lock()?;
        Ok(state
            .keys
            .values()
            .find(|k| k.secret_hash == secret_hash)
            .map(|k| k.key.clone()))
    }

    async fn find_key(&self, issuer_id: &str, id: Uuid) -> ServiceResult<Option<Key>> {
        let state = self.lock()?;
        Ok(state
            .keys
            .get(&id)
            .filter(|k| k.key.issuer_id == issuer_id)
            .map(|k| k.key.clone()))
    }

    async fn list_keys(&self, issuer_id: &str, page: &PageParams) -> ServiceResult<Page<Key>> {
        let state = self.lock()?;
        let mut keys: Vec<Key> = state
            .keys
            .values()
            .filter(|k| k.key.issuer_id == issuer_id)
            .map(|k| k.key.clone())
            .collect();
        keys.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_all(keys, page))
    }

    async fn remove_key(&self, issuer_id: &str, id: Uuid) -> ServiceResult<bool> {
        let mut state = self.lock()?;
        let owned = state
            .keys
            .get(&id)
            .is_some_and(|k| k.key.issuer_id == issuer_id);
        if owned {
            state.keys.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl RoleRepository for InMemoryRepository {
    async fn upsert_role(&self, assignment: &RoleAssignment) -> ServiceResult<()> {
        self.lock()?
            .roles
            .insert(assignment.entity_id.clone(), assignment.clone());
        Ok(())
    }

    async fn find_role(&self, entity_id: &str) -> ServiceResult<Option<PlatformRole>> {
        Ok(self.lock()?.roles.get(entity_id).map(|a| a.role))
    }
}

#[async_trait]
impl OrgRepository for InMemoryRepository {
    async fn create_org_with_owner(&self, org: &Org, owner: &OrgMembership) -> ServiceResult<()> {
        let mut state = self.lock()?;
        if state.orgs.contains_key(&org.id) {
            return Err(ServiceError::conflict("Org already exists"));
        }
        state.orgs.insert(org.id, org.clone());

        if let Err(e) = self.membership_fault() {
            // roll back the org row
            state.orgs.remove(&org.id);
            return Err(e);
        }
        state
            .memberships
            .insert((owner.org_id, owner.member_id.clone()), owner.clone());
        Ok(())
    }

    async fn find_org(&self, id: Uuid) -> ServiceResult<Option<Org>> {
        Ok(self.lock()?.orgs.get(&id).cloned())
    }

    async fn update_org(&self, org: &Org) -> ServiceResult<()> {
        let mut state = self.lock()?;
        match state.orgs.get_mut(&org.id) {
            Some(existing) => {
                *existing = org.clone();
                Ok(())
            }
            None => Err(ServiceError::not_found("Org not found")),
        }
    }

    async fn list_orgs(&self, page: &PageParams) -> ServiceResult<Page<Org>> {
        let state = self.lock()?;
        Ok(Page::from_all(sorted_orgs(state.orgs.values(), page), page))
    }

    async fn list_orgs_for_member(
        &self,
        member_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<Org>> {
        let state = self.lock()?;
        let orgs = state
            .orgs
            .values()
            .filter(|o| state.memberships.contains_key(&(o.id, member_id.to_string())));
        Ok(Page::from_all(sorted_orgs(orgs, page), page))
    }

    async fn remove_orgs(&self, ids: &[Uuid], owner_id: Option<&str>) -> ServiceResult<()> {
        let mut state = self.lock()?;
        for id in ids {
            let Some(org) = state.orgs.get(id) else {
                return Err(ServiceError::not_found(format!("Org {} not found", id)));
            };
            if owner_id.is_some_and(|owner| owner != org.owner_id) {
                return Err(ServiceError::forbidden(format!(
                    "Only the owner may remove org {}",
                    id
                )));
            }
        }
        if let Some(id) = ids.iter().find(|id| {
            state.memberships.keys().filter(|(org_id, _)| org_id == *id).count() > 1
        }) {
            return Err(ServiceError::conflict(format!("Org {} still has members", id)));
        }

        for id in ids {
            state.orgs.remove(id);
        }
        state.memberships.retain(|(org_id, _), _| !ids.contains(org_id));
        state.invites.retain(|_, inv| !ids.contains(&inv.org_id));
        Ok(())
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        member_id: &str,
    ) -> ServiceResult<Option<OrgMembership>> {
        Ok(self
            .lock()?
            .memberships
            .get(&(org_id, member_id.to_string()))
            .cloned())
    }

    async fn list_members(
        &self,
        org_id: Uuid,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgMembership>> {
        let state = self.lock()?;
        let mut members: Vec<OrgMembership> = state
            .memberships
            .values()
            .filter(|m| m.org_id == org_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.member_id.cmp(&b.member_id))
        });
        Ok(Page::from_all(members, page))
    }

    async fn save_membership(&self, membership: &OrgMembership) -> ServiceResult<()> {
        self.membership_fault()?;
        let mut state = self.lock()?;
        if !state.orgs.contains_key(&membership.org_id) {
            return Err(ServiceError::not_found("Org not found"));
        }
        let key = (membership.org_id, membership.member_id.clone());
        if state.memberships.contains_key(&key) {
            return Err(ServiceError::conflict("Member already belongs to org"));
        }
        state.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn update_membership_role(
        &self,
        org_id: Uuid,
        member_id: &str,
        role: OrgRole,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let mut state = self.lock()?;
        match state.memberships.get_mut(&(org_id, member_id.to_string())) {
            Some(m) => {
                m.role = role;
                m.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_membership(&self, org_id: Uuid, member_id: &str) -> ServiceResult<bool> {
        Ok(self
            .lock()?
            .memberships
            .remove(&(org_id, member_id.to_string()))
            .is_some())
    }

    async fn transfer_ownership(
        &self,
        org_id: Uuid,
        current_owner: &str,
        new_owner: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.lock()?;
        let old_key = (org_id, current_owner.to_string());
        let new_key = (org_id, new_owner.to_string());
        if !state.memberships.contains_key(&new_key) {
            return Err(ServiceError::not_found("New owner is not a member of the org"));
        }
        let Some(org) = state.orgs.get_mut(&org_id) else {
            return Err(ServiceError::not_found("Org not found"));
        };
        org.owner_id = new_owner.to_string();
        org.updated_at = now;

        for (key, role) in [(old_key, OrgRole::Admin), (new_key, OrgRole::Owner)] {
            if let Some(m) = state.memberships.get_mut(&key) {
                m.role = role;
                m.updated_at = now;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InviteRepository for InMemoryRepository {
    async fn save_invite(&self, invite: &OrgInvite) -> ServiceResult<()> {
        let mut state = self.lock()?;
        let duplicate = state.invites.values().any(|existing| {
            let same_target = existing.org_id == invite.org_id
                && existing
                    .invitee_email
                    .eq_ignore_ascii_case(&invite.invitee_email)
                && existing.state == InviteState::Pending;
            let same_platform = invite.platform_invite_id.is_some()
                && existing.platform_invite_id == invite.platform_invite_id;
            same_target || same_platform
        });
        if duplicate {
            return Err(ServiceError::conflict("A pending invite already exists"));
        }
        if !state.orgs.contains_key(&invite.org_id) {
            return Err(ServiceError::not_found("Org not found"));
        }
        state.invites.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn find_invite(&self, id: Uuid) -> ServiceResult<Option<OrgInvite>> {
        Ok(self.lock()?.invites.get(&id).cloned())
    }

    async fn find_invite_by_platform_invite(
        &self,
        platform_invite_id: &str,
    ) -> ServiceResult<Option<OrgInvite>> {
        Ok(self
            .lock()?
            .invites
            .values()
            .find(|i| i.platform_invite_id.as_deref() == Some(platform_invite_id))
            .cloned())
    }

    async fn find_pending_invite(
        &self,
        org_id: Uuid,
        invitee_email: &str,
    ) -> ServiceResult<Option<OrgInvite>> {
        Ok(self
            .lock()?
            .invites
            .values()
            .find(|i| {
                i.org_id == org_id
                    && i.state == InviteState::Pending
                    && i.invitee_email.eq_ignore_ascii_case(invitee_email)
            })
            .cloned())
    }

    async fn activate_invite(
        &self,
        id: Uuid,
        invitee_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let mut state = self.lock()?;
        match state.invites.get_mut(&id) {
            Some(inv) if inv.state == InviteState::Pending && inv.invitee_id.is_none() => {
                inv.invitee_id = Some(invitee_id.to_string());
                inv.activated_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close_invite(
        &self,
        id: Uuid,
        to: InviteState,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let mut state = self.lock()?;
        match state.invites.get_mut(&id) {
            Some(inv) if inv.state == InviteState::Pending => {
                inv.state = to;
                inv.responded_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn accept_invite(
        &self,
        id: Uuid,
        membership: &OrgMembership,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.lock()?;
        match state.invites.get(&id) {
            Some(inv) if inv.state == InviteState::Pending => {}
            Some(_) => return Err(ServiceError::conflict("Invite is no longer pending")),
            None => return Err(ServiceError::not_found("Invite not found")),
        }
        let key = (membership.org_id, membership.member_id.clone());
        if state.memberships.contains_key(&key) {
            return Err(ServiceError::conflict("Member already belongs to org"));
        }
        self.membership_fault()?;

        state.memberships.insert(key, membership.clone());
        if let Some(inv) = state.invites.get_mut(&id) {
            inv.state = InviteState::Accepted;
            inv.responded_at = Some(now);
            inv.invitee_id = Some(membership.member_id.clone());
        }
        Ok(())
    }

    async fn list_invites_by_inviter(
        &self,
        inviter_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>> {
        let state = self.lock()?;
        let invites = sorted_invites(state.invites.values().filter(|i| i.inviter_id == inviter_id));
        Ok(Page::from_all(invites, page))
    }

    async fn list_invites_for_invitee(
        &self,
        invitee_id: &str,
        email: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>> {
        let state = self.lock()?;
        let invites = sorted_invites(
            state
                .invites
                .values()
                .filter(|i| i.is_addressed_to(invitee_id, email)),
        );
        Ok(Page::from_all(invites, page))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn health_check(&self) -> ServiceResult<()> {
        self.lock().map(|_| ())
    }
}
