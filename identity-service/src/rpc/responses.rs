//! One result type per RPC method.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Identity, IssuedKey, Key, KeyType, Org, OrgInvite, OrgMembership, OrgRole, Page,
    PlatformRole,
};

/// Acknowledgement with no payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize)]
pub struct IssueResponse {
    pub id: Uuid,
    pub key_type: KeyType,
    /// The credential. Shown once.
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<IssuedKey> for IssueResponse {
    fn from(key: IssuedKey) -> Self {
        Self {
            id: key.id,
            key_type: key.key_type,
            value: key.secret,
            expires_at: key.expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleResponse {
    pub role: PlatformRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerIdResponse {
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipResponse {
    pub member_id: String,
    pub org_id: Uuid,
    pub role: OrgRole,
}

impl From<OrgMembership> for MembershipResponse {
    fn from(m: OrgMembership) -> Self {
        Self {
            member_id: m.member_id,
            org_id: m.org_id,
            role: m.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InviteIdResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RespondResponse {
    /// Present when the invite was accepted.
    pub membership: Option<MembershipResponse>,
}

/// Result of any RPC method. Serialized as the bare payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Issue(IssueResponse),
    Identify(IdentityResponse),
    ValidateRecovery(IdentityResponse),
    RetrieveKey(Key),
    RevokeKey(Empty),
    ListKeys(Page<Key>),
    Authorize(Empty),
    AssignRole(Empty),
    RetrieveRole(RoleResponse),
    CreateOrg(Org),
    UpdateOrg(Org),
    ViewOrg(Org),
    ListOrgs(Page<Org>),
    RemoveOrgs(Empty),
    GetOwnerIdByOrg(OwnerIdResponse),
    ViewOrgMembership(MembershipResponse),
    ListMembers(Page<MembershipResponse>),
    AssignMember(MembershipResponse),
    UpdateMemberRole(MembershipResponse),
    RemoveMember(Empty),
    TransferOwnership(Org),
    CreateOrgInvite(OrgInvite),
    CreateDormantOrgInvite(InviteIdResponse),
    ActivateOrgInvite(InviteIdResponse),
    GetDormantInviteByPlatformInvite(OrgInvite),
    RespondOrgInvite(RespondResponse),
    RevokeOrgInvite(Empty),
    ViewOrgInvite(OrgInvite),
    ListSentInvites(Page<OrgInvite>),
    ListReceivedInvites(Page<OrgInvite>),
}

pub(crate) fn member_page(page: Page<OrgMembership>) -> Page<MembershipResponse> {
    Page {
        total: page.total,
        offset: page.offset,
        limit: page.limit,
        items: page.items.into_iter().map(Into::into).collect(),
    }
}
