//! RPC boundary.
//!
//! Each method has its own request and result type. [`RpcRequest`] is the
//! tagged union of all requests (`{"method": "...", "params": {...}}` on the
//! JSON mapping) and [`Dispatcher`] routes a validated request to the owning
//! service.

mod dispatcher;
pub mod requests;
pub mod responses;

pub use dispatcher::Dispatcher;
pub use responses::RpcResponse;

use serde::Deserialize;

use crate::services::error::ServiceResult;
use requests::*;

/// Shape check run before a request is dispatched.
pub trait Validate {
    fn validate(&self) -> ServiceResult<()>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RpcRequest {
    Issue(IssueRequest),
    Identify(IdentifyRequest),
    ValidateRecovery(ValidateRecoveryRequest),
    RetrieveKey(KeyRequest),
    RevokeKey(KeyRequest),
    ListKeys(ListKeysRequest),
    Authorize(AuthorizeRequest),
    AssignRole(AssignRoleRequest),
    RetrieveRole(RetrieveRoleRequest),
    CreateOrg(CreateOrgRequest),
    UpdateOrg(UpdateOrgRequest),
    ViewOrg(OrgRequest),
    ListOrgs(ListOrgsRequest),
    RemoveOrgs(RemoveOrgsRequest),
    GetOwnerIdByOrg(OwnerIdRequest),
    ViewOrgMembership(MembershipRequest),
    ListMembers(ListMembersRequest),
    AssignMember(MemberRoleRequest),
    UpdateMemberRole(MemberRoleRequest),
    RemoveMember(MembershipRequest),
    TransferOwnership(TransferOwnershipRequest),
    CreateOrgInvite(CreateOrgInviteRequest),
    CreateDormantOrgInvite(CreateDormantOrgInviteRequest),
    ActivateOrgInvite(ActivateOrgInviteRequest),
    GetDormantInviteByPlatformInvite(DormantInviteRequest),
    RespondOrgInvite(RespondOrgInviteRequest),
    RevokeOrgInvite(InviteRequest),
    ViewOrgInvite(InviteRequest),
    ListSentInvites(ListInvitesRequest),
    ListReceivedInvites(ListInvitesRequest),
}

impl RpcRequest {
    /// Wire name of the method, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            RpcRequest::Issue(_) => "issue",
            RpcRequest::Identify(_) => "identify",
            RpcRequest::ValidateRecovery(_) => "validate_recovery",
            RpcRequest::RetrieveKey(_) => "retrieve_key",
            RpcRequest::RevokeKey(_) => "revoke_key",
            RpcRequest::ListKeys(_) => "list_keys",
            RpcRequest::Authorize(_) => "authorize",
            RpcRequest::AssignRole(_) => "assign_role",
            RpcRequest::RetrieveRole(_) => "retrieve_role",
            RpcRequest::CreateOrg(_) => "create_org",
            RpcRequest::UpdateOrg(_) => "update_org",
            RpcRequest::ViewOrg(_) => "view_org",
            RpcRequest::ListOrgs(_) => "list_orgs",
            RpcRequest::RemoveOrgs(_) => "remove_orgs",
            RpcRequest::GetOwnerIdByOrg(_) => "get_owner_id_by_org",
            RpcRequest::ViewOrgMembership(_) => "view_org_membership",
            RpcRequest::ListMembers(_) => "list_members",
            RpcRequest::AssignMember(_) => "assign_member",
            RpcRequest::UpdateMemberRole(_) => "update_member_role",
            RpcRequest::RemoveMember(_) => "remove_member",
            RpcRequest::TransferOwnership(_) => "transfer_ownership",
            RpcRequest::CreateOrgInvite(_) => "create_org_invite",
            RpcRequest::CreateDormantOrgInvite(_) => "create_dormant_org_invite",
            RpcRequest::ActivateOrgInvite(_) => "activate_org_invite",
            RpcRequest::GetDormantInviteByPlatformInvite(_) => {
                "get_dormant_invite_by_platform_invite"
            }
            RpcRequest::RespondOrgInvite(_) => "respond_org_invite",
            RpcRequest::RevokeOrgInvite(_) => "revoke_org_invite",
            RpcRequest::ViewOrgInvite(_) => "view_org_invite",
            RpcRequest::ListSentInvites(_) => "list_sent_invites",
            RpcRequest::ListReceivedInvites(_) => "list_received_invites",
        }
    }
}

impl Validate for RpcRequest {
    fn validate(&self) -> ServiceResult<()> {
        match self {
            RpcRequest::Issue(r) => r.validate(),
            RpcRequest::Identify(r) => r.validate(),
            RpcRequest::ValidateRecovery(r) => r.validate(),
            RpcRequest::RetrieveKey(r) | RpcRequest::RevokeKey(r) => r.validate(),
            RpcRequest::ListKeys(r) => r.validate(),
            RpcRequest::Authorize(r) => r.validate(),
            RpcRequest::AssignRole(r) => r.validate(),
            RpcRequest::RetrieveRole(r) => r.validate(),
            RpcRequest::CreateOrg(r) => r.validate(),
            RpcRequest::UpdateOrg(r) => r.validate(),
            RpcRequest::ViewOrg(r) => r.validate(),
            RpcRequest::ListOrgs(r) => r.validate(),
            RpcRequest::RemoveOrgs(r) => r.validate(),
            RpcRequest::GetOwnerIdByOrg(r) => r.validate(),
            RpcRequest::ViewOrgMembership(r) | RpcRequest::RemoveMember(r) => r.validate(),
            RpcRequest::ListMembers(r) => r.validate(),
            RpcRequest::AssignMember(r) | RpcRequest::UpdateMemberRole(r) => r.validate(),
            RpcRequest::TransferOwnership(r) => r.validate(),
            RpcRequest::CreateOrgInvite(r) => r.validate(),
            RpcRequest::CreateDormantOrgInvite(r) => r.validate(),
            RpcRequest::ActivateOrgInvite(r) => r.validate(),
            RpcRequest::GetDormantInviteByPlatformInvite(r) => r.validate(),
            RpcRequest::RespondOrgInvite(r) => r.validate(),
            RpcRequest::RevokeOrgInvite(r) | RpcRequest::ViewOrgInvite(r) => r.validate(),
            RpcRequest::ListSentInvites(r) | RpcRequest::ListReceivedInvites(r) => r.validate(),
        }
    }
}
