use service_core::error::AppError;
use service_core::grpc::{IntoStatus, Status};

use super::requests::IssueRequest;
use super::responses::{
    member_page, Empty, IdentityResponse, InviteIdResponse, IssueResponse, MembershipResponse,
    OwnerIdResponse, RespondResponse, RoleResponse,
};
use super::{RpcRequest, RpcResponse, Validate};
use crate::services::error::ServiceResult;
use crate::services::invites::CreateInvite;
use crate::services::orgs::NewOrg;
use crate::services::tokens::IssueParams;
use crate::AppState;

/// Routes RPC requests to the services in [`AppState`].
#[derive(Clone)]
pub struct Dispatcher {
    state: AppState,
}

impl Dispatcher {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Validate and execute one request.
    #[tracing::instrument(skip(self, req), fields(method = req.method()))]
    pub async fn dispatch(&self, req: RpcRequest) -> ServiceResult<RpcResponse> {
        req.validate()?;
        let s = &self.state;

        let response = match req {
            RpcRequest::Issue(r) => RpcResponse::Issue(self.issue(r).await?.into()),
            RpcRequest::Identify(r) => {
                RpcResponse::Identify(s.tokens.identify(&r.token).await?.into())
            }
            RpcRequest::ValidateRecovery(r) => RpcResponse::ValidateRecovery(
                IdentityResponse::from(s.tokens.validate_recovery(&r.token).await?),
            ),
            RpcRequest::RetrieveKey(r) => {
                RpcResponse::RetrieveKey(s.tokens.retrieve_key(&r.token, r.id).await?)
            }
            RpcRequest::RevokeKey(r) => {
                s.tokens.revoke_key(&r.token, r.id).await?;
                RpcResponse::RevokeKey(Empty {})
            }
            RpcRequest::ListKeys(r) => {
                RpcResponse::ListKeys(s.tokens.list_keys(&r.token, &r.page).await?)
            }
            RpcRequest::Authorize(r) => {
                s.authz
                    .authorize(&r.token, &r.object, &r.subject, &r.action)
                    .await?;
                RpcResponse::Authorize(Empty {})
            }
            RpcRequest::AssignRole(r) => {
                s.authz.assign_role(&r.id, &r.role).await?;
                RpcResponse::AssignRole(Empty {})
            }
            RpcRequest::RetrieveRole(r) => RpcResponse::RetrieveRole(RoleResponse {
                role: s.authz.retrieve_role(&r.id).await?,
            }),
            RpcRequest::CreateOrg(r) => {
                let org = NewOrg {
                    name: r.name,
                    description: r.description,
                    metadata: r.metadata,
                };
                RpcResponse::CreateOrg(s.orgs.create_org(&r.token, org).await?)
            }
            RpcRequest::UpdateOrg(r) => {
                let update = r.update();
                RpcResponse::UpdateOrg(s.orgs.update_org(&r.token, r.id, update).await?)
            }
            RpcRequest::ViewOrg(r) => RpcResponse::ViewOrg(s.orgs.view_org(&r.token, r.id).await?),
            RpcRequest::ListOrgs(r) => {
                RpcResponse::ListOrgs(s.orgs.list_orgs(&r.token, &r.page).await?)
            }
            RpcRequest::RemoveOrgs(r) => {
                s.orgs.remove_orgs(&r.token, &r.ids).await?;
                RpcResponse::RemoveOrgs(Empty {})
            }
            RpcRequest::GetOwnerIdByOrg(r) => RpcResponse::GetOwnerIdByOrg(OwnerIdResponse {
                owner_id: s.orgs.get_owner_id_by_org(r.id).await?,
            }),
            RpcRequest::ViewOrgMembership(r) => RpcResponse::ViewOrgMembership(
                s.orgs
                    .view_membership(&r.token, r.org_id, &r.member_id)
                    .await?
                    .into(),
            ),
            RpcRequest::ListMembers(r) => RpcResponse::ListMembers(member_page(
                s.orgs.list_members(&r.token, r.org_id, &r.page).await?,
            )),
            RpcRequest::AssignMember(r) => RpcResponse::AssignMember(
                s.orgs
                    .assign_member(&r.token, r.org_id, &r.member_id, r.role)
                    .await?
                    .into(),
            ),
            RpcRequest::UpdateMemberRole(r) => RpcResponse::UpdateMemberRole(
                s.orgs
                    .update_member_role(&r.token, r.org_id, &r.member_id, r.role)
                    .await?
                    .into(),
            ),
            RpcRequest::RemoveMember(r) => {
                s.orgs
                    .remove_member(&r.token, r.org_id, &r.member_id)
                    .await?;
                RpcResponse::RemoveMember(Empty {})
            }
            RpcRequest::TransferOwnership(r) => RpcResponse::TransferOwnership(
                s.orgs
                    .transfer_ownership(&r.token, r.org_id, &r.new_owner_id)
                    .await?,
            ),
            RpcRequest::CreateOrgInvite(r) => {
                let invite = CreateInvite {
                    invitee_email: r.invitee_email,
                    invitee_id: r.invitee_id,
                    role: r.role,
                    redirect_path: r.redirect_path,
                };
                RpcResponse::CreateOrgInvite(
                    s.invites.create_invite(&r.token, r.org_id, invite).await?,
                )
            }
            RpcRequest::CreateDormantOrgInvite(r) => {
                let invite = s
                    .invites
                    .create_dormant_invite(
                        &r.token,
                        r.org_id,
                        &r.invitee_email,
                        r.role,
                        &r.platform_invite_id,
                    )
                    .await?;
                RpcResponse::CreateDormantOrgInvite(InviteIdResponse { id: invite.id })
            }
            RpcRequest::ActivateOrgInvite(r) => {
                let invite = s
                    .invites
                    .activate_invite(&r.platform_invite_id, &r.user_id, &r.redirect_path)
                    .await?;
                RpcResponse::ActivateOrgInvite(InviteIdResponse { id: invite.id })
            }
            RpcRequest::GetDormantInviteByPlatformInvite(r) => {
                RpcResponse::GetDormantInviteByPlatformInvite(
                    s.invites
                        .get_dormant_by_platform_invite(&r.platform_invite_id)
                        .await?,
                )
            }
            RpcRequest::RespondOrgInvite(r) => {
                let membership = s.invites.respond(&r.token, r.invite_id, r.accept).await?;
                RpcResponse::RespondOrgInvite(RespondResponse {
                    membership: membership.map(MembershipResponse::from),
                })
            }
            RpcRequest::RevokeOrgInvite(r) => {
                s.invites.revoke(&r.token, r.invite_id).await?;
                RpcResponse::RevokeOrgInvite(Empty {})
            }
            RpcRequest::ViewOrgInvite(r) => {
                RpcResponse::ViewOrgInvite(s.invites.view_invite(&r.token, r.invite_id).await?)
            }
            RpcRequest::ListSentInvites(r) => RpcResponse::ListSentInvites(
                s.invites.list_sent(&r.token, &r.user_id, &r.page).await?,
            ),
            RpcRequest::ListReceivedInvites(r) => RpcResponse::ListReceivedInvites(
                s.invites
                    .list_received(&r.token, &r.user_id, &r.page)
                    .await?,
            ),
        };
        Ok(response)
    }

    /// Same as [`Dispatcher::dispatch`] with the error mapped to a gRPC
    /// status. `POST /rpc` transcodes the status back to HTTP.
    pub async fn call(&self, req: RpcRequest) -> Result<RpcResponse, Status> {
        self.dispatch(req)
            .await
            .map_err(|e| AppError::from(e).into_status())
    }

    async fn issue(&self, r: IssueRequest) -> ServiceResult<IssueResponse> {
        let params = IssueParams {
            key_type: r.key_type()?,
            issuer_id: r.issuer_id,
            subject: r.email,
            expires_at: r.expires_at,
        };
        Ok(self.state.tokens.issue(&r.token, params).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InviteConfig, JwtConfig, SecurityConfig};
    use crate::repository::InMemoryRepository;
    use crate::rpc::requests::{IdentifyRequest, RetrieveRoleRequest};
    use crate::services::{JwtService, MockNotifier};
    use service_core::grpc::{Code, ERROR_CODE_KEY};
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        let config = JwtConfig {
            private_key_path: String::new(),
            public_key_path: String::new(),
            issuer: "identity-test".to_string(),
            login_token_expiry_minutes: 60,
            recovery_token_expiry_minutes: 5,
        };
        let jwt = JwtService::from_rsa_pem(
            include_bytes!("../../tests/fixtures/jwt_private.pem"),
            include_bytes!("../../tests/fixtures/jwt_public.pem"),
            &config,
        )
        .unwrap();
        Dispatcher::new(AppState::new(
            Arc::new(InMemoryRepository::new()),
            jwt,
            Arc::new(MockNotifier::new()),
            InviteConfig::default(),
            SecurityConfig {
                service_api_key: "dispatcher-test-service-key-0000".to_string(),
            },
        ))
    }

    #[tokio::test]
    async fn test_empty_token_maps_to_invalid_argument() {
        let status = dispatcher()
            .call(RpcRequest::Identify(IdentifyRequest {
                token: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "Empty token");
    }

    #[tokio::test]
    async fn test_missing_id_rejected_before_store() {
        let status = dispatcher()
            .call(RpcRequest::RetrieveRole(RetrieveRoleRequest { id: String::new() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.metadata().get(ERROR_CODE_KEY).is_some());
    }
}
