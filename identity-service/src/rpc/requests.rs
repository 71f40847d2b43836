//! One request type per RPC method.
//!
//! Every request checks its own shape in [`Validate::validate`] before the
//! dispatcher touches a service, so malformed input never reaches the store.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::Validate;
use crate::models::{KeyType, OrgRole, OrgUpdate, PageParams};
use crate::services::error::{ServiceError, ServiceResult};

fn require(value: &str, what: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::invalid(format!("Missing {}", what)));
    }
    Ok(())
}

fn require_token(token: &str) -> ServiceResult<()> {
    if token.is_empty() {
        return Err(ServiceError::EmptyToken);
    }
    Ok(())
}

fn check_fields<T: validator::Validate>(req: &T) -> ServiceResult<()> {
    validator::Validate::validate(req).map_err(|e| ServiceError::invalid(e.to_string()))
}

// ==================== Keys ====================

/// Issue a key. `token` is the caller's Login key and is only needed for API
/// keys, which take their issuer from it.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub issuer_id: String,
    #[serde(default)]
    pub email: String,
    pub key_type: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssueRequest {
    pub fn key_type(&self) -> ServiceResult<KeyType> {
        self.key_type
            .parse()
            .map_err(|_| ServiceError::InvalidAuthKey)
    }
}

impl Validate for IssueRequest {
    fn validate(&self) -> ServiceResult<()> {
        match self.key_type()? {
            KeyType::Api => require_token(&self.token),
            KeyType::Login | KeyType::Recovery => {
                if self.issuer_id.is_empty() {
                    return Err(ServiceError::MissingId);
                }
                require(&self.email, "email")
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyRequest {
    pub token: String,
}

impl Validate for IdentifyRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRecoveryRequest {
    pub token: String,
}

impl Validate for ValidateRecoveryRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyRequest {
    pub token: String,
    pub id: Uuid,
}

impl Validate for KeyRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListKeysRequest {
    pub token: String,
    #[serde(flatten)]
    pub page: PageParams,
}

impl Validate for ListKeysRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

// ==================== Authorization ====================

/// The four-field authorization check. The older email-only form is not
/// accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub token: String,
    #[serde(default)]
    pub object: String,
    pub subject: String,
    pub action: String,
}

impl Validate for AuthorizeRequest {
    fn validate(&self) -> ServiceResult<()> {
        require(&self.subject, "subject")?;
        require(&self.action, "action")?;
        require_token(&self.token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub role: String,
}

impl Validate for AssignRoleRequest {
    fn validate(&self) -> ServiceResult<()> {
        if self.id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        if self.role.is_empty() {
            return Err(ServiceError::MissingRole);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveRoleRequest {
    #[serde(default)]
    pub id: String,
}

impl Validate for RetrieveRoleRequest {
    fn validate(&self) -> ServiceResult<()> {
        if self.id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        Ok(())
    }
}

// ==================== Orgs ====================

#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateOrgRequest {
    pub token: String,
    #[validate(length(min = 1, max = 254, message = "Org name must be 1-254 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Validate for CreateOrgRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        check_fields(self)
    }
}

#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct UpdateOrgRequest {
    pub token: String,
    pub id: Uuid,
    #[validate(length(min = 1, max = 254, message = "Org name must be 1-254 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl UpdateOrgRequest {
    pub fn update(&self) -> OrgUpdate {
        OrgUpdate {
            name: self.name.clone(),
            description: self.description.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl Validate for UpdateOrgRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        check_fields(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrgRequest {
    pub token: String,
    pub id: Uuid,
}

impl Validate for OrgRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerIdRequest {
    pub id: Uuid,
}

impl Validate for OwnerIdRequest {
    fn validate(&self) -> ServiceResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListOrgsRequest {
    pub token: String,
    #[serde(flatten)]
    pub page: PageParams,
}

impl Validate for ListOrgsRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveOrgsRequest {
    pub token: String,
    pub ids: Vec<Uuid>,
}

impl Validate for RemoveOrgsRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        if self.ids.is_empty() {
            return Err(ServiceError::MissingId);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMembersRequest {
    pub token: String,
    pub org_id: Uuid,
    #[serde(flatten)]
    pub page: PageParams,
}

impl Validate for ListMembersRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

/// Token, org and member. Used by ViewOrgMembership and RemoveMember.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipRequest {
    pub token: String,
    pub org_id: Uuid,
    #[serde(default)]
    pub member_id: String,
}

impl Validate for MembershipRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        if self.member_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        Ok(())
    }
}

/// Used by AssignMember and UpdateMemberRole.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRoleRequest {
    pub token: String,
    pub org_id: Uuid,
    #[serde(default)]
    pub member_id: String,
    pub role: OrgRole,
}

impl Validate for MemberRoleRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        if self.member_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        if self.role == OrgRole::Owner {
            return Err(ServiceError::invalid(
                "Owner role can only be granted by ownership transfer",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferOwnershipRequest {
    pub token: String,
    pub org_id: Uuid,
    #[serde(default)]
    pub new_owner_id: String,
}

impl Validate for TransferOwnershipRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        if self.new_owner_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        Ok(())
    }
}

// ==================== Invites ====================

#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateOrgInviteRequest {
    pub token: String,
    pub org_id: Uuid,
    #[validate(email(message = "Invalid invitee email"))]
    pub invitee_email: String,
    pub invitee_id: Option<String>,
    pub role: OrgRole,
    pub redirect_path: String,
}

impl Validate for CreateOrgInviteRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        check_fields(self)
    }
}

#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateDormantOrgInviteRequest {
    pub token: String,
    pub org_id: Uuid,
    #[validate(email(message = "Invalid invitee email"))]
    pub invitee_email: String,
    pub role: OrgRole,
    #[validate(length(min = 1, message = "Missing platform invite id"))]
    pub platform_invite_id: String,
}

impl Validate for CreateDormantOrgInviteRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        check_fields(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateOrgInviteRequest {
    pub platform_invite_id: String,
    pub user_id: String,
    pub redirect_path: String,
}

impl Validate for ActivateOrgInviteRequest {
    fn validate(&self) -> ServiceResult<()> {
        require(&self.platform_invite_id, "platform invite id")?;
        if self.user_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        require(&self.redirect_path, "redirect path")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DormantInviteRequest {
    pub platform_invite_id: String,
}

impl Validate for DormantInviteRequest {
    fn validate(&self) -> ServiceResult<()> {
        require(&self.platform_invite_id, "platform invite id")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RespondOrgInviteRequest {
    pub token: String,
    pub invite_id: Uuid,
    pub accept: bool,
}

impl Validate for RespondOrgInviteRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

/// Token plus one invite id. Used by ViewOrgInvite and RevokeOrgInvite.
#[derive(Debug, Clone, Deserialize)]
pub struct InviteRequest {
    pub token: String,
    pub invite_id: Uuid,
}

impl Validate for InviteRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)
    }
}

/// Used by ListSentInvites and ListReceivedInvites.
#[derive(Debug, Clone, Deserialize)]
pub struct ListInvitesRequest {
    pub token: String,
    pub user_id: String,
    #[serde(flatten)]
    pub page: PageParams,
}

impl Validate for ListInvitesRequest {
    fn validate(&self) -> ServiceResult<()> {
        require_token(&self.token)?;
        if self.user_id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        Ok(())
    }
}
