//! Invite model - offers of an org role to a (possibly unregistered) user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::OrgRole;

/// Invite state. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InviteState {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

impl InviteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteState::Pending => "pending",
            InviteState::Accepted => "accepted",
            InviteState::Declined => "declined",
            InviteState::Revoked => "revoked",
            InviteState::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteState::Pending)
    }
}

impl std::fmt::Display for InviteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InviteState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InviteState::Pending),
            "accepted" => Ok(InviteState::Accepted),
            "declined" => Ok(InviteState::Declined),
            "revoked" => Ok(InviteState::Revoked),
            "expired" => Ok(InviteState::Expired),
            _ => Err(format!("Invalid invite state: {}", s)),
        }
    }
}

/// Why an invite can no longer be acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteClosed {
    /// Still `Pending` in storage but past `expires_at`.
    Expired,
    /// Already in a terminal state.
    Terminal(InviteState),
}

/// Org invite entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrgInvite {
    pub id: Uuid,
    pub org_id: Uuid,
    pub org_name: String,
    pub invitee_id: Option<String>,
    pub invitee_email: String,
    pub invitee_role: OrgRole,
    pub inviter_id: String,
    pub inviter_email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: InviteState,
    /// Correlation id of the platform registration invite, for dormant invites.
    pub platform_invite_id: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Fields needed to open a new invite.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub org_id: Uuid,
    pub org_name: String,
    pub invitee_id: Option<String>,
    pub invitee_email: String,
    pub invitee_role: OrgRole,
    pub inviter_id: String,
    pub inviter_email: String,
    pub expires_at: DateTime<Utc>,
    pub platform_invite_id: Option<String>,
}

impl OrgInvite {
    pub fn new(new: NewInvite) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id: new.org_id,
            org_name: new.org_name,
            invitee_id: new.invitee_id,
            invitee_email: new.invitee_email,
            invitee_role: new.invitee_role,
            inviter_id: new.inviter_id,
            inviter_email: new.inviter_email,
            created_at: Utc::now(),
            expires_at: new.expires_at,
            state: InviteState::Pending,
            platform_invite_id: new.platform_invite_id,
            activated_at: None,
            responded_at: None,
        }
    }

    /// A dormant invite waits for the invitee's platform registration.
    pub fn is_dormant(&self) -> bool {
        self.platform_invite_id.is_some() && self.activated_at.is_none()
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// State as observed at `now`: a pending invite past its expiry reads as
    /// `Expired` even before storage has been updated.
    pub fn state_at(&self, now: DateTime<Utc>) -> InviteState {
        if self.state == InviteState::Pending && self.is_past_expiry(now) {
            InviteState::Expired
        } else {
            self.state
        }
    }

    /// Ok when the invite may still transition out of `Pending`.
    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), InviteClosed> {
        match self.state_at(now) {
            InviteState::Pending => Ok(()),
            InviteState::Expired if self.state == InviteState::Pending => {
                Err(InviteClosed::Expired)
            }
            other => Err(InviteClosed::Terminal(other)),
        }
    }

    /// Whether `id`/`email` identify the invitee. Invites without a bound
    /// invitee id fall back to a case-insensitive e-mail match.
    pub fn is_addressed_to(&self, id: &str, email: &str) -> bool {
        match &self.invitee_id {
            Some(invitee_id) => invitee_id == id,
            None => self.invitee_email.eq_ignore_ascii_case(email),
        }
    }
}
