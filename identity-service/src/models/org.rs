//! Organization model - tenants, their members and the role hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Org-scoped role. Variant order is the privilege order:
/// `Viewer < Editor < Admin < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
    Owner,
}

impl OrgRole {
    pub const ALL: [OrgRole; 4] = [
        OrgRole::Viewer,
        OrgRole::Editor,
        OrgRole::Admin,
        OrgRole::Owner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Viewer => "viewer",
            OrgRole::Editor => "editor",
            OrgRole::Admin => "admin",
            OrgRole::Owner => "owner",
        }
    }

    /// Whether a member holding `self` may do what `required` allows.
    pub fn satisfies(&self, required: OrgRole) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(OrgRole::Viewer),
            "editor" => Ok(OrgRole::Editor),
            "admin" => Ok(OrgRole::Admin),
            "owner" => Ok(OrgRole::Owner),
            _ => Err(format!("Invalid org role: {}", s)),
        }
    }
}

/// Action requested against an org-scoped object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Edit,
    Manage,
    Delete,
    TransferOwnership,
}

impl Action {
    /// Least role able to perform this action.
    pub fn required_role(&self) -> OrgRole {
        match self {
            Action::View => OrgRole::Viewer,
            Action::Edit => OrgRole::Editor,
            Action::Manage => OrgRole::Admin,
            Action::Delete | Action::TransferOwnership => OrgRole::Owner,
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" | "read" => Ok(Action::View),
            "edit" | "update" | "write" => Ok(Action::Edit),
            "manage" | "share" | "admin" => Ok(Action::Manage),
            "delete" => Ok(Action::Delete),
            "transfer" | "transfer_ownership" => Ok(Action::TransferOwnership),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

/// An organization (tenant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Org {
    pub id: Uuid,
    pub owner_id: String,
    #[schema(example = "Acme")]
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Org {
    pub fn new(
        owner_id: String,
        name: String,
        description: String,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            description,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an org; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrgUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

impl OrgUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.metadata.is_none()
    }

    pub fn apply(&self, org: &mut Org, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            org.name = name.clone();
        }
        if let Some(description) = &self.description {
            org.description = description.clone();
        }
        if let Some(metadata) = &self.metadata {
            org.metadata = metadata.clone();
        }
        org.updated_at = now;
    }
}

/// (org, member, role) relation. At most one per `(org_id, member_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrgMembership {
    pub org_id: Uuid,
    pub member_id: String,
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrgMembership {
    pub fn new(org_id: Uuid, member_id: String, role: OrgRole) -> Self {
        let now = Utc::now();
        Self {
            org_id,
            member_id,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_is_total_order() {
        assert!(OrgRole::Viewer < OrgRole::Editor);
        assert!(OrgRole::Editor < OrgRole::Admin);
        assert!(OrgRole::Admin < OrgRole::Owner);
    }

    #[test]
    fn test_hierarchy_monotonicity() {
        for (i, held) in OrgRole::ALL.iter().enumerate() {
            for (j, required) in OrgRole::ALL.iter().enumerate() {
                assert_eq!(held.satisfies(*required), i >= j, "{held} vs {required}");
            }
        }
    }

    #[test]
    fn test_owner_reserved_actions() {
        assert!(!OrgRole::Admin.satisfies(Action::Delete.required_role()));
        assert!(!OrgRole::Admin.satisfies(Action::TransferOwnership.required_role()));
        assert!(OrgRole::Owner.satisfies(Action::Delete.required_role()));
        assert!(OrgRole::Admin.satisfies(Action::Manage.required_role()));
    }

    #[test]
    fn test_action_aliases() {
        assert_eq!("read".parse::<Action>(), Ok(Action::View));
        assert_eq!("Share".parse::<Action>(), Ok(Action::Manage));
        assert!("frobnicate".parse::<Action>().is_err());
    }

    #[test]
    fn test_org_update_apply() {
        let mut org = Org::new(
            "alice".into(),
            "Acme".into(),
            String::new(),
            serde_json::json!({}),
        );
        let update = OrgUpdate {
            description: Some("Widgets".into()),
            ..Default::default()
        };
        let now = Utc::now();
        update.apply(&mut org, now);
        assert_eq!(org.name, "Acme");
        assert_eq!(org.description, "Widgets");
        assert_eq!(org.updated_at, now);
    }
}
