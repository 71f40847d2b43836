//! Role model - platform-scoped (non-org) role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Platform-level role of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlatformRole {
    Admin,
    User,
}

impl PlatformRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformRole::Admin => "admin",
            PlatformRole::User => "user",
        }
    }
}

impl std::fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(PlatformRole::Admin),
            "user" => Ok(PlatformRole::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// One role per entity; re-assignment overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub entity_id: String,
    pub role: PlatformRole,
    pub updated_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(entity_id: String, role: PlatformRole) -> Self {
        Self {
            entity_id,
            role,
            updated_at: Utc::now(),
        }
    }
}
