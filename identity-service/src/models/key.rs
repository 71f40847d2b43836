//! Key model - bearer credentials and the identity behind them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Short-lived signed session credential.
    Login,
    /// Short-lived signed credential usable only for password reset.
    Recovery,
    /// Long-lived persisted credential that can be revoked.
    Api,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Login => "login",
            KeyType::Recovery => "recovery",
            KeyType::Api => "api",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" => Ok(KeyType::Login),
            "recovery" => Ok(KeyType::Recovery),
            "api" => Ok(KeyType::Api),
            _ => Err(format!("Invalid key type: {}", s)),
        }
    }
}

/// Credential record.
///
/// Only `Api` keys are ever persisted; `Login` and `Recovery` keys exist only
/// inside their signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Key {
    pub id: Uuid,
    pub key_type: KeyType,
    /// ID of the user the key was issued to.
    pub issuer_id: String,
    /// E-mail of the user the key was issued to.
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Key {
    pub fn new(
        key_type: KeyType,
        issuer_id: String,
        subject: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key_type,
            issuer_id,
            subject,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    /// A key without an expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.issuer_id.clone(),
            email: self.subject.clone(),
        }
    }
}

/// Persisted form of an API key: the record plus the digest of its secret.
#[derive(Debug, Clone)]
pub struct StoredKey {
    pub key: Key,
    pub secret_hash: String,
}

/// Resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// Result of an `Issue` call. The secret is shown once and never stored.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedKey {
    pub id: Uuid,
    pub key_type: KeyType,
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_key_without_expiry_never_expires() {
        let key = Key::new(KeyType::Api, "u1".into(), "u1@example.com".into(), None);
        assert!(!key.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_key_expiry_boundary() {
        let now = Utc::now();
        let key = Key::new(KeyType::Api, "u1".into(), "u1@example.com".into(), Some(now));
        assert!(key.is_expired_at(now));
        assert!(!key.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_key_type_parse() {
        assert_eq!("API".parse::<KeyType>(), Ok(KeyType::Api));
        assert!("session".parse::<KeyType>().is_err());
    }
}
