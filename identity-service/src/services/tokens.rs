//! Token Issuer/Validator and Identity Resolver.
//!
//! Login and Recovery keys are RS256 JWTs and never touch the store. API keys
//! are opaque random secrets; only their SHA-256 digest is persisted, so a
//! leaked database row cannot be replayed as a credential.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Identity, IssuedKey, Key, KeyType, Page, PageParams, StoredKey};
use crate::repository::Repository;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::jwt::JwtService;

/// Prefix of every API key secret.
pub const API_KEY_PREFIX: &str = "api_";

/// Generate a random API key secret.
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a secret for storage.
fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// What to issue. `issuer_id`/`subject` are required for Login and Recovery
/// keys; API keys take both from the caller's Login key instead.
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub key_type: KeyType,
    pub issuer_id: String,
    pub subject: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct TokenService {
    repo: Arc<dyn Repository>,
    jwt: JwtService,
}

impl TokenService {
    pub fn new(repo: Arc<dyn Repository>, jwt: JwtService) -> Self {
        Self { repo, jwt }
    }

    /// Issue a new key. `caller_token` must be a valid Login key when issuing
    /// an API key and is ignored otherwise.
    #[tracing::instrument(skip(self, caller_token), fields(key_type = %params.key_type))]
    pub async fn issue(&self, caller_token: &str, params: IssueParams) -> ServiceResult<IssuedKey> {
        match params.key_type {
            KeyType::Login | KeyType::Recovery => {
                if params.issuer_id.is_empty() {
                    return Err(ServiceError::MissingId);
                }
                if params.subject.is_empty() {
                    return Err(ServiceError::invalid("Missing subject email"));
                }
                let (key, secret) =
                    self.jwt
                        .sign(params.key_type, &params.issuer_id, &params.subject)?;
                tracing::info!(key_id = %key.id, issuer_id = %key.issuer_id, "Key issued");
                Ok(IssuedKey {
                    id: key.id,
                    key_type: key.key_type,
                    secret,
                    expires_at: key.expires_at,
                })
            }
            KeyType::Api => {
                let caller = self.identify(caller_token).await.map_err(|e| match e {
                    ServiceError::EmptyToken => {
                        ServiceError::unauthenticated("API keys require a login key")
                    }
                    other => other,
                })?;

                let key = Key::new(KeyType::Api, caller.id, caller.email, params.expires_at);
                let secret = generate_secret();
                let stored = StoredKey {
                    key: key.clone(),
                    secret_hash: hash_secret(&secret),
                };
                self.repo.save_key(&stored).await?;

                tracing::info!(key_id = %key.id, issuer_id = %key.issuer_id, "API key issued");
                Ok(IssuedKey {
                    id: key.id,
                    key_type: KeyType::Api,
                    secret,
                    expires_at: key.expires_at,
                })
            }
        }
    }

    /// Parse and check any key. Expired keys fail with `KeyExpired`,
    /// everything else that does not verify with `Unauthenticated`.
    pub async fn validate(&self, token: &str) -> ServiceResult<Key> {
        if token.is_empty() {
            return Err(ServiceError::EmptyToken);
        }

        if token.starts_with(API_KEY_PREFIX) {
            let key = self
                .repo
                .find_key_by_secret_hash(&hash_secret(token))
                .await?
                .ok_or_else(|| ServiceError::unauthenticated("Unknown API key"))?;
            if key.is_expired_at(Utc::now()) {
                tracing::warn!(key_id = %key.id, "Expired API key presented");
                return Err(ServiceError::KeyExpired);
            }
            return Ok(key);
        }

        if !JwtService::looks_signed(token) {
            return Err(ServiceError::unauthenticated("Malformed token"));
        }

        match self.jwt.verify(token, KeyType::Login) {
            Err(ServiceError::Unauthenticated(_)) => self.jwt.verify(token, KeyType::Recovery),
            other => other,
        }
    }

    /// Resolve the caller behind a Login or API key. Recovery keys are only
    /// good for [`TokenService::validate_recovery`].
    pub async fn identify(&self, token: &str) -> ServiceResult<Identity> {
        let key = self.validate(token).await?;
        if key.key_type == KeyType::Recovery {
            return Err(ServiceError::unauthenticated(
                "Recovery keys cannot be used for authentication",
            ));
        }
        Ok(key.identity())
    }

    /// Resolve the identity behind a Recovery key for the password-reset flow.
    pub async fn validate_recovery(&self, token: &str) -> ServiceResult<Identity> {
        if token.is_empty() {
            return Err(ServiceError::EmptyToken);
        }
        Ok(self.jwt.verify(token, KeyType::Recovery)?.identity())
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn retrieve_key(&self, token: &str, id: Uuid) -> ServiceResult<Key> {
        let caller = self.identify(token).await?;
        self.repo
            .find_key(&caller.id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Key not found"))
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn revoke_key(&self, token: &str, id: Uuid) -> ServiceResult<()> {
        let caller = self.identify(token).await?;
        if !self.repo.remove_key(&caller.id, id).await? {
            return Err(ServiceError::not_found("Key not found"));
        }
        tracing::info!(key_id = %id, issuer_id = %caller.id, "API key revoked");
        Ok(())
    }

    pub async fn list_keys(&self, token: &str, page: &PageParams) -> ServiceResult<Page<Key>> {
        let caller = self.identify(token).await?;
        self.repo.list_keys(&caller.id, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::repository::InMemoryRepository;
    use chrono::Duration;

    fn service() -> TokenService {
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
        TokenService::new(Arc::new(InMemoryRepository::new()), jwt)
    }

    fn params(key_type: KeyType) -> IssueParams {
        IssueParams {
            key_type,
            issuer_id: "alice".into(),
            subject: "alice@example.com".into(),
            expires_at: None,
        }
    }

    #[test]
    fn test_secret_shape() {
        let secret = generate_secret();
        assert!(secret.starts_with(API_KEY_PREFIX));
        assert_ne!(secret, generate_secret());
        assert_eq!(hash_secret(&secret).len(), 64);
    }

    #[tokio::test]
    async fn test_api_key_requires_login() {
        let tokens = service();
        let err = tokens.issue("", params(KeyType::Api)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_api_key_identifies_issuer() {
        let tokens = service();
        let login = tokens.issue("", params(KeyType::Login)).await.unwrap();
        let api = tokens
            .issue(&login.secret, params(KeyType::Api))
            .await
            .unwrap();

        let identity = tokens.identify(&api.secret).await.unwrap();
        assert_eq!(identity.id, "alice");
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_expired_api_key() {
        let tokens = service();
        let login = tokens.issue("", params(KeyType::Login)).await.unwrap();
        let mut p = params(KeyType::Api);
        p.expires_at = Some(Utc::now() - Duration::seconds(1));
        let api = tokens.issue(&login.secret, p).await.unwrap();

        assert!(matches!(
            tokens.validate(&api.secret).await,
            Err(ServiceError::KeyExpired)
        ));
    }

    #[tokio::test]
    async fn test_revoked_key_is_unauthenticated() {
        let tokens = service();
        let login = tokens.issue("", params(KeyType::Login)).await.unwrap();
        let api = tokens
            .issue(&login.secret, params(KeyType::Api))
            .await
            .unwrap();

        tokens.revoke_key(&login.secret, api.id).await.unwrap();
        assert!(matches!(
            tokens.validate(&api.secret).await,
            Err(ServiceError::Unauthenticated(_))
        ));
        assert!(matches!(
            tokens.revoke_key(&login.secret, api.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recovery_key_cannot_identify() {
        let tokens = service();
        let recovery = tokens.issue("", params(KeyType::Recovery)).await.unwrap();

        assert!(matches!(
            tokens.identify(&recovery.secret).await,
            Err(ServiceError::Unauthenticated(_))
        ));
        let identity = tokens.validate_recovery(&recovery.secret).await.unwrap();
        assert_eq!(identity.id, "alice");
    }

    #[tokio::test]
    async fn test_empty_token_is_invalid_argument() {
        let tokens = service();
        assert!(matches!(
            tokens.identify("").await,
            Err(ServiceError::EmptyToken)
        ));
        assert!(matches!(
            tokens.identify("garbage").await,
            Err(ServiceError::Unauthenticated(_))
        ));
    }
}
