use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Key, KeyType};
use crate::services::error::{ServiceError, ServiceResult};

/// Signs and verifies the stateless `Login` and `Recovery` keys.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    login_token_expiry_minutes: i64,
    recovery_token_expiry_minutes: i64,
}

/// Claims carried by Login and Recovery keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Audience, the key type: `login` or `recovery`
    pub aud: String,
    /// Issuer
    pub iss: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Key ID
    pub jti: String,
}

impl KeyClaims {
    fn into_key(self, key_type: KeyType) -> ServiceResult<Key> {
        let id = Uuid::parse_str(&self.jti)
            .map_err(|_| ServiceError::unauthenticated("Invalid token id"))?;
        Ok(Key {
            id,
            key_type,
            issuer_id: self.sub,
            subject: self.email,
            issued_at: timestamp(self.iat)?,
            expires_at: Some(timestamp(self.exp)?),
        })
    }
}

fn timestamp(secs: i64) -> ServiceResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ServiceError::unauthenticated("Invalid token timestamp"))
}

impl JwtService {
    /// Load the RS256 key pair from the configured PEM files.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let private_key_pem = fs::read_to_string(&config.private_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read private key from {}: {}",
                config.private_key_path,
                e
            )
        })?;

        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                config.public_key_path,
                e
            )
        })?;

        Self::from_rsa_pem(
            private_key_pem.as_bytes(),
            public_key_pem.as_bytes(),
            config,
        )
    }

    pub fn from_rsa_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        config: &JwtConfig,
    ) -> Result<Self, anyhow::Error> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        tracing::info!("JWT service initialized with RS256 keys");

        Ok(Self {
            encoding_key,
            decoding_key,
            issuer: config.issuer.clone(),
            login_token_expiry_minutes: config.login_token_expiry_minutes,
            recovery_token_expiry_minutes: config.recovery_token_expiry_minutes,
        })
    }

    fn ttl(&self, key_type: KeyType) -> ServiceResult<Duration> {
        match key_type {
            KeyType::Login => Ok(Duration::minutes(self.login_token_expiry_minutes)),
            KeyType::Recovery => Ok(Duration::minutes(self.recovery_token_expiry_minutes)),
            KeyType::Api => Err(ServiceError::InvalidAuthKey),
        }
    }

    /// Sign a Login or Recovery key for `user_id`. Returns the key record and
    /// the encoded token.
    pub fn sign(&self, key_type: KeyType, user_id: &str, email: &str) -> ServiceResult<(Key, String)> {
        let ttl = self.ttl(key_type)?;
        let now = Utc::now();
        let key = Key {
            id: Uuid::new_v4(),
            key_type,
            issuer_id: user_id.to_string(),
            subject: email.to_string(),
            issued_at: now,
            expires_at: Some(now + ttl),
        };

        let claims = KeyClaims {
            sub: key.issuer_id.clone(),
            email: key.subject.clone(),
            aud: key_type.as_str().to_string(),
            iss: self.issuer.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: key.id.to_string(),
        };

        let header = Header::new(Algorithm::RS256);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", key_type, e))?;

        Ok((key, token))
    }

    /// Verify a token signed for `key_type`. A token of the other type fails
    /// the audience check.
    pub fn verify(&self, token: &str, key_type: KeyType) -> ServiceResult<Key> {
        self.ttl(key_type)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&[key_type.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<KeyClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                JwtErrorKind::ExpiredSignature => ServiceError::KeyExpired,
                _ => ServiceError::unauthenticated(format!("Invalid {} token", key_type)),
            },
        )?;

        token_data.claims.into_key(key_type)
    }

    /// True when the token is shaped like a JWT (three dot-separated parts).
    pub fn looks_signed(token: &str) -> bool {
        token.split('.').count() == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/jwt_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/jwt_public.pem");

    fn config(login_minutes: i64) -> JwtConfig {
        JwtConfig {
            private_key_path: String::new(),
            public_key_path: String::new(),
            issuer: "identity-test".to_string(),
            login_token_expiry_minutes: login_minutes,
            recovery_token_expiry_minutes: 5,
        }
    }

    fn service(login_minutes: i64) -> JwtService {
        JwtService::from_rsa_pem(
            PRIVATE_KEY.as_bytes(),
            PUBLIC_KEY.as_bytes(),
            &config(login_minutes),
        )
        .unwrap()
    }

    #[test]
    fn test_login_token_round_trip() {
        let jwt = service(60);
        let (issued, token) = jwt.sign(KeyType::Login, "alice", "alice@example.com").unwrap();
        assert!(JwtService::looks_signed(&token));

        let key = jwt.verify(&token, KeyType::Login).unwrap();
        assert_eq!(key.id, issued.id);
        assert_eq!(key.identity().id, "alice");
        assert_eq!(key.identity().email, "alice@example.com");
    }

    #[test]
    fn test_recovery_token_rejected_as_login() {
        let jwt = service(60);
        let (_, token) = jwt
            .sign(KeyType::Recovery, "alice", "alice@example.com")
            .unwrap();

        let err = jwt.verify(&token, KeyType::Login).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
        assert!(jwt.verify(&token, KeyType::Recovery).is_ok());
    }

    #[test]
    fn test_expired_token_is_key_expired() {
        let jwt = service(-5);
        let (_, token) = jwt.sign(KeyType::Login, "alice", "alice@example.com").unwrap();
        let err = jwt.verify(&token, KeyType::Login).unwrap_err();
        assert!(matches!(err, ServiceError::KeyExpired));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let jwt = service(60);
        let (_, token) = jwt.sign(KeyType::Login, "alice", "alice@example.com").unwrap();
        let tampered = format!("{}x", token);
        assert!(matches!(
            jwt.verify(&tampered, KeyType::Login),
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_api_keys_are_not_signed() {
        let jwt = service(60);
        assert!(matches!(
            jwt.sign(KeyType::Api, "alice", "alice@example.com"),
            Err(ServiceError::InvalidAuthKey)
        ));
    }
}
