use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub invite: InviteConfig,
    pub security: SecurityConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub issuer: String,
    pub login_token_expiry_minutes: i64,
    pub recovery_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteConfig {
    pub expiry_hours: i64,
    pub base_url: String,
}

/// Credentials for service-to-service calls.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret other services send in `X-Service-Api-Key` on `/rpc`.
    pub service_api_key: String,
}

pub const MIN_SERVICE_API_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            expiry_hours: 168,
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            jwt: JwtConfig {
                private_key_path: get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?,
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                issuer: get_env("JWT_ISSUER", Some("identity-service"), is_prod)?,
                login_token_expiry_minutes: parse_env("LOGIN_TOKEN_EXPIRY_MINUTES", "60", is_prod)?,
                recovery_token_expiry_minutes: parse_env(
                    "RECOVERY_TOKEN_EXPIRY_MINUTES",
                    "5",
                    is_prod,
                )?,
            },
            invite: InviteConfig {
                expiry_hours: parse_env("INVITE_EXPIRY_HOURS", "168", is_prod)?,
                base_url: get_env("INVITE_BASE_URL", Some("http://localhost:3000"), is_prod)?,
            },
            security: SecurityConfig {
                service_api_key: get_env("SERVICE_API_KEY", None, true)?,
            },
            smtp: match env::var("SMTP_HOST") {
                Ok(host) if !host.is_empty() => Some(SmtpConfig {
                    host,
                    user: get_env("SMTP_USER", None, is_prod)?,
                    password: get_env("SMTP_PASSWORD", None, is_prod)?,
                    from: get_env("SMTP_FROM", None, is_prod)?,
                }),
                _ => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.login_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOGIN_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.recovery_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RECOVERY_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.invite.expiry_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "INVITE_EXPIRY_HOURS must be positive"
            )));
        }

        if self.security.service_api_key.len() < MIN_SERVICE_API_KEY_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SERVICE_API_KEY must be at least {} characters",
                MIN_SERVICE_API_KEY_LEN
            )));
        }

        if self.environment == Environment::Prod && self.smtp.is_none() {
            tracing::warn!("SMTP_HOST not set in production - invite e-mails will only be logged");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "identity-service".into(),
            service_version: "test".into(),
            log_level: "info".into(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/identity_test".into(),
                max_connections: 5,
                min_connections: 1,
            },
            jwt: JwtConfig {
                private_key_path: "private.pem".into(),
                public_key_path: "public.pem".into(),
                issuer: "identity-service".into(),
                login_token_expiry_minutes: 60,
                recovery_token_expiry_minutes: 5,
            },
            invite: InviteConfig::default(),
            security: SecurityConfig {
                service_api_key: "k".repeat(MIN_SERVICE_API_KEY_LEN),
            },
            smtp: None,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_ttl() {
        let mut cfg = config();
        cfg.jwt.recovery_token_expiry_minutes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.invite.expiry_hours = -1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_service_key() {
        let mut cfg = config();
        cfg.security.service_api_key = "changeme".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }
}
