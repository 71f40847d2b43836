use service_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign_key_violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Missing entity id")]
    MissingId,

    #[error("Missing role")]
    MissingRole,

    #[error("Empty token")]
    EmptyToken,

    #[error("Invalid auth key type")]
    InvalidAuthKey,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Key expired")]
    KeyExpired,

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidArgument(_)
            | ServiceError::MissingId
            | ServiceError::MissingRole
            | ServiceError::EmptyToken
            | ServiceError::InvalidAuthKey => ErrorKind::InvalidArgument,
            ServiceError::Unauthenticated(_) | ServiceError::KeyExpired => {
                ErrorKind::Unauthenticated
            }
            ServiceError::Authorization(_) => ErrorKind::Authorization,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Database(_) | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        ServiceError::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    /// Translate constraint violations into domain errors; anything else
    /// stays a store failure.
    pub fn from_db(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return ServiceError::conflict(conflict),
                Some(FOREIGN_KEY_VIOLATION) => {
                    return ServiceError::not_found("Referenced entity not found")
                }
                _ => {}
            }
        }
        ServiceError::Database(err)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::KeyExpired => AppError::KeyExpired,
            ServiceError::InvalidArgument(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ (ServiceError::MissingId
            | ServiceError::MissingRole
            | ServiceError::EmptyToken
            | ServiceError::InvalidAuthKey) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            ServiceError::Unauthenticated(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            ServiceError::Authorization(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_preserved_across_app_error() {
        let cases = [
            ServiceError::MissingRole,
            ServiceError::EmptyToken,
            ServiceError::KeyExpired,
            ServiceError::unauthenticated("bad"),
            ServiceError::forbidden("no"),
            ServiceError::not_found("gone"),
            ServiceError::conflict("dup"),
            ServiceError::Internal(anyhow::anyhow!("boom")),
        ];
        for err in cases {
            let kind = err.kind();
            let app: AppError = err.into();
            assert_eq!(app.kind(), kind);
        }
    }

    #[test]
    fn test_key_expired_distinct_from_unauthenticated() {
        let expired: AppError = ServiceError::KeyExpired.into();
        let invalid: AppError = ServiceError::unauthenticated("Invalid token").into();
        assert_eq!(expired.kind(), invalid.kind());
        assert_ne!(expired.code(), invalid.code());
    }
}
