use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Coarse error classification shared by every transport.
///
/// Each kind maps to exactly one HTTP status and one gRPC code; anything a
/// transport does not recognise must fall back to `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    Authorization,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP status for this kind.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    /// Credential was well-formed and known but is past its expiry.
    #[error("Key expired")]
    KeyExpired,

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => ErrorKind::InvalidArgument,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Unauthorized(_) | AppError::KeyExpired => ErrorKind::Unauthenticated,
            AppError::Forbidden(_) => ErrorKind::Authorization,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::EmailError(_)
            | AppError::ConfigError(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code, finer grained than the kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::KeyExpired => "key_expired",
            AppError::ValidationError(_) => "validation_error",
            other => other.kind().as_str(),
        }
    }

    /// Message safe to hand to a remote caller. Internal failures never leak
    /// their cause.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(err) => format!("Validation error: {}", err),
            AppError::BadRequest(err)
            | AppError::NotFound(err)
            | AppError::Unauthorized(err)
            | AppError::Forbidden(err)
            | AppError::Conflict(err) => err.to_string(),
            AppError::KeyExpired => "Key expired".to_string(),
            AppError::InternalError(_) => "Internal server error".to_string(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::EmailError(_) => "Email error".to_string(),
            AppError::ConfigError(_) => "Configuration error".to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

/// JSON error body returned by every HTTP endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            tracing::error!(error = %self, "Request failed with internal error");
        }

        let details = match &self {
            AppError::ValidationError(err) => Some(err.to_string()),
            _ => None,
        };

        (
            kind.http_status(),
            Json(ErrorResponse {
                error: self.public_message(),
                code: self.code(),
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_cause() {
        let err = AppError::DatabaseError(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Database error");
    }

    #[test]
    fn test_key_expired_is_unauthenticated_with_distinct_code() {
        let err = AppError::KeyExpired;
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert_eq!(err.code(), "key_expired");
        assert_eq!(
            AppError::Unauthorized(anyhow::anyhow!("bad token")).code(),
            "unauthenticated"
        );
    }

    #[test]
    fn test_no_kind_maps_to_success() {
        for kind in [
            ErrorKind::InvalidArgument,
            ErrorKind::Unauthenticated,
            ErrorKind::Authorization,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Internal,
        ] {
            assert!(!kind.http_status().is_success());
        }
    }

    #[test]
    fn test_into_response_status() {
        let res = AppError::Forbidden(anyhow::anyhow!("nope")).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = AppError::KeyExpired.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
