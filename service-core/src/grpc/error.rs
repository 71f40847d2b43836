//! Error conversion utilities between `AppError` and `tonic::Status`.
//!
//! | ErrorKind | gRPC Status |
//! |----------|-------------|
//! | `InvalidArgument` | `INVALID_ARGUMENT` |
//! | `Unauthenticated` | `UNAUTHENTICATED` |
//! | `Authorization` | `PERMISSION_DENIED` |
//! | `NotFound` | `NOT_FOUND` |
//! | `Conflict` | `ALREADY_EXISTS` |
//! | `Internal` | `INTERNAL` |

use tonic::{Code, Status};

use crate::error::{AppError, ErrorKind};

/// Metadata key carrying the fine-grained error code (e.g. `key_expired`).
pub const ERROR_CODE_KEY: &str = "x-error-code";

/// Extension trait for converting types into `tonic::Status`.
pub trait IntoStatus {
    /// Convert into a `tonic::Status`.
    fn into_status(self) -> Status;
}

/// Map an error kind to its gRPC code.
pub fn code_for_kind(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::InvalidArgument => Code::InvalidArgument,
        ErrorKind::Unauthenticated => Code::Unauthenticated,
        ErrorKind::Authorization => Code::PermissionDenied,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::Conflict => Code::AlreadyExists,
        ErrorKind::Internal => Code::Internal,
    }
}

/// Map a gRPC code back to an error kind. Codes without a counterpart are
/// treated as `Internal`, including `Ok` arriving on an error path.
pub fn kind_for_code(code: Code) -> ErrorKind {
    match code {
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            ErrorKind::InvalidArgument
        }
        Code::Unauthenticated => ErrorKind::Unauthenticated,
        Code::PermissionDenied => ErrorKind::Authorization,
        Code::NotFound => ErrorKind::NotFound,
        Code::AlreadyExists | Code::Aborted => ErrorKind::Conflict,
        _ => ErrorKind::Internal,
    }
}

impl IntoStatus for AppError {
    fn into_status(self) -> Status {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            // Log the full error but don't expose it to clients
            tracing::error!(error = %self, "Internal error");
        }
        let mut status = Status::new(code_for_kind(kind), self.public_message());
        if let Ok(value) = self.code().parse() {
            status.metadata_mut().insert(ERROR_CODE_KEY, value);
        }
        status
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.into_status()
    }
}

/// Convert a `tonic::Status` back to an `AppError`.
/// This is useful when a gRPC client receives an error and needs to propagate it.
impl From<Status> for AppError {
    fn from(status: Status) -> Self {
        let expired = status
            .metadata()
            .get(ERROR_CODE_KEY)
            .and_then(|v| v.to_str().ok())
            == Some("key_expired");
        if expired {
            return AppError::KeyExpired;
        }

        let message = anyhow::anyhow!("{}", status.message());
        match kind_for_code(status.code()) {
            ErrorKind::InvalidArgument => AppError::BadRequest(message),
            ErrorKind::Unauthenticated => AppError::Unauthorized(message),
            ErrorKind::Authorization => AppError::Forbidden(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::Internal => AppError::InternalError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_to_status() {
        let err = AppError::NotFound(anyhow::anyhow!("Org not found"));
        let status: Status = err.into();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("Org not found"));
    }

    #[test]
    fn test_status_to_app_error() {
        let status = Status::permission_denied("Editor cannot delete org");
        let err: AppError = status.into();
        match err {
            AppError::Forbidden(e) => assert!(e.to_string().contains("Editor cannot delete org")),
            _ => panic!("Expected Forbidden error"),
        }
    }

    #[test]
    fn test_key_expired_survives_round_trip() {
        let status: Status = AppError::KeyExpired.into();
        assert_eq!(status.code(), Code::Unauthenticated);
        let back: AppError = status.into();
        assert!(matches!(back, AppError::KeyExpired));
    }

    #[test]
    fn test_internal_status_is_generic() {
        let status: Status =
            AppError::DatabaseError(anyhow::anyhow!("relation \"orgs\" does not exist")).into();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("relation"));
    }

    #[test]
    fn test_unmapped_codes_fall_back_to_internal() {
        assert_eq!(kind_for_code(Code::Ok), ErrorKind::Internal);
        assert_eq!(kind_for_code(Code::Unimplemented), ErrorKind::Internal);
        assert_eq!(kind_for_code(Code::DeadlineExceeded), ErrorKind::Internal);
    }
}
