//! gRPC utilities shared by services.
//!
//! Fixes how domain errors cross an RPC boundary: `AppError` to `Status`
//! and back. JSON mappings of an RPC surface transcode through it so both
//! encodings agree.

pub mod error;

pub use error::{ERROR_CODE_KEY, IntoStatus, code_for_kind, kind_for_code};

// Re-export commonly used tonic types
pub use tonic::{Code, Status};
