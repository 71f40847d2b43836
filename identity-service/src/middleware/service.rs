use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use sha2::{Digest, Sha256};

use crate::AppState;

pub const SERVICE_API_KEY_HEADER: &str = "x-service-api-key";

/// Gate for the internal RPC boundary. Callers must present the shared
/// service key in `X-Service-Api-Key`.
pub async fn service_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let provided = headers
        .get(SERVICE_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key_matches(key, &state.security.service_api_key) => next.run(request).await,
        Some(_) => {
            tracing::warn!("Rejected RPC call with invalid service API key");
            AppError::Unauthorized(anyhow::anyhow!("Invalid service API key")).into_response()
        }
        None => {
            tracing::warn!("Rejected RPC call without service API key");
            AppError::Unauthorized(anyhow::anyhow!("Missing X-Service-Api-Key header"))
                .into_response()
        }
    }
}

/// Fixed-length digest comparison; an empty configured key matches nothing.
fn key_matches(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}
