use axum::extract::{Json, State};
use service_core::error::AppError;

use crate::rpc::{Dispatcher, RpcRequest, RpcResponse};
use crate::AppState;

/// JSON mapping of the RPC boundary. Errors go through the same status
/// mapping as the binary protocol and are transcoded back to HTTP, so both
/// mappings report the same kind and code. Caller credentials travel in
/// the params of each method.
#[utoipa::path(
    post,
    path = "/rpc",
    responses(
        (status = 200, description = "Method result"),
        (status = 400, description = "Invalid argument"),
        (status = 401, description = "Missing service key, unauthenticated or key expired"),
        (status = 403, description = "Not authorized"),
    ),
    security(("service_api_key" = [])),
    tag = "RPC"
)]
pub async fn rpc(
    State(state): State<AppState>,
    Json(req): Json<RpcRequest>,
) -> Result<Json<RpcResponse>, AppError> {
    let method = req.method();
    let response = Dispatcher::new(state).call(req).await.map_err(|status| {
        tracing::debug!(method, code = ?status.code(), message = status.message(), "RPC call failed");
        AppError::from(status)
    })?;
    Ok(Json(response))
}
