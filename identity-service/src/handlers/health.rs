use axum::extract::{Json, State};
use service_core::error::AppError;

use crate::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and store are up"),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repo.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "store": "up"
        }
    })))
}
