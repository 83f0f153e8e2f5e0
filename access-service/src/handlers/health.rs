use axum::{extract::State, http::StatusCode, Json};

use crate::{dtos::resources::HealthResponse, AppState};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database is unavailable", body = HealthResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.store.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            "down"
        }
    };

    // The revocation cache fails open, so it only degrades the service.
    let revocation_cache = match state.revocation.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "revocation cache health check failed");
            "down"
        }
    };

    let (status, label) = match (database, revocation_cache) {
        ("up", "up") => (StatusCode::OK, "healthy"),
        ("up", _) => (StatusCode::OK, "degraded"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            database: database.to_string(),
            revocation_cache: revocation_cache.to_string(),
        }),
    )
}
