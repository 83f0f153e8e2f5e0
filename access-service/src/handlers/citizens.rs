use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use super::export_all;
use crate::{
    middleware::Auth,
    models::{Citizen, CitizenPatch, Exportable, NewCitizen, PublicCitizen},
    services::AccessGuard,
    utils::JsonBody,
    AppState,
};

#[utoipa::path(
    get,
    path = "/citizens",
    params(crate::dtos::resources::TenantQuery),
    responses(
        (status = 200, description = "Citizens of eligible client accounts", body = [PublicCitizen]),
        (status = 400, description = "Malformed client_account_id", body = ErrorResponse),
        (status = 401, description = "Not authenticated or client account not eligible", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Citizens"
)]
pub async fn list_citizens(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<Vec<PublicCitizen>>, AppError> {
    let rows = AccessGuard::new(&auth.context)
        .secure_get_list::<Citizen, _>(&*state.store, auth.context.client_account_id, false)
        .await?;
    Ok(Json(export_all(&rows)))
}

#[utoipa::path(
    get,
    path = "/citizens/{id}",
    params(("id" = i64, Path, description = "Citizen id")),
    responses(
        (status = 200, description = "Citizen", body = PublicCitizen),
        (status = 403, description = "Owning client account not eligible", body = ErrorResponse),
        (status = 404, description = "Citizen not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Citizens"
)]
pub async fn get_citizen(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<PublicCitizen>, AppError> {
    let citizen: Citizen = AccessGuard::new(&auth.context)
        .secure_get(&*state.store, id, false)
        .await?;
    Ok(Json(citizen.to_public()))
}

#[utoipa::path(
    patch,
    path = "/citizens/{id}",
    params(("id" = i64, Path, description = "Citizen id")),
    request_body = CitizenPatch,
    responses(
        (status = 200, description = "Updated citizen", body = PublicCitizen),
        (status = 400, description = "Invalid patch", body = ErrorResponse),
        (status = 403, description = "Owning client account not eligible", body = ErrorResponse),
        (status = 404, description = "Citizen not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Citizens"
)]
pub async fn update_citizen(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<CitizenPatch>,
) -> Result<Json<PublicCitizen>, AppError> {
    let citizen: Citizen = AccessGuard::new(&auth.context)
        .secure_update(&*state.store, id, patch, false)
        .await?;
    Ok(Json(citizen.to_public()))
}

#[utoipa::path(
    post,
    path = "/citizens",
    request_body = NewCitizen,
    responses(
        (status = 201, description = "Created citizen", body = PublicCitizen),
        (status = 400, description = "Invalid citizen", body = ErrorResponse),
        (status = 403, description = "Client account not eligible", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Citizens"
)]
pub async fn create_citizen(
    State(state): State<AppState>,
    Auth(auth): Auth,
    JsonBody(draft): JsonBody<NewCitizen>,
) -> Result<(StatusCode, Json<PublicCitizen>), AppError> {
    let citizen: Citizen = AccessGuard::new(&auth.context)
        .secure_create(&*state.store, draft, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(citizen.to_public())))
}
