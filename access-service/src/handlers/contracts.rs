use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use super::export_all;
use crate::{
    middleware::Auth,
    models::{ContractPatch, Exportable, NewContract, PublicContract},
    services::AccessGuard,
    utils::JsonBody,
    AppState,
};

/// Contracts with at least one eligible endpoint
#[utoipa::path(
    get,
    path = "/contracts",
    params(crate::dtos::resources::TenantQuery),
    responses(
        (status = 200, description = "Visible contracts", body = [PublicContract]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn list_contracts(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<Vec<PublicContract>>, AppError> {
    let rows = AccessGuard::new(&auth.context)
        .secure_get_contract_list(&*state.store, auth.context.client_account_id)
        .await?;
    Ok(Json(export_all(&rows)))
}

#[utoipa::path(
    get,
    path = "/contracts/{id}",
    params(("id" = i64, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Contract", body = PublicContract),
        (status = 403, description = "Neither endpoint is eligible", body = ErrorResponse),
        (status = 404, description = "Contract not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn get_contract(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<PublicContract>, AppError> {
    let contract = AccessGuard::new(&auth.context)
        .secure_get_contract(&*state.store, id)
        .await?;
    Ok(Json(contract.to_public()))
}

#[utoipa::path(
    patch,
    path = "/contracts/{id}",
    params(("id" = i64, Path, description = "Contract id")),
    request_body = ContractPatch,
    responses(
        (status = 200, description = "Updated contract", body = PublicContract),
        (status = 403, description = "Endpoint not eligible", body = ErrorResponse),
        (status = 404, description = "Contract or client account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn update_contract(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<ContractPatch>,
) -> Result<Json<PublicContract>, AppError> {
    let contract = AccessGuard::new(&auth.context)
        .secure_update_contract(&*state.store, id, patch)
        .await?;
    tracing::info!(user_id = %auth.context.user_id, contract_id = id, "contract updated");
    Ok(Json(contract.to_public()))
}

/// Link two client accounts; both must be eligible
#[utoipa::path(
    post,
    path = "/contracts",
    request_body = NewContract,
    responses(
        (status = 201, description = "Created contract", body = PublicContract),
        (status = 403, description = "Endpoint not eligible", body = ErrorResponse),
        (status = 404, description = "Client account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn create_contract(
    State(state): State<AppState>,
    Auth(auth): Auth,
    JsonBody(draft): JsonBody<NewContract>,
) -> Result<(StatusCode, Json<PublicContract>), AppError> {
    let contract = AccessGuard::new(&auth.context)
        .secure_create_contract(&*state.store, draft, state.clock.now())
        .await?;
    tracing::info!(user_id = %auth.context.user_id, contract_id = contract.id, "contract created");
    Ok((StatusCode::CREATED, Json(contract.to_public())))
}
