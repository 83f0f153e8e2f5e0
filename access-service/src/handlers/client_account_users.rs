//! Membership rows. Only active rows are visible; PATCH with
//! `is_active = false` soft-deletes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use super::export_all;
use crate::{
    middleware::Auth,
    models::{
        ClientAccountUser, ClientAccountUserPatch, Exportable, NewClientAccountUser,
        PublicClientAccountUser,
    },
    services::AccessGuard,
    utils::JsonBody,
    AppState,
};

#[utoipa::path(
    get,
    path = "/client-account-users",
    params(crate::dtos::resources::TenantQuery),
    responses(
        (status = 200, description = "Active memberships of eligible client accounts", body = [PublicClientAccountUser]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client account users"
)]
pub async fn list_client_account_users(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<Vec<PublicClientAccountUser>>, AppError> {
    let rows = AccessGuard::new(&auth.context)
        .secure_get_list::<ClientAccountUser, _>(
            &*state.store,
            auth.context.client_account_id,
            true,
        )
        .await?;
    Ok(Json(export_all(&rows)))
}

#[utoipa::path(
    get,
    path = "/client-account-users/{id}",
    params(("id" = i64, Path, description = "Membership id")),
    responses(
        (status = 200, description = "Membership", body = PublicClientAccountUser),
        (status = 403, description = "Client account not eligible", body = ErrorResponse),
        (status = 404, description = "Membership not found or inactive", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client account users"
)]
pub async fn get_client_account_user(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<PublicClientAccountUser>, AppError> {
    let row: ClientAccountUser = AccessGuard::new(&auth.context)
        .secure_get(&*state.store, id, true)
        .await?;
    Ok(Json(row.to_public()))
}

#[utoipa::path(
    patch,
    path = "/client-account-users/{id}",
    params(("id" = i64, Path, description = "Membership id")),
    request_body = ClientAccountUserPatch,
    responses(
        (status = 200, description = "Updated membership", body = PublicClientAccountUser),
        (status = 403, description = "Client account not eligible", body = ErrorResponse),
        (status = 404, description = "Membership not found or inactive", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client account users"
)]
pub async fn update_client_account_user(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<ClientAccountUserPatch>,
) -> Result<Json<PublicClientAccountUser>, AppError> {
    let row: ClientAccountUser = AccessGuard::new(&auth.context)
        .secure_update(&*state.store, id, patch, true)
        .await?;
    tracing::info!(
        user_id = %auth.context.user_id,
        membership_id = id,
        is_active = row.is_active,
        role_code = %row.role_code,
        "membership updated"
    );
    Ok(Json(row.to_public()))
}

#[utoipa::path(
    post,
    path = "/client-account-users",
    request_body = NewClientAccountUser,
    responses(
        (status = 201, description = "Created membership", body = PublicClientAccountUser),
        (status = 403, description = "Client account not eligible", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client account users"
)]
pub async fn create_client_account_user(
    State(state): State<AppState>,
    Auth(auth): Auth,
    JsonBody(draft): JsonBody<NewClientAccountUser>,
) -> Result<(StatusCode, Json<PublicClientAccountUser>), AppError> {
    let row = AccessGuard::new(&auth.context)
        .secure_create_membership(&*state.store, draft, state.clock.now())
        .await?;
    tracing::info!(
        user_id = %auth.context.user_id,
        membership_id = row.id,
        member_id = %row.user_id,
        role_code = %row.role_code,
        "membership created"
    );
    Ok((StatusCode::CREATED, Json(row.to_public())))
}
