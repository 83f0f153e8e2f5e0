use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use super::export_all;
use crate::{
    dtos::resources::SequenceNumberResponse,
    middleware::Auth,
    models::{
        ClientAccount, ClientAccountId, ClientAccountPatch, Exportable, NewClientAccount,
        PublicClientAccount, SequenceKind,
    },
    services::AccessGuard,
    utils::JsonBody,
    AppState,
};

/// Client accounts the caller may act on
#[utoipa::path(
    get,
    path = "/client-accounts",
    params(crate::dtos::resources::TenantQuery),
    responses(
        (status = 200, description = "Eligible client accounts", body = [PublicClientAccount]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client accounts"
)]
pub async fn list_client_accounts(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<Vec<PublicClientAccount>>, AppError> {
    let rows = AccessGuard::new(&auth.context)
        .secure_get_list::<ClientAccount, _>(
            &*state.store,
            auth.context.client_account_id,
            true,
        )
        .await?;
    Ok(Json(export_all(&rows)))
}

/// Create a client account owned by the caller
#[utoipa::path(
    post,
    path = "/client-accounts",
    request_body = NewClientAccount,
    responses(
        (status = 201, description = "Created client account", body = PublicClientAccount),
        (status = 400, description = "Invalid client account", body = ErrorResponse),
        (status = 409, description = "unique_name already in use", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client accounts"
)]
pub async fn create_client_account(
    State(state): State<AppState>,
    Auth(auth): Auth,
    JsonBody(draft): JsonBody<NewClientAccount>,
) -> Result<(StatusCode, Json<PublicClientAccount>), AppError> {
    let account = AccessGuard::new(&auth.context)
        .create_client_account(&*state.store, draft, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(account.to_public())))
}

#[utoipa::path(
    get,
    path = "/client-accounts/{id}",
    params(("id" = i64, Path, description = "Client account id")),
    responses(
        (status = 200, description = "Client account", body = PublicClientAccount),
        (status = 403, description = "Client account not eligible", body = ErrorResponse),
        (status = 404, description = "Client account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client accounts"
)]
pub async fn get_client_account(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<PublicClientAccount>, AppError> {
    let account: ClientAccount = AccessGuard::new(&auth.context)
        .secure_get(&*state.store, id, true)
        .await?;
    Ok(Json(account.to_public()))
}

#[utoipa::path(
    patch,
    path = "/client-accounts/{id}",
    params(("id" = i64, Path, description = "Client account id")),
    request_body = ClientAccountPatch,
    responses(
        (status = 200, description = "Updated client account", body = PublicClientAccount),
        (status = 400, description = "Invalid patch", body = ErrorResponse),
        (status = 403, description = "Client account not eligible", body = ErrorResponse),
        (status = 404, description = "Client account not found", body = ErrorResponse),
        (status = 409, description = "unique_name already in use", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client accounts"
)]
pub async fn update_client_account(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<ClientAccountPatch>,
) -> Result<Json<PublicClientAccount>, AppError> {
    let account: ClientAccount = AccessGuard::new(&auth.context)
        .secure_update(&*state.store, id, patch, true)
        .await?;
    tracing::info!(user_id = %auth.context.user_id, client_account_id = id, "client account updated");
    Ok(Json(account.to_public()))
}

/// Allocate the next document number of a kind
#[utoipa::path(
    post,
    path = "/client-accounts/{id}/sequences/{kind}",
    params(
        ("id" = i64, Path, description = "Client account id"),
        ("kind" = String, Path, description = "Sequence kind, e.g. sale_invoice")
    ),
    responses(
        (status = 200, description = "Allocated number", body = SequenceNumberResponse),
        (status = 400, description = "Unknown sequence kind", body = ErrorResponse),
        (status = 403, description = "Client account not eligible", body = ErrorResponse),
        (status = 404, description = "Client account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Client accounts"
)]
pub async fn next_sequence_number(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path((id, kind)): Path<(i64, String)>,
) -> Result<Json<SequenceNumberResponse>, AppError> {
    let kind: SequenceKind = kind.parse()?;
    let value = AccessGuard::new(&auth.context)
        .next_sequence_number(&*state.store, ClientAccountId(id), kind)
        .await?;
    Ok(Json(SequenceNumberResponse {
        client_account_id: ClientAccountId(id),
        kind: kind.as_str().to_string(),
        value,
    }))
}
