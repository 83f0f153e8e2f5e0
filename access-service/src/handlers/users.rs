use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    middleware::Auth,
    models::{Exportable, PublicUser, UserId},
    services::AccessGuard,
    AppState,
};

/// Profile of a user sharing an eligible client account with the caller
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = PublicUser),
        (status = 403, description = "User not in an eligible client account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<PublicUser>, AppError> {
    let user = AccessGuard::new(&auth.context)
        .secure_get_user(&*state.store, UserId(id))
        .await?;
    Ok(Json(user.to_public()))
}
