use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{RegisterRequest, RegisterResponse},
        StatusResponse,
    },
    models::Exportable,
    services::Registration,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Register a new user
#[utoipa::path(
    post,
    path = "/register-user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, confirmation email sent", body = RegisterResponse),
        (status = 400, description = "Invalid input, weak password or email already registered", body = ErrorResponse)
    ),
    tag = "Registration"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = state
        .auth_service
        .register(Registration {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password: Password::new(req.password),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.to_public(),
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
        }),
    ))
}

/// Confirm an email address with the emailed token
#[utoipa::path(
    get,
    path = "/register-user/{token}",
    params(("token" = String, Path, description = "Registration token")),
    responses(
        (status = 200, description = "Email verified", body = StatusResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Registration"
)]
pub async fn confirm_registration(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    state.auth_service.confirm_registration(&token).await?;
    Ok(Json(StatusResponse::ok()))
}
