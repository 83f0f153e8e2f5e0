use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{
            MobileResetCheckRequest, MobileResetRequest, MobileResetResponse,
            NewPasswordRequest, ResetPasswordRequest, ResetTokenResponse,
        },
        StatusResponse,
    },
    services::Language,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 201, description = "Reset link sent if the email is registered", body = StatusResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn request_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), AppError> {
    state.password_service.request_reset(&req.email).await?;
    Ok((StatusCode::CREATED, Json(StatusResponse::ok())))
}

/// Check that a reset token is still valid
#[utoipa::path(
    get,
    path = "/reset-password/{token}",
    params(("token" = String, Path, description = "Reset password token")),
    responses(
        (status = 200, description = "Token is valid", body = StatusResponse),
        (status = 401, description = "Invalid, expired or used token", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn validate_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    state.password_service.validate_reset_token(&token).await?;
    Ok(Json(StatusResponse::ok()))
}

/// Send a short reset code for mobile clients
#[utoipa::path(
    post,
    path = "/reset-password-mobile",
    request_body = MobileResetRequest,
    responses(
        (status = 200, description = "Code sent", body = MobileResetResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn request_mobile_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<MobileResetRequest>,
) -> Result<Json<MobileResetResponse>, AppError> {
    let date = state
        .password_service
        .request_mobile_code(&req.email, Language::from_code(req.lang.as_deref()))
        .await?;
    Ok(Json(MobileResetResponse {
        status: "ok".to_string(),
        date,
    }))
}

/// Exchange a mobile reset code for a reset token
#[utoipa::path(
    post,
    path = "/reset-password-mobile-check",
    request_body = MobileResetCheckRequest,
    responses(
        (status = 200, description = "Code accepted", body = ResetTokenResponse),
        (status = 401, description = "Wrong or expired code", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn check_mobile_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<MobileResetCheckRequest>,
) -> Result<Json<ResetTokenResponse>, AppError> {
    let token = state
        .password_service
        .check_mobile_code(&req.email, &req.date, &req.code)
        .await?;
    Ok(Json(ResetTokenResponse { token }))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/new-password",
    request_body = NewPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = StatusResponse),
        (status = 400, description = "Weak or previously used password", body = ErrorResponse),
        (status = 401, description = "Invalid, expired or used token", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn new_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<NewPasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    state
        .password_service
        .set_new_password(&req.token, &Password::new(req.password))
        .await?;
    Ok(Json(StatusResponse::ok()))
}
