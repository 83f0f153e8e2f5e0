use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use service_core::{
    axum::{
        extract::{Query, State},
        http::{header, HeaderMap},
        Json,
    },
    error::AppError,
};

use crate::{
    config::AccessConfig,
    dtos::{
        auth::{LoginQuery, LoginResponse, RefreshResponse, VerifyTokenResponse},
        StatusResponse,
    },
    middleware::{bearer_token, Auth, PresentedToken},
    models::Exportable,
    services::{ServiceError, TokenKind},
    utils::{client_account_id_from_query, Password},
    AppState,
};

pub const REFRESH_COOKIE: &str = "refresh_token";
pub const REFRESH_COOKIE_PATH: &str = "/auth/refresh-token";

/// Email and password from an `Authorization: Basic` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, Password)> {
    let encoded = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), Password::new(password.to_string())))
}

fn refresh_cookie(token: String, config: &AccessConfig) -> Cookie<'static> {
    let ttl = time::Duration::seconds(config.tokens.refresh_ttl_seconds);
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(config.security.secure_cookies)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(ttl)
        .expires(time::OffsetDateTime::now_utc() + ttl)
        .build()
}

/// Login with HTTP Basic credentials
#[utoipa::path(
    post,
    path = "/auth/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    security(("basic_auth" = [])),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let (email, password) =
        basic_credentials(&headers).ok_or(ServiceError::AuthenticationFailed)?;

    let outcome = state.auth_service.login(&email, &password).await?;

    let (jar, refresh_token) = if query.is_mobile() {
        (jar, Some(outcome.refresh_token))
    } else {
        (
            jar.add(refresh_cookie(outcome.refresh_token, &state.config)),
            None,
        )
    };

    Ok((
        jar,
        Json(LoginResponse {
            token: outcome.access_token,
            refresh_token,
            user: outcome.user.to_public(),
        }),
    ))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    params(crate::dtos::resources::TenantQuery),
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 400, description = "Malformed client_account_id", body = ErrorResponse),
        (status = 401, description = "Invalid or revoked refresh token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    uri: service_core::axum::http::Uri,
) -> Result<Json<RefreshResponse>, AppError> {
    let requested = client_account_id_from_query(uri.query())?;

    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or(ServiceError::AuthenticationFailed)?;

    let authenticated = state
        .authenticator
        .authenticate(&token, TokenKind::Refresh, requested)
        .await?;

    Ok(Json(RefreshResponse {
        token: state.auth_service.refresh(&authenticated.user)?,
    }))
}

/// Revoke the current tokens
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = StatusResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    PresentedToken(access_token): PresentedToken,
    jar: CookieJar,
) -> Result<(CookieJar, Json<StatusResponse>), AppError> {
    let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    state
        .auth_service
        .logout(&access_token, refresh_token.as_deref())
        .await;

    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH));
    Ok((jar, Json(StatusResponse::ok())))
}

/// Profile of the caller and the client accounts they may act on
#[utoipa::path(
    get,
    path = "/auth/verify-token",
    responses(
        (status = 200, description = "Token is valid", body = VerifyTokenResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
pub async fn verify_token(Auth(auth): Auth) -> Json<VerifyTokenResponse> {
    Json(VerifyTokenResponse {
        user: auth.user.to_public(),
        client_account_ids: auth.context.eligible.to_vec(),
    })
}
