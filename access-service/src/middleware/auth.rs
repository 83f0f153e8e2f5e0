use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    services::{Authenticated, ServiceError, TokenKind},
    utils::client_account_id_from_query,
    AppState,
};

/// Raw bearer token of the current request, kept for logout.
#[derive(Debug, Clone)]
pub struct PresentedToken(pub String);

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Requires a valid access token and stores the resulting context in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let requested = client_account_id_from_query(req.uri().query())?;

    let token = bearer_token(req.headers()).ok_or(ServiceError::AuthenticationFailed)?;

    let authenticated = state
        .authenticator
        .authenticate(&token, TokenKind::Access, requested)
        .await?;

    tracing::debug!(user_id = %authenticated.context.user_id, "request authenticated");

    req.extensions_mut().insert(PresentedToken(token));
    req.extensions_mut().insert(authenticated);

    Ok(next.run(req).await)
}

/// Extractor for the context built by [`auth_middleware`].
pub struct Auth(pub Authenticated);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Auth context missing from request extensions"
                ))
            })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for PresentedToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PresentedToken>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Presented token missing from request extensions"
                ))
            })
    }
}
