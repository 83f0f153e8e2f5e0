use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

use crate::{models::ClientAccountId, services::ServiceError};

/// JSON body extractor that runs `validator` rules. Both parse and rule
/// failures answer 400.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// JSON body extractor for payloads whose rules are checked later, such as
/// patches. Parse failures answer 400.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;
        Ok(JsonBody(value))
    }
}

/// Parses the optional `client_account_id` query value. Anything but an
/// integer is a validation error.
pub fn parse_client_account_id(raw: Option<&str>) -> Result<Option<ClientAccountId>, ServiceError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<i64>().map(|id| Some(ClientAccountId(id))).map_err(|_| {
            ServiceError::ValidationError(format!(
                "Incorrect argument {}. Should be integer.",
                value
            ))
        }),
    }
}

/// Extracts `client_account_id` from a raw query string.
pub fn client_account_id_from_query(
    query: Option<&str>,
) -> Result<Option<ClientAccountId>, ServiceError> {
    let raw = query.and_then(|q| {
        q.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == "client_account_id").then_some(value)
        })
    });
    parse_client_account_id(raw)
}
