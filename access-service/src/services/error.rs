use service_core::error::AppError;
use thiserror::Error;

use super::jwt::TokenError;
use super::store::UniqueViolation;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Any failure to establish who the caller is. The message is always
    /// generic so callers learn nothing about which step failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Tenant not eligible")]
    TenantNotEligible,

    #[error("{0} not found")]
    ResourceNotFound(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Password is too weak: {0}")]
    WeakPassword(String),

    #[error("Password was used before")]
    PasswordReused,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("User not found")]
    UserNotFound,

    #[error("{0} is already in use")]
    AlreadyExists(String),

    #[error("Internal server error: {0}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<UniqueViolation>() {
            Ok(UniqueViolation(key)) => ServiceError::AlreadyExists(key),
            Err(err) => ServiceError::Internal(err),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(e) => ServiceError::Internal(anyhow::anyhow!(e)),
            other => {
                tracing::debug!(reason = %other, "token rejected");
                ServiceError::AuthenticationFailed
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::AuthenticationFailed => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication failed"))
            }
            ServiceError::TenantNotEligible => {
                AppError::Forbidden(anyhow::anyhow!("Access to this client account is not allowed"))
            }
            ServiceError::ResourceNotFound(name) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", name))
            }
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::WeakPassword(e) => {
                AppError::BadRequest(anyhow::anyhow!("Password is too weak: {}", e))
            }
            ServiceError::PasswordReused => AppError::BadRequest(anyhow::anyhow!(
                "Please choose a password you have not used before"
            )),
            ServiceError::EmailAlreadyRegistered => {
                AppError::BadRequest(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::AlreadyExists(key) => {
                AppError::Conflict(anyhow::anyhow!("{} is already in use", key))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
