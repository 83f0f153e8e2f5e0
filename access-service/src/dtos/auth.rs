use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{ClientAccountId, PublicUser};

/// Client identifier that switches refresh-token delivery from cookie to body.
pub const MOBILE_CLIENT_ID: &str = "mobile";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// `mobile` returns the refresh token in the body instead of a cookie.
    pub client_id: Option<String>,
}

impl LoginQuery {
    pub fn is_mobile(&self) -> bool {
        self.client_id.as_deref() == Some(MOBILE_CLIENT_ID)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyTokenResponse {
    pub user: PublicUser,
    /// Client accounts the caller may act on.
    #[schema(value_type = Vec<i64>)]
    pub client_account_ids: Vec<ClientAccountId>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "kari@example.com")]
    pub email: String,

    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    #[schema(example = "Kari")]
    pub first_name: String,

    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    #[schema(example = "Nordmann")]
    pub last_name: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: PublicUser,
    #[schema(example = "Registration successful. Please check your email to verify your account.")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "kari@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MobileResetRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "kari@example.com")]
    pub email: String,

    /// Language of the message, `nb` for Norwegian.
    #[schema(example = "nb")]
    pub lang: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MobileResetResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Issue timestamp to send back with the code.
    #[schema(example = "2024-03-01 12:00:00.000000")]
    pub date: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MobileResetCheckRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Date is required"))]
    #[schema(example = "2024-03-01 12:00:00.000000")]
    pub date: String,

    #[validate(length(min = 1, max = 8, message = "Invalid code"))]
    #[schema(example = "1894")]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetTokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}
