use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::ClientAccountId;

/// Optional tenant filter accepted by list endpoints. Parsed by the auth
/// middleware, so only its presence matters to the OpenAPI document.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TenantQuery {
    pub client_account_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SequenceNumberResponse {
    #[schema(value_type = i64)]
    pub client_account_id: ClientAccountId,
    #[schema(example = "sale_invoice")]
    pub kind: String,
    #[schema(example = 10000)]
    pub value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub database: String,
    pub revocation_cache: String,
}
