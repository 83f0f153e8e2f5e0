//! Contracts link an accounting firm account to a client company account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{ClientAccountId, Creatable, Exportable, Patchable, Resource};
use crate::services::ServiceError;

/// A contract has two tenant endpoints, so it does not implement
/// `HasTenantOwner`; the guard checks both ends.
#[derive(Debug, Clone, FromRow)]
pub struct Contract {
    pub id: i64,
    pub accounting_client_account_id: ClientAccountId,
    pub client_account_id: ClientAccountId,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicContract {
    pub id: i64,
    pub accounting_client_account_id: ClientAccountId,
    pub client_account_id: ClientAccountId,
}

/// Endpoint reassignment. Either side may be moved.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ContractPatch {
    pub accounting_client_account_id: Option<ClientAccountId>,
    pub client_account_id: Option<ClientAccountId>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewContract {
    pub accounting_client_account_id: ClientAccountId,
    pub client_account_id: ClientAccountId,
}

impl Contract {
    pub fn endpoints(&self) -> [ClientAccountId; 2] {
        [self.accounting_client_account_id, self.client_account_id]
    }

    /// The endpoint opposite `side`, if `side` is one of them.
    pub fn other_endpoint(&self, side: ClientAccountId) -> Option<ClientAccountId> {
        if side == self.accounting_client_account_id {
            Some(self.client_account_id)
        } else if side == self.client_account_id {
            Some(self.accounting_client_account_id)
        } else {
            None
        }
    }
}

impl Exportable for Contract {
    type Public = PublicContract;

    fn to_public(&self) -> PublicContract {
        PublicContract {
            id: self.id,
            accounting_client_account_id: self.accounting_client_account_id,
            client_account_id: self.client_account_id,
        }
    }
}

impl Resource for Contract {
    const NAME: &'static str = "Contract";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Patchable for Contract {
    type Patch = ContractPatch;

    fn apply_patch(&mut self, patch: ContractPatch) -> Result<(), ServiceError> {
        if let Some(firm) = patch.accounting_client_account_id {
            self.accounting_client_account_id = firm;
        }
        if let Some(company) = patch.client_account_id {
            self.client_account_id = company;
        }
        Ok(())
    }
}

impl Creatable for Contract {
    type Draft = NewContract;

    fn from_draft(draft: NewContract, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        Ok(Contract {
            id: 0,
            accounting_client_account_id: draft.accounting_client_account_id,
            client_account_id: draft.client_account_id,
            created_utc: now,
        })
    }
}
