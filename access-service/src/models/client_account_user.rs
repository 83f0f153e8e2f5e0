//! Membership edges between users and client accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;

use super::{
    ClientAccountId, Creatable, Exportable, HasTenantOwner, Patchable, Resource, UserId,
};
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RoleCode {
    /// System administrator
    SA,
    /// Accounting firm owner
    AA,
    /// Client owner
    CA,
    /// Bookkeeper
    BK,
    /// Employee
    EM,
}

impl RoleCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleCode::SA => "SA",
            RoleCode::AA => "AA",
            RoleCode::CA => "CA",
            RoleCode::BK => "BK",
            RoleCode::EM => "EM",
        }
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role code: {0}")]
pub struct UnknownRoleCode(String);

impl TryFrom<String> for RoleCode {
    type Error = UnknownRoleCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "SA" => Ok(RoleCode::SA),
            "AA" => Ok(RoleCode::AA),
            "CA" => Ok(RoleCode::CA),
            "BK" => Ok(RoleCode::BK),
            "EM" => Ok(RoleCode::EM),
            _ => Err(UnknownRoleCode(value)),
        }
    }
}

/// Only rows with `is_active` count toward membership. Rows are soft-deleted.
#[derive(Debug, Clone, FromRow)]
pub struct ClientAccountUser {
    pub id: i64,
    pub client_account_id: ClientAccountId,
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub role_code: RoleCode,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicClientAccountUser {
    pub id: i64,
    pub client_account_id: ClientAccountId,
    pub user_id: UserId,
    pub role_code: RoleCode,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClientAccountUserPatch {
    pub role_code: Option<RoleCode>,
    pub is_active: Option<bool>,
}

/// New memberships start active.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewClientAccountUser {
    pub client_account_id: ClientAccountId,
    pub user_id: UserId,
    pub role_code: RoleCode,
}

impl Exportable for ClientAccountUser {
    type Public = PublicClientAccountUser;

    fn to_public(&self) -> PublicClientAccountUser {
        PublicClientAccountUser {
            id: self.id,
            client_account_id: self.client_account_id,
            user_id: self.user_id,
            role_code: self.role_code,
            is_active: self.is_active,
        }
    }
}

impl Resource for ClientAccountUser {
    const NAME: &'static str = "Client account user";

    fn id(&self) -> i64 {
        self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl HasTenantOwner for ClientAccountUser {
    fn tenant_id(&self) -> ClientAccountId {
        self.client_account_id
    }
}

impl Patchable for ClientAccountUser {
    type Patch = ClientAccountUserPatch;

    fn apply_patch(&mut self, patch: ClientAccountUserPatch) -> Result<(), ServiceError> {
        if let Some(role) = patch.role_code {
            self.role_code = role;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        Ok(())
    }
}

impl Creatable for ClientAccountUser {
    type Draft = NewClientAccountUser;

    fn from_draft(draft: NewClientAccountUser, _now: DateTime<Utc>) -> Result<Self, ServiceError> {
        Ok(ClientAccountUser {
            id: 0,
            client_account_id: draft.client_account_id,
            user_id: draft.user_id,
            role_code: draft.role_code,
            is_active: true,
        })
    }
}
