//! Domain entities and the capability traits the access guard works over.

pub mod citizen;
pub mod client_account;
pub mod client_account_user;
pub mod contract;
pub mod ids;
pub mod used_password;
pub mod user;

pub use citizen::{Citizen, CitizenPatch, NewCitizen, PublicCitizen};
pub use client_account::{
    ClientAccount, ClientAccountPatch, NewClientAccount, PublicClientAccount, SequenceKind,
};
pub use client_account_user::{
    ClientAccountUser, ClientAccountUserPatch, NewClientAccountUser, PublicClientAccountUser,
    RoleCode,
};
pub use contract::{Contract, ContractPatch, NewContract, PublicContract};
pub use ids::{ClientAccountId, UserId};
pub use used_password::UsedPassword;
pub use user::{normalize_email, NewUser, PublicUser, User};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::ServiceError;

/// Converts an entity into the shape returned over the wire.
pub trait Exportable {
    type Public: Serialize;

    fn to_public(&self) -> Self::Public;
}

/// A stored row addressable by a numeric id.
pub trait Resource: Exportable + Clone + Send + Sync + 'static {
    /// Human-readable name used in not-found messages.
    const NAME: &'static str;

    fn id(&self) -> i64;

    /// Rows without a soft-delete flag are always active.
    fn is_active(&self) -> bool {
        true
    }
}

/// A resource owned by exactly one client account.
pub trait HasTenantOwner {
    fn tenant_id(&self) -> ClientAccountId;
}

/// Applies a partial update carried by a request body.
pub trait Patchable {
    type Patch;

    fn apply_patch(&mut self, patch: Self::Patch) -> Result<(), ServiceError>;
}

/// Builds an unsaved row from a create request body, with the same
/// validation a patch would apply. The id is assigned by the store.
pub trait Creatable: Sized {
    type Draft;

    fn from_draft(draft: Self::Draft, now: DateTime<Utc>) -> Result<Self, ServiceError>;
}
