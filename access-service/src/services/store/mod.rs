//! Storage seams. Adapters return `anyhow::Error`; the services above them
//! translate into the domain taxonomy.

mod memory;
mod postgres;

pub use memory::{MemoryStore, MemoryTable};
pub use postgres::{PgStore, SqlResource};

use async_trait::async_trait;

use crate::models::{
    Citizen, ClientAccount, ClientAccountId, ClientAccountUser, Contract, NewUser, Resource,
    RoleCode, SequenceKind, User, UserId,
};

/// A write collided with a unique column. Adapters wrap it in
/// `anyhow::Error`; the service layer turns it into a conflict.
#[derive(Debug, thiserror::Error)]
#[error("{0} is already in use")]
pub struct UniqueViolation(pub String);

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Lookup by already-normalised email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, anyhow::Error>;
    async fn insert_user(&self, user: NewUser) -> Result<User, anyhow::Error>;
    async fn update_user(&self, user: &User) -> Result<(), anyhow::Error>;
    async fn password_used_before(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<bool, anyhow::Error>;
    async fn record_used_password(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Tenants where the user has an active membership row.
    async fn active_memberships(&self, user_id: UserId)
        -> Result<Vec<ClientAccountId>, anyhow::Error>;

    /// Contracts with either endpoint in `accounts`.
    async fn contracts_touching(
        &self,
        accounts: &[ClientAccountId],
    ) -> Result<Vec<Contract>, anyhow::Error>;

    /// Tenants where the user has any membership row, active or not.
    async fn tenants_of_user(&self, user_id: UserId)
        -> Result<Vec<ClientAccountId>, anyhow::Error>;
}

#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Allocates the next value of `kind` for the account. The increment is
    /// atomic per account row. `None` when the account does not exist.
    async fn next_sequence_number(
        &self,
        account: ClientAccountId,
        kind: SequenceKind,
    ) -> Result<Option<i64>, anyhow::Error>;
}

/// Tenant-scoped row access used by the access guard.
#[async_trait]
pub trait Repository<R: Resource>: Send + Sync {
    async fn find(&self, id: i64) -> Result<Option<R>, anyhow::Error>;

    /// Rows belonging to any of `tenants`. Soft-deleted rows are skipped when
    /// `active_only` is set.
    async fn list_in_tenants(
        &self,
        tenants: &[ClientAccountId],
        active_only: bool,
    ) -> Result<Vec<R>, anyhow::Error>;

    async fn save(&self, row: &R) -> Result<(), anyhow::Error>;

    /// Stores a new row. The id of `row` is ignored; the stored row, with
    /// its assigned id, is returned.
    async fn insert(&self, row: &R) -> Result<R, anyhow::Error>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Inserts a client account together with the creator's active
    /// membership, atomically.
    async fn create_client_account(
        &self,
        account: &ClientAccount,
        owner: UserId,
        role_code: RoleCode,
    ) -> Result<(ClientAccount, ClientAccountUser), anyhow::Error>;
}

/// Everything the service needs from persistent storage.
#[async_trait]
pub trait Store:
    CredentialStore
    + MembershipStore
    + SequenceStore
    + TenantStore
    + Repository<ClientAccount>
    + Repository<Contract>
    + Repository<Citizen>
    + Repository<ClientAccountUser>
{
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}
