//! PostgreSQL store.

use async_trait::async_trait;
use sqlx::{
    postgres::{PgArguments, PgPool, PgPoolOptions, PgRow},
    query::{Query, QueryAs},
    FromRow, Postgres,
};
use std::time::Duration;

use super::{
    CredentialStore, MembershipStore, Repository, SequenceStore, Store, TenantStore,
    UniqueViolation,
};
use crate::config::DatabaseConfig;
use crate::models::{
    Citizen, ClientAccount, ClientAccountId, ClientAccountUser, Contract, NewUser, Resource,
    RoleCode, SequenceKind, User, UserId,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;

        tracing::info!("Successfully connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn ids(accounts: &[ClientAccountId]) -> Vec<i64> {
    accounts.iter().map(|a| a.0).collect()
}

/// Unique-key violations become [`UniqueViolation`] so the service layer
/// can report a conflict; everything else stays opaque.
fn write_error(e: sqlx::Error, context: String) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let key = db.constraint().unwrap_or("unique key").to_string();
            return UniqueViolation(key).into();
        }
    }
    anyhow::anyhow!("{}: {}", context, e)
}

/// Table metadata for rows served through the generic repository.
pub trait SqlResource: Resource + for<'r> FromRow<'r, PgRow> + Unpin {
    const TABLE: &'static str;
    /// Predicate over `$1` (a `BIGINT[]` of tenant ids).
    const TENANT_FILTER: &'static str;
    const HAS_ACTIVE_FLAG: bool;

    fn update_query(&self) -> Query<'_, Postgres, PgArguments>;

    /// `INSERT ... RETURNING *` for every column except the generated ones.
    fn insert_query(&self) -> QueryAs<'_, Postgres, Self, PgArguments>;
}

impl SqlResource for ClientAccount {
    const TABLE: &'static str = "client_accounts";
    const TENANT_FILTER: &'static str = "id = ANY($1)";
    const HAS_ACTIVE_FLAG: bool = true;

    fn update_query(&self) -> Query<'_, Postgres, PgArguments> {
        sqlx::query(
            r#"
            UPDATE client_accounts
            SET unique_name = $2, display_name = $3, accounting_currency = $4,
                accountant_notes = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.unique_name)
        .bind(&self.display_name)
        .bind(&self.accounting_currency)
        .bind(&self.accountant_notes)
        .bind(self.is_active)
    }

    fn insert_query(&self) -> QueryAs<'_, Postgres, Self, PgArguments> {
        sqlx::query_as(
            r#"
            INSERT INTO client_accounts
                (unique_name, display_name, accounting_currency, accountant_notes, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&self.unique_name)
        .bind(&self.display_name)
        .bind(&self.accounting_currency)
        .bind(&self.accountant_notes)
        .bind(self.is_active)
    }
}

impl SqlResource for Contract {
    const TABLE: &'static str = "contracts";
    const TENANT_FILTER: &'static str =
        "accounting_client_account_id = ANY($1) OR client_account_id = ANY($1)";
    const HAS_ACTIVE_FLAG: bool = false;

    fn update_query(&self) -> Query<'_, Postgres, PgArguments> {
        sqlx::query(
            "UPDATE contracts SET accounting_client_account_id = $2, client_account_id = $3 WHERE id = $1",
        )
        .bind(self.id)
        .bind(self.accounting_client_account_id)
        .bind(self.client_account_id)
    }

    fn insert_query(&self) -> QueryAs<'_, Postgres, Self, PgArguments> {
        sqlx::query_as(
            "INSERT INTO contracts (accounting_client_account_id, client_account_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(self.accounting_client_account_id)
        .bind(self.client_account_id)
    }
}

impl SqlResource for Citizen {
    const TABLE: &'static str = "citizens";
    const TENANT_FILTER: &'static str = "client_account_id = ANY($1)";
    const HAS_ACTIVE_FLAG: bool = true;

    fn update_query(&self) -> Query<'_, Postgres, PgArguments> {
        sqlx::query(
            r#"
            UPDATE citizens
            SET name = $2, surname = $3, age = $4, salary = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.surname)
        .bind(self.age)
        .bind(self.salary)
        .bind(self.is_active)
    }

    fn insert_query(&self) -> QueryAs<'_, Postgres, Self, PgArguments> {
        sqlx::query_as(
            r#"
            INSERT INTO citizens (client_account_id, name, surname, age, salary, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(self.client_account_id)
        .bind(&self.name)
        .bind(&self.surname)
        .bind(self.age)
        .bind(self.salary)
        .bind(self.is_active)
    }
}

impl SqlResource for ClientAccountUser {
    const TABLE: &'static str = "client_account_users";
    const TENANT_FILTER: &'static str = "client_account_id = ANY($1)";
    const HAS_ACTIVE_FLAG: bool = true;

    fn update_query(&self) -> Query<'_, Postgres, PgArguments> {
        sqlx::query("UPDATE client_account_users SET role_code = $2, is_active = $3 WHERE id = $1")
            .bind(self.id)
            .bind(self.role_code.as_str())
            .bind(self.is_active)
    }

    fn insert_query(&self) -> QueryAs<'_, Postgres, Self, PgArguments> {
        sqlx::query_as(
            r#"
            INSERT INTO client_account_users (client_account_id, user_id, role_code, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(self.client_account_id)
        .bind(self.user_id)
        .bind(self.role_code.as_str())
        .bind(self.is_active)
    }
}

#[async_trait]
impl<R: SqlResource> Repository<R> for PgStore {
    async fn find(&self, id: i64) -> Result<Option<R>, anyhow::Error> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", R::TABLE);
        sqlx::query_as::<_, R>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load {} {}: {}", R::NAME, id, e))
    }

    async fn list_in_tenants(
        &self,
        tenants: &[ClientAccountId],
        active_only: bool,
    ) -> Result<Vec<R>, anyhow::Error> {
        let active = if active_only && R::HAS_ACTIVE_FLAG {
            " AND is_active"
        } else {
            ""
        };
        let sql = format!(
            "SELECT * FROM {} WHERE ({}){} ORDER BY id",
            R::TABLE,
            R::TENANT_FILTER,
            active
        );
        sqlx::query_as::<_, R>(&sql)
            .bind(ids(tenants))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list {}: {}", R::TABLE, e))
    }

    async fn save(&self, row: &R) -> Result<(), anyhow::Error> {
        row.update_query()
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, format!("Failed to save {} {}", R::NAME, row.id())))?;
        Ok(())
    }

    async fn insert(&self, row: &R) -> Result<R, anyhow::Error> {
        row.insert_query()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, format!("Failed to insert {}", R::NAME)))
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn create_client_account(
        &self,
        account: &ClientAccount,
        owner: UserId,
        role_code: RoleCode,
    ) -> Result<(ClientAccount, ClientAccountUser), anyhow::Error> {
        let mut tx = self.pool.begin().await?;

        let account = account
            .insert_query()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error(e, "Failed to insert client account".to_string()))?;

        let membership = ClientAccountUser {
            id: 0,
            client_account_id: account.id,
            user_id: owner,
            role_code,
            is_active: true,
        };
        let membership = membership
            .insert_query()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error(e, "Failed to insert client account user".to_string()))?;

        tx.commit().await?;
        Ok((account, membership))
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, anyhow::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, anyhow::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, email_verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to insert user: {}", e))
    }

    async fn update_user(&self, user: &User) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, first_name = $3, last_name = $4, email_verified = $5,
                failed_login_attempts = $6, last_login_utc = $7,
                reset_password_attempts = $8, reset_password_requested_utc = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email_verified)
        .bind(user.failed_login_attempts)
        .bind(user.last_login_utc)
        .bind(user.reset_password_attempts)
        .bind(user.reset_password_requested_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to update user {}: {}", user.id, e))?;
        Ok(())
    }

    async fn password_used_before(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<bool, anyhow::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM used_passwords WHERE user_id = $1 AND fingerprint = $2)",
        )
        .bind(user_id)
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!(e))
    }

    async fn record_used_password(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<(), anyhow::Error> {
        sqlx::query("INSERT INTO used_passwords (user_id, fingerprint) VALUES ($1, $2)")
            .bind(user_id)
            .bind(fingerprint)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn active_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ClientAccountId>, anyhow::Error> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT client_account_id FROM client_account_users WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
        Ok(rows.into_iter().map(ClientAccountId).collect())
    }

    async fn contracts_touching(
        &self,
        accounts: &[ClientAccountId],
    ) -> Result<Vec<Contract>, anyhow::Error> {
        if accounts.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Contract>(
            "SELECT * FROM contracts WHERE accounting_client_account_id = ANY($1) OR client_account_id = ANY($1)",
        )
        .bind(ids(accounts))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!(e))
    }

    async fn tenants_of_user(&self, user_id: UserId) -> Result<Vec<ClientAccountId>, anyhow::Error> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT client_account_id FROM client_account_users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
        Ok(rows.into_iter().map(ClientAccountId).collect())
    }
}

#[async_trait]
impl SequenceStore for PgStore {
    async fn next_sequence_number(
        &self,
        account: ClientAccountId,
        kind: SequenceKind,
    ) -> Result<Option<i64>, anyhow::Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent allocations for the same account.
        let select = format!(
            "SELECT {} FROM client_accounts WHERE id = $1 FOR UPDATE",
            kind.column()
        );
        let last = sqlx::query_scalar::<Postgres, Option<i64>>(&select)
            .bind(account)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(last) = last else {
            return Ok(None);
        };
        let next = kind.next_after(last);

        let update = format!("UPDATE client_accounts SET {} = $2 WHERE id = $1", kind.column());
        sqlx::query(&update)
            .bind(account)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(next))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                anyhow::anyhow!("Database health check failed: {}", e)
            })?;
        Ok(())
    }
}
