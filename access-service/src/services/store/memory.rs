//! In-process store backed by ordered maps behind a single mutex.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{
    CredentialStore, MembershipStore, Repository, SequenceStore, Store, TenantStore,
    UniqueViolation,
};
use crate::models::{
    Citizen, ClientAccount, ClientAccountId, ClientAccountUser, Contract, NewUser, Resource,
    RoleCode, SequenceKind, UsedPassword, User, UserId,
};

#[derive(Default)]
pub struct Tables {
    users: BTreeMap<i64, User>,
    used_passwords: Vec<UsedPassword>,
    client_accounts: BTreeMap<i64, ClientAccount>,
    contracts: BTreeMap<i64, Contract>,
    citizens: BTreeMap<i64, Citizen>,
    memberships: BTreeMap<i64, ClientAccountUser>,
    sequences: HashMap<(ClientAccountId, SequenceKind), i64>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Per-type table access for the generic repository.
pub trait MemoryTable: Resource {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self>;
    fn in_tenants(&self, tenants: &BTreeSet<ClientAccountId>) -> bool;
    fn assign_id(&mut self, id: i64);

    /// Value that must be unique across the table, if the type has one.
    fn unique_name(&self) -> Option<&str> {
        None
    }
}

fn check_unique<R: MemoryTable>(table: &BTreeMap<i64, R>, row: &R) -> Result<(), anyhow::Error> {
    if let Some(name) = row.unique_name() {
        if table
            .values()
            .any(|other| other.id() != row.id() && other.unique_name() == Some(name))
        {
            return Err(UniqueViolation(format!("unique_name '{}'", name)).into());
        }
    }
    Ok(())
}

impl MemoryTable for ClientAccount {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
        &tables.client_accounts
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
        &mut tables.client_accounts
    }
    fn in_tenants(&self, tenants: &BTreeSet<ClientAccountId>) -> bool {
        tenants.contains(&self.id)
    }
    fn assign_id(&mut self, id: i64) {
        self.id = ClientAccountId(id);
    }
    fn unique_name(&self) -> Option<&str> {
        Some(&self.unique_name)
    }
}

impl MemoryTable for Contract {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
        &tables.contracts
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
        &mut tables.contracts
    }
    fn in_tenants(&self, tenants: &BTreeSet<ClientAccountId>) -> bool {
        self.endpoints().iter().any(|e| tenants.contains(e))
    }
    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl MemoryTable for Citizen {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
        &tables.citizens
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
        &mut tables.citizens
    }
    fn in_tenants(&self, tenants: &BTreeSet<ClientAccountId>) -> bool {
        tenants.contains(&self.client_account_id)
    }
    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl MemoryTable for ClientAccountUser {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
        &tables.memberships
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
        &mut tables.memberships
    }
    fn in_tenants(&self, tenants: &BTreeSet<ClientAccountId>) -> bool {
        tenants.contains(&self.client_account_id)
    }
    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Seeding helpers. Ids not given explicitly come from one shared counter.

    pub fn add_user(&self, new: NewUser) -> User {
        let mut tables = self.lock();
        let id = tables.next_id();
        let user = User::from_new(UserId(id), new, Utc::now());
        tables.users.insert(id, user.clone());
        user
    }

    pub fn add_client_account(&self, id: ClientAccountId, unique_name: &str) -> ClientAccount {
        let account = ClientAccount {
            id,
            unique_name: unique_name.to_string(),
            display_name: Some(unique_name.to_string()),
            accounting_currency: Some("NOK".to_string()),
            accountant_notes: None,
            is_active: true,
            created_utc: Utc::now(),
        };
        let mut tables = self.lock();
        tables.last_id = tables.last_id.max(id.0);
        tables.client_accounts.insert(id.0, account.clone());
        account
    }

    pub fn add_membership(
        &self,
        account: ClientAccountId,
        user_id: UserId,
        role_code: RoleCode,
        is_active: bool,
    ) -> ClientAccountUser {
        let mut tables = self.lock();
        let row = ClientAccountUser {
            id: tables.next_id(),
            client_account_id: account,
            user_id,
            role_code,
            is_active,
        };
        tables.memberships.insert(row.id, row.clone());
        row
    }

    pub fn add_contract(&self, firm: ClientAccountId, company: ClientAccountId) -> Contract {
        let mut tables = self.lock();
        let row = Contract {
            id: tables.next_id(),
            accounting_client_account_id: firm,
            client_account_id: company,
            created_utc: Utc::now(),
        };
        tables.contracts.insert(row.id, row.clone());
        row
    }

    pub fn add_citizen(&self, account: ClientAccountId, name: &str) -> Citizen {
        let mut tables = self.lock();
        let row = Citizen {
            id: tables.next_id(),
            client_account_id: account,
            name: Some(name.to_string()),
            surname: None,
            age: None,
            salary: None,
            is_active: true,
        };
        tables.citizens.insert(row.id, row.clone());
        row
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.lock().users.get(&id.0).cloned()
    }

    pub fn used_password_count(&self, user_id: UserId) -> usize {
        self.lock()
            .used_passwords
            .iter()
            .filter(|p| p.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl<R: MemoryTable> Repository<R> for MemoryStore {
    async fn find(&self, id: i64) -> Result<Option<R>, anyhow::Error> {
        Ok(R::table(&self.lock()).get(&id).cloned())
    }

    async fn list_in_tenants(
        &self,
        tenants: &[ClientAccountId],
        active_only: bool,
    ) -> Result<Vec<R>, anyhow::Error> {
        let tenants: BTreeSet<ClientAccountId> = tenants.iter().copied().collect();
        Ok(R::table(&self.lock())
            .values()
            .filter(|row| row.in_tenants(&tenants))
            .filter(|row| !active_only || row.is_active())
            .cloned()
            .collect())
    }

    async fn save(&self, row: &R) -> Result<(), anyhow::Error> {
        let mut tables = self.lock();
        let table = R::table_mut(&mut tables);
        check_unique(table, row)?;
        match table.get_mut(&row.id()) {
            Some(existing) => {
                *existing = row.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!("{} {} does not exist", R::NAME, row.id())),
        }
    }

    async fn insert(&self, row: &R) -> Result<R, anyhow::Error> {
        let mut tables = self.lock();
        let mut row = row.clone();
        row.assign_id(tables.next_id());
        let table = R::table_mut(&mut tables);
        check_unique(table, &row)?;
        table.insert(row.id(), row.clone());
        Ok(row)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn create_client_account(
        &self,
        account: &ClientAccount,
        owner: UserId,
        role_code: RoleCode,
    ) -> Result<(ClientAccount, ClientAccountUser), anyhow::Error> {
        let mut tables = self.lock();
        let mut account = account.clone();
        account.assign_id(tables.next_id());
        check_unique(&tables.client_accounts, &account)?;

        let membership = ClientAccountUser {
            id: tables.next_id(),
            client_account_id: account.id,
            user_id: owner,
            role_code,
            is_active: true,
        };
        tables.client_accounts.insert(account.id.0, account.clone());
        tables.memberships.insert(membership.id, membership.clone());
        Ok((account, membership))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, anyhow::Error> {
        Ok(self.user(id))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, anyhow::Error> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(anyhow::anyhow!("duplicate email: {}", user.email));
        }
        Ok(self.add_user(user))
    }

    async fn update_user(&self, user: &User) -> Result<(), anyhow::Error> {
        let mut tables = self.lock();
        match tables.users.get_mut(&user.id.0) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!("user {} does not exist", user.id)),
        }
    }

    async fn password_used_before(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<bool, anyhow::Error> {
        Ok(self
            .lock()
            .used_passwords
            .iter()
            .any(|p| p.user_id == user_id && p.fingerprint == fingerprint))
    }

    async fn record_used_password(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<(), anyhow::Error> {
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.used_passwords.push(UsedPassword {
            id,
            user_id,
            fingerprint: fingerprint.to_string(),
            created_utc: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn active_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ClientAccountId>, anyhow::Error> {
        let accounts: BTreeSet<ClientAccountId> = self
            .lock()
            .memberships
            .values()
            .filter(|m| m.user_id == user_id && m.is_active)
            .map(|m| m.client_account_id)
            .collect();
        Ok(accounts.into_iter().collect())
    }

    async fn contracts_touching(
        &self,
        accounts: &[ClientAccountId],
    ) -> Result<Vec<Contract>, anyhow::Error> {
        let accounts: BTreeSet<ClientAccountId> = accounts.iter().copied().collect();
        Ok(self
            .lock()
            .contracts
            .values()
            .filter(|c| c.in_tenants(&accounts))
            .cloned()
            .collect())
    }

    async fn tenants_of_user(&self, user_id: UserId) -> Result<Vec<ClientAccountId>, anyhow::Error> {
        let accounts: BTreeSet<ClientAccountId> = self
            .lock()
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.client_account_id)
            .collect();
        Ok(accounts.into_iter().collect())
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn next_sequence_number(
        &self,
        account: ClientAccountId,
        kind: SequenceKind,
    ) -> Result<Option<i64>, anyhow::Error> {
        let mut tables = self.lock();
        if !tables.client_accounts.contains_key(&account.0) {
            return Ok(None);
        }
        let next = kind.next_after(tables.sequences.get(&(account, kind)).copied());
        tables.sequences.insert((account, kind), next);
        Ok(Some(next))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn sequence_allocation_is_atomic_under_concurrency() {
        let store = Arc::new(MemoryStore::new());
        store.add_client_account(ClientAccountId(7), "acme");

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .next_sequence_number(ClientAccountId(7), SequenceKind::SaleInvoice)
                    .await
                    .unwrap()
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort_unstable();
        let expected: Vec<i64> = (10_000..10_050).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn sequence_for_unknown_account_is_none() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .next_sequence_number(ClientAccountId(1), SequenceKind::Journal)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn inactive_rows_are_filtered_when_requested() {
        let store = MemoryStore::new();
        let account = ClientAccountId(7);
        store.add_client_account(account, "acme");
        store.add_membership(account, UserId(100), RoleCode::BK, true);
        store.add_membership(account, UserId(101), RoleCode::EM, false);

        let active: Vec<ClientAccountUser> = store.list_in_tenants(&[account], true).await.unwrap();
        let all: Vec<ClientAccountUser> = store.list_in_tenants(&[account], false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(all.len(), 2);
    }
}
