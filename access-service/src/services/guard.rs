//! Tenant-bounded access to stored resources.
//!
//! Every read and write of a tenant-owned row goes through [`AccessGuard`],
//! which compares the row's owning tenant against the caller's eligible
//! set. Missing rows and rows in foreign tenants stay distinguishable.

use chrono::{DateTime, Utc};

use super::{
    authenticator::AuthContext,
    metrics::record_guard_decision,
    store::{CredentialStore, MembershipStore, Repository, SequenceStore, TenantStore},
    ServiceError,
};
use crate::models::{
    ClientAccount, ClientAccountId, ClientAccountUser, Contract, ContractPatch, Creatable,
    HasTenantOwner, NewClientAccount, NewClientAccountUser, NewContract, Patchable, Resource,
    RoleCode, SequenceKind, User, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Forbidden,
    NotFound,
}

impl AccessDecision {
    fn as_str(self) -> &'static str {
        match self {
            AccessDecision::Allowed => "allowed",
            AccessDecision::Forbidden => "forbidden",
            AccessDecision::NotFound => "not_found",
        }
    }
}

pub struct AccessGuard<'a> {
    ctx: &'a AuthContext,
}

impl<'a> AccessGuard<'a> {
    pub fn new(ctx: &'a AuthContext) -> Self {
        Self { ctx }
    }

    /// Decision for an optional row owned by one tenant.
    pub fn decide<R>(&self, row: Option<&R>, active_only: bool) -> AccessDecision
    where
        R: Resource + HasTenantOwner,
    {
        match row {
            None => AccessDecision::NotFound,
            Some(row) if active_only && !row.is_active() => AccessDecision::NotFound,
            Some(row) if self.ctx.eligible.contains(row.tenant_id()) => AccessDecision::Allowed,
            Some(_) => AccessDecision::Forbidden,
        }
    }

    fn enforce<R: Resource>(&self, decision: AccessDecision, id: i64) -> Result<(), ServiceError> {
        record_guard_decision(R::NAME, decision.as_str());
        match decision {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::NotFound => Err(ServiceError::ResourceNotFound(R::NAME)),
            AccessDecision::Forbidden => {
                tracing::info!(
                    user_id = %self.ctx.user_id,
                    resource = R::NAME,
                    id,
                    "access to resource outside eligible client accounts denied"
                );
                Err(ServiceError::TenantNotEligible)
            }
        }
    }

    /// Explicit tenant if given, otherwise every eligible tenant.
    fn list_scope(
        &self,
        client_account_id: Option<ClientAccountId>,
    ) -> Result<Vec<ClientAccountId>, ServiceError> {
        match client_account_id {
            Some(account) if self.ctx.eligible.contains(account) => Ok(vec![account]),
            Some(account) => {
                tracing::info!(
                    user_id = %self.ctx.user_id,
                    client_account_id = %account,
                    "listing requested for ineligible client account"
                );
                Err(ServiceError::ValidationError(format!(
                    "client_account_id {} is not available",
                    account
                )))
            }
            None => Ok(self.ctx.eligible.to_vec()),
        }
    }

    pub async fn secure_get<R, S>(&self, repo: &S, id: i64, active_only: bool) -> Result<R, ServiceError>
    where
        R: Resource + HasTenantOwner,
        S: Repository<R> + ?Sized,
    {
        let row = repo.find(id).await?;
        self.enforce::<R>(self.decide(row.as_ref(), active_only), id)?;
        row.ok_or(ServiceError::ResourceNotFound(R::NAME))
    }

    pub async fn secure_get_list<R, S>(
        &self,
        repo: &S,
        client_account_id: Option<ClientAccountId>,
        active_only: bool,
    ) -> Result<Vec<R>, ServiceError>
    where
        R: Resource + HasTenantOwner,
        S: Repository<R> + ?Sized,
    {
        let tenants = self.list_scope(client_account_id)?;
        if tenants.is_empty() {
            return Ok(Vec::new());
        }
        Ok(repo.list_in_tenants(&tenants, active_only).await?)
    }

    pub async fn secure_update<R, S>(
        &self,
        repo: &S,
        id: i64,
        patch: R::Patch,
        active_only: bool,
    ) -> Result<R, ServiceError>
    where
        R: Resource + HasTenantOwner + Patchable,
        R::Patch: Send,
        S: Repository<R> + ?Sized,
    {
        let mut row = self.secure_get(repo, id, active_only).await?;
        row.apply_patch(patch)?;
        repo.save(&row).await?;
        Ok(row)
    }

    /// Inserts a row into an eligible tenant.
    pub async fn secure_create<R, S>(
        &self,
        repo: &S,
        draft: R::Draft,
        now: DateTime<Utc>,
    ) -> Result<R, ServiceError>
    where
        R: Resource + HasTenantOwner + Creatable,
        R::Draft: Send,
        S: Repository<R> + ?Sized,
    {
        let row = R::from_draft(draft, now)?;
        let decision = if self.ctx.eligible.contains(row.tenant_id()) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Forbidden
        };
        self.enforce::<R>(decision, row.tenant_id().0)?;
        Ok(repo.insert(&row).await?)
    }

    /// Adds a user to an eligible tenant. The user must exist.
    pub async fn secure_create_membership<S>(
        &self,
        store: &S,
        draft: NewClientAccountUser,
        now: DateTime<Utc>,
    ) -> Result<ClientAccountUser, ServiceError>
    where
        S: Repository<ClientAccountUser> + CredentialStore + ?Sized,
    {
        if store.find_user_by_id(draft.user_id).await?.is_none() {
            return Err(ServiceError::UserNotFound);
        }
        self.secure_create::<ClientAccountUser, S>(store, draft, now).await
    }

    /// Creates a client account with the caller as its active owner.
    pub async fn create_client_account<S>(
        &self,
        store: &S,
        draft: NewClientAccount,
        now: DateTime<Utc>,
    ) -> Result<ClientAccount, ServiceError>
    where
        S: TenantStore + ?Sized,
    {
        let account = ClientAccount::from_draft(draft, now)?;
        let (account, membership) = store
            .create_client_account(&account, self.ctx.user_id, RoleCode::CA)
            .await?;
        tracing::info!(
            user_id = %self.ctx.user_id,
            client_account_id = %account.id,
            membership_id = membership.id,
            "client account created"
        );
        Ok(account)
    }

    // Contracts: visible when either endpoint is eligible.

    fn decide_contract(&self, row: Option<&Contract>) -> AccessDecision {
        match row {
            None => AccessDecision::NotFound,
            Some(c) if c.endpoints().iter().any(|e| self.ctx.eligible.contains(*e)) => {
                AccessDecision::Allowed
            }
            Some(_) => AccessDecision::Forbidden,
        }
    }

    pub async fn secure_get_contract<S>(&self, repo: &S, id: i64) -> Result<Contract, ServiceError>
    where
        S: Repository<Contract> + ?Sized,
    {
        let row = Repository::<Contract>::find(repo, id).await?;
        self.enforce::<Contract>(self.decide_contract(row.as_ref()), id)?;
        row.ok_or(ServiceError::ResourceNotFound(Contract::NAME))
    }

    pub async fn secure_get_contract_list<S>(
        &self,
        repo: &S,
        client_account_id: Option<ClientAccountId>,
    ) -> Result<Vec<Contract>, ServiceError>
    where
        S: Repository<Contract> + ?Sized,
    {
        let tenants = self.list_scope(client_account_id)?;
        if tenants.is_empty() {
            return Ok(Vec::new());
        }
        Ok(repo.list_in_tenants(&tenants, false).await?)
    }

    /// Endpoint reassignment must keep both ends existing and eligible.
    pub async fn secure_update_contract<S>(
        &self,
        repo: &S,
        id: i64,
        patch: ContractPatch,
    ) -> Result<Contract, ServiceError>
    where
        S: Repository<Contract> + Repository<ClientAccount> + ?Sized,
    {
        let mut contract = self.secure_get_contract(repo, id).await?;
        contract.apply_patch(patch)?;
        self.check_contract_endpoints(repo, &contract).await?;
        Repository::<Contract>::save(repo, &contract).await?;
        Ok(contract)
    }

    /// New contracts obey the same endpoint rule as reassignment.
    pub async fn secure_create_contract<S>(
        &self,
        repo: &S,
        draft: NewContract,
        now: DateTime<Utc>,
    ) -> Result<Contract, ServiceError>
    where
        S: Repository<Contract> + Repository<ClientAccount> + ?Sized,
    {
        let contract = Contract::from_draft(draft, now)?;
        self.check_contract_endpoints(repo, &contract).await?;
        Ok(Repository::<Contract>::insert(repo, &contract).await?)
    }

    async fn check_contract_endpoints<S>(
        &self,
        repo: &S,
        contract: &Contract,
    ) -> Result<(), ServiceError>
    where
        S: Repository<ClientAccount> + ?Sized,
    {
        for endpoint in contract.endpoints() {
            let account = Repository::<ClientAccount>::find(repo, endpoint.0).await?;
            if account.is_none() {
                return Err(ServiceError::ResourceNotFound(ClientAccount::NAME));
            }
            if !self.ctx.eligible.contains(endpoint) {
                tracing::info!(
                    user_id = %self.ctx.user_id,
                    contract_id = contract.id,
                    client_account_id = %endpoint,
                    "contract endpoint outside eligible client accounts denied"
                );
                return Err(ServiceError::TenantNotEligible);
            }
        }
        Ok(())
    }

    /// A user is visible when any of their memberships, active or not, lies
    /// in the eligible set.
    pub async fn secure_get_user<S>(&self, store: &S, user_id: UserId) -> Result<User, ServiceError>
    where
        S: CredentialStore + MembershipStore + ?Sized,
    {
        let user = store.find_user_by_id(user_id).await?;
        let decision = match &user {
            None => AccessDecision::NotFound,
            Some(_) if user_id == self.ctx.user_id => AccessDecision::Allowed,
            Some(_) => {
                let tenants = store.tenants_of_user(user_id).await?;
                if tenants.iter().any(|t| self.ctx.eligible.contains(*t)) {
                    AccessDecision::Allowed
                } else {
                    AccessDecision::Forbidden
                }
            }
        };
        self.enforce::<User>(decision, user_id.0)?;
        user.ok_or(ServiceError::UserNotFound)
    }

    /// Allocates the next document number for an eligible client account.
    pub async fn next_sequence_number<S>(
        &self,
        store: &S,
        client_account_id: ClientAccountId,
        kind: SequenceKind,
    ) -> Result<i64, ServiceError>
    where
        S: Repository<ClientAccount> + SequenceStore + ?Sized,
    {
        let account: ClientAccount = self.secure_get(store, client_account_id.0, true).await?;
        store
            .next_sequence_number(account.id, kind)
            .await?
            .ok_or(ServiceError::ResourceNotFound(ClientAccount::NAME))
    }
}
