//! Eligible tenant computation: direct memberships plus one contract hop.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::store::Store;
use crate::models::{ClientAccountId, Contract, UserId};

/// Tenants a user may act in for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EligibleSet(BTreeSet<ClientAccountId>);

impl EligibleSet {
    pub fn contains(&self, account: ClientAccountId) -> bool {
        self.0.contains(&account)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ClientAccountId> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ClientAccountId> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<ClientAccountId> for EligibleSet {
    fn from_iter<I: IntoIterator<Item = ClientAccountId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `D ∪ T` where `T` holds the opposite endpoint of every contract that has
/// an endpoint in `D`. Contracts not touching `D` contribute nothing, so the
/// result never extends past one hop.
pub fn eligible_from(direct: &[ClientAccountId], contracts: &[Contract]) -> EligibleSet {
    let direct: BTreeSet<ClientAccountId> = direct.iter().copied().collect();

    let via_contracts: Vec<ClientAccountId> = contracts
        .iter()
        .flat_map(|c| {
            c.endpoints()
                .into_iter()
                .filter(|e| direct.contains(e))
                .filter_map(|e| c.other_endpoint(e))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut eligible = direct;
    eligible.extend(via_contracts);
    EligibleSet(eligible)
}

#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn Store>,
}

impl MembershipResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, user_id: UserId) -> Result<EligibleSet, anyhow::Error> {
        let direct = self.store.active_memberships(user_id).await?;
        if direct.is_empty() {
            return Ok(EligibleSet::default());
        }
        let contracts = self.store.contracts_touching(&direct).await?;
        let eligible = eligible_from(&direct, &contracts);

        tracing::debug!(
            user_id = %user_id,
            direct = direct.len(),
            eligible = eligible.len(),
            "resolved eligible client accounts"
        );
        Ok(eligible)
    }
}
