//! HTTP handlers for the access service.

pub mod auth;
pub mod citizens;
pub mod client_account_users;
pub mod client_accounts;
pub mod contracts;
pub mod health;
pub mod metrics;
pub mod users;

use crate::models::Exportable;

/// Wire shape of every row in `rows`.
pub(crate) fn export_all<R: Exportable>(rows: &[R]) -> Vec<R::Public> {
    rows.iter().map(Exportable::to_public).collect()
}
