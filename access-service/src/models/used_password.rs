use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::UserId;

/// A password a user has set before, kept as a keyed fingerprint.
#[derive(Debug, Clone, FromRow)]
pub struct UsedPassword {
    pub id: i64,
    pub user_id: UserId,
    pub fingerprint: String,
    pub created_utc: DateTime<Utc>,
}
