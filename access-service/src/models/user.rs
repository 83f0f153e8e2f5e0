//! User accounts. Users are global; tenancy comes from memberships.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{Exportable, Resource, UserId};

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub failed_login_attempts: i32,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub reset_password_attempts: i32,
    pub reset_password_requested_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

/// Fields supplied when a user registers; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
}

/// User profile safe to return to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub last_login_utc: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_new(id: UserId, new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            email_verified: new.email_verified,
            failed_login_attempts: 0,
            last_login_utc: None,
            reset_password_attempts: 0,
            reset_password_requested_utc: None,
            created_utc: now,
        }
    }
}

impl Exportable for User {
    type Public = PublicUser;

    fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email_verified: self.email_verified,
            last_login_utc: self.last_login_utc,
        }
    }
}

impl Resource for User {
    const NAME: &'static str = "User";

    fn id(&self) -> i64 {
        self.id.0
    }
}

/// Emails are compared trimmed and lower-cased everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
