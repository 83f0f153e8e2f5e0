//! Services layer for the access service.
//!
//! Token handling, revocation, membership resolution, the access guard and
//! the account flows built on top of them.

mod auth;
mod authenticator;
pub mod clock;
pub mod email;
pub mod error;
mod guard;
pub mod jwt;
pub mod membership;
pub mod metrics;
mod password;
pub mod redis;
pub mod reset_code;
pub mod store;

pub use auth::{AuthService, LoginOutcome, Registration};
pub use authenticator::{AuthContext, Authenticated, Authenticator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use email::{Language, LogNotifier, Notifier, NotificationKind, RecordingNotifier};
pub use error::ServiceError;
pub use guard::{AccessDecision, AccessGuard};
pub use jwt::{Claims, TokenCodec, TokenError, TokenKind};
pub use membership::{EligibleSet, MembershipResolver};
pub use password::PasswordService;
pub use redis::{
    MemoryRevocationCache, RedisRevocationCache, RevocationCache, UnavailableRevocationCache,
};
pub use reset_code::{ResetCodeError, ResetCodeGenerator};
pub use store::{MemoryStore, PgStore, Store};
