//! Per-request authentication pipeline.

use std::sync::Arc;

use super::{
    jwt::{TokenCodec, TokenKind},
    membership::{EligibleSet, MembershipResolver},
    metrics::record_auth_outcome,
    redis::RevocationCache,
    store::Store,
    ServiceError,
};
use crate::models::{ClientAccountId, User, UserId};

/// Who the caller is and which tenants they may touch. Built once per
/// request and handed to handlers explicitly.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub eligible: EligibleSet,
    pub token_kind: TokenKind,
    /// Tenant named by the `client_account_id` query parameter, if any.
    /// Always a member of `eligible`.
    pub client_account_id: Option<ClientAccountId>,
}

/// An authenticated context together with the loaded user row.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub context: AuthContext,
    pub user: User,
}

#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenCodec,
    revocation: Arc<dyn RevocationCache>,
    store: Arc<dyn Store>,
    membership: MembershipResolver,
}

impl Authenticator {
    pub fn new(
        tokens: TokenCodec,
        revocation: Arc<dyn RevocationCache>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            tokens,
            revocation,
            membership: MembershipResolver::new(store.clone()),
            store,
        }
    }

    /// Runs denial lookup, token verification, user load, membership
    /// resolution and the optional tenant check, in that order. Every
    /// rejection is `AuthenticationFailed`.
    pub async fn authenticate(
        &self,
        token: &str,
        expected: TokenKind,
        requested: Option<ClientAccountId>,
    ) -> Result<Authenticated, ServiceError> {
        let result = self.run(token, expected, requested).await;
        record_auth_outcome(match &result {
            Ok(_) => "success",
            Err(ServiceError::AuthenticationFailed) => "rejected",
            Err(_) => "error",
        });
        result
    }

    async fn run(
        &self,
        token: &str,
        expected: TokenKind,
        requested: Option<ClientAccountId>,
    ) -> Result<Authenticated, ServiceError> {
        match self.revocation.is_denied(token).await {
            Ok(true) => {
                tracing::info!(kind = %expected, "revoked token presented");
                return Err(ServiceError::AuthenticationFailed);
            }
            Ok(false) => {}
            Err(e) => {
                // Fail open: verification below still has to pass.
                tracing::warn!(error = %e, "revocation lookup failed, treating token as not revoked");
            }
        }

        let claims = self.tokens.verify(token, expected)?;
        let user_id = claims.subject();

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| {
                tracing::info!(user_id = %user_id, "token subject no longer exists");
                ServiceError::AuthenticationFailed
            })?;

        if !user.email_verified {
            tracing::info!(user_id = %user_id, "token presented for unverified user");
            return Err(ServiceError::AuthenticationFailed);
        }

        let eligible = self.membership.resolve(user_id).await?;

        if let Some(account) = requested {
            if !eligible.contains(account) {
                tracing::info!(
                    user_id = %user_id,
                    client_account_id = %account,
                    "requested client account is not eligible"
                );
                return Err(ServiceError::AuthenticationFailed);
            }
        }

        Ok(Authenticated {
            context: AuthContext {
                user_id,
                eligible,
                token_kind: claims.kind,
                client_account_id: requested,
            },
            user,
        })
    }
}
