//! Password reset flows: emailed reset links, mobile reset codes and the
//! final password change.

use std::sync::Arc;

use crate::{
    config::TokenConfig,
    models::{normalize_email, User, UserId},
    services::{
        clock::Clock,
        email::{Language, Notifier},
        jwt::{TokenCodec, TokenKind},
        redis::RevocationCache,
        reset_code::ResetCodeGenerator,
        store::Store,
        ServiceError,
    },
    utils::{check_password_strength, hash_password, password_fingerprint, Password},
};

#[derive(Clone)]
pub struct PasswordService {
    store: Arc<dyn Store>,
    tokens: TokenCodec,
    revocation: Arc<dyn RevocationCache>,
    notifier: Arc<dyn Notifier>,
    reset_codes: ResetCodeGenerator,
    clock: Arc<dyn Clock>,
    settings: TokenConfig,
    base_url: String,
}

impl PasswordService {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenCodec,
        revocation: Arc<dyn RevocationCache>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: TokenConfig,
        base_url: String,
    ) -> Self {
        let reset_codes = ResetCodeGenerator::new(
            settings.secret.clone(),
            settings.reset_code_ttl_seconds,
            clock.clone(),
        );
        Self {
            store,
            tokens,
            revocation,
            notifier,
            reset_codes,
            clock,
            settings,
            base_url,
        }
    }

    /// Always succeeds so the endpoint does not reveal which emails exist.
    pub async fn request_reset(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let Some(mut user) = self.store.find_user_by_email(&email).await? else {
            tracing::info!("password reset requested for unknown email");
            return Ok(());
        };

        self.note_reset_request(&mut user).await?;

        let token = self.tokens.issue(
            user.id,
            TokenKind::ResetPassword,
            self.settings.reset_password_ttl_seconds,
        )?;
        self.notifier
            .send_password_reset(&user.email, &token, &self.base_url)
            .await?;

        tracing::info!(user_id = %user.id, "password reset link sent");
        Ok(())
    }

    /// Confirms that a reset token is still usable and returns its subject.
    pub async fn validate_reset_token(&self, token: &str) -> Result<UserId, ServiceError> {
        self.reset_token_user(token).await.map(|user| user.id)
    }

    /// Mails a short reset code. Returns the issue timestamp the client must
    /// echo back with the code.
    pub async fn request_mobile_code(
        &self,
        email: &str,
        lang: Language,
    ) -> Result<String, ServiceError> {
        let email = normalize_email(email);
        let mut user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        self.note_reset_request(&mut user).await?;

        let issued = self.reset_codes.issue(&user.email);
        self.notifier
            .send_reset_code(&user.email, &issued.code, lang)
            .await?;

        tracing::info!(user_id = %user.id, "mobile reset code sent");
        Ok(issued.date)
    }

    /// Exchanges a valid mobile code for a reset-password token.
    pub async fn check_mobile_code(
        &self,
        email: &str,
        date: &str,
        code: &str,
    ) -> Result<String, ServiceError> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(ServiceError::AuthenticationFailed)?;

        if let Err(e) = self.reset_codes.check(&user.email, date, code) {
            tracing::info!(user_id = %user.id, reason = %e, "mobile reset code rejected");
            return Err(ServiceError::AuthenticationFailed);
        }

        Ok(self.tokens.issue(
            user.id,
            TokenKind::ResetPassword,
            self.settings.reset_password_ttl_seconds,
        )?)
    }

    /// Sets a new password from a reset token. The token is single-use.
    pub async fn set_new_password(
        &self,
        token: &str,
        password: &Password,
    ) -> Result<(), ServiceError> {
        let mut user = self.reset_token_user(token).await?;

        check_password_strength(
            password,
            &[
                user.email.as_str(),
                user.first_name.as_str(),
                user.last_name.as_str(),
            ],
        )?;

        let fingerprint = password_fingerprint(&self.settings.secret, password)?;
        if self
            .store
            .password_used_before(user.id, &fingerprint)
            .await?
        {
            return Err(ServiceError::PasswordReused);
        }

        user.password_hash = hash_password(password)?.into_string();
        user.failed_login_attempts = 0;
        self.store.update_user(&user).await?;
        self.store
            .record_used_password(user.id, &fingerprint)
            .await?;

        if let Err(e) = self
            .revocation
            .deny(token, self.settings.reset_password_ttl_seconds)
            .await
        {
            tracing::error!(user_id = %user.id, error = %e, "failed to revoke consumed reset token");
        }

        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    async fn reset_token_user(&self, token: &str) -> Result<User, ServiceError> {
        match self.revocation.is_denied(token).await {
            Ok(true) => return Err(ServiceError::AuthenticationFailed),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "revocation lookup failed, treating token as not revoked");
            }
        }

        let claims = self.tokens.verify(token, TokenKind::ResetPassword)?;
        self.store
            .find_user_by_id(claims.subject())
            .await?
            .ok_or(ServiceError::AuthenticationFailed)
    }

    async fn note_reset_request(&self, user: &mut User) -> Result<(), ServiceError> {
        user.reset_password_attempts += 1;
        user.reset_password_requested_utc = Some(self.clock.now());
        self.store.update_user(user).await?;
        Ok(())
    }
}
