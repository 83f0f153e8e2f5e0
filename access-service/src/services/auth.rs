use std::sync::Arc;

use crate::{
    config::TokenConfig,
    models::{normalize_email, NewUser, User},
    services::{
        clock::Clock,
        email::Notifier,
        jwt::{TokenCodec, TokenKind},
        redis::RevocationCache,
        store::Store,
        ServiceError,
    },
    utils::{
        check_password_strength, hash_password, password_fingerprint, verify_password, Password,
        PasswordHashString,
    },
};

/// Tokens handed out by a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Input of the registration flow.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Password,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenCodec,
    revocation: Arc<dyn RevocationCache>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: TokenConfig,
    base_url: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenCodec,
        revocation: Arc<dyn RevocationCache>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: TokenConfig,
        base_url: String,
    ) -> Self {
        Self {
            store,
            tokens,
            revocation,
            notifier,
            clock,
            settings,
            base_url,
        }
    }

    /// Checks credentials and issues an access/refresh pair. Unknown email,
    /// wrong password and unverified email are indistinguishable to the
    /// caller.
    pub async fn login(&self, email: &str, password: &Password) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);

        let mut user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::info!("login attempt for unknown email");
                return Err(ServiceError::AuthenticationFailed);
            }
        };

        let hash = PasswordHashString::new(user.password_hash.clone());
        if verify_password(password, &hash).is_err() {
            user.failed_login_attempts += 1;
            self.store.update_user(&user).await?;
            tracing::info!(
                user_id = %user.id,
                failed_login_attempts = user.failed_login_attempts,
                "login rejected: wrong password"
            );
            return Err(ServiceError::AuthenticationFailed);
        }

        if !user.email_verified {
            tracing::info!(user_id = %user.id, "login rejected: email not verified");
            return Err(ServiceError::AuthenticationFailed);
        }

        user.failed_login_attempts = 0;
        user.last_login_utc = Some(self.clock.now());
        self.store.update_user(&user).await?;

        let access_token =
            self.tokens
                .issue(user.id, TokenKind::Access, self.settings.access_ttl_seconds)?;
        let refresh_token =
            self.tokens
                .issue(user.id, TokenKind::Refresh, self.settings.refresh_ttl_seconds)?;

        tracing::info!(user_id = %user.id, "user logged in");

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            user,
        })
    }

    /// New access token for a caller that already passed refresh-token
    /// authentication.
    pub fn refresh(&self, user: &User) -> Result<String, ServiceError> {
        Ok(self
            .tokens
            .issue(user.id, TokenKind::Access, self.settings.access_ttl_seconds)?)
    }

    /// Adds the presented tokens to the denial list. Cache failures are
    /// logged; logout itself never fails.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) {
        if let Err(e) = self
            .revocation
            .deny(access_token, self.settings.revocation_ttl_seconds)
            .await
        {
            tracing::error!(error = %e, "failed to revoke access token on logout");
        }

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self
                .revocation
                .deny(refresh_token, self.settings.refresh_ttl_seconds)
                .await
            {
                tracing::error!(error = %e, "failed to revoke refresh token on logout");
            }
        }
    }

    /// Stores an unverified user and mails a registration token.
    pub async fn register(&self, registration: Registration) -> Result<User, ServiceError> {
        let email = normalize_email(&registration.email);

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        check_password_strength(
            &registration.password,
            &[
                email.as_str(),
                registration.first_name.as_str(),
                registration.last_name.as_str(),
            ],
        )?;

        let password_hash = hash_password(&registration.password)?;
        let fingerprint = password_fingerprint(&self.settings.secret, &registration.password)?;

        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash: password_hash.into_string(),
                first_name: registration.first_name,
                last_name: registration.last_name,
                email_verified: false,
            })
            .await?;
        self.store
            .record_used_password(user.id, &fingerprint)
            .await?;

        tracing::info!(user_id = %user.id, "user registered");

        let token =
            self.tokens
                .issue(user.id, TokenKind::Register, self.settings.register_ttl_seconds)?;
        self.notifier
            .send_registration(&user.email, &token, &self.base_url)
            .await?;

        Ok(user)
    }

    /// Marks the email of the token's subject as verified.
    pub async fn confirm_registration(&self, token: &str) -> Result<User, ServiceError> {
        let claims = self.tokens.verify(token, TokenKind::Register)?;

        let mut user = self
            .store
            .find_user_by_id(claims.subject())
            .await?
            .ok_or(ServiceError::AuthenticationFailed)?;

        if !user.email_verified {
            user.email_verified = true;
            self.store.update_user(&user).await?;
            tracing::info!(user_id = %user.id, "email verified");
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        clock::ManualClock, email::NotificationKind, email::RecordingNotifier,
        redis::MemoryRevocationCache, store::MemoryStore,
    };

    const STRONG: &str = "correct-horse-battery-staple";

    struct Fixture {
        store: Arc<MemoryStore>,
        cache: Arc<MemoryRevocationCache>,
        notifier: Arc<RecordingNotifier>,
        tokens: TokenCodec,
        service: AuthService,
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let settings = TokenConfig::default();
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryRevocationCache::new(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let tokens = TokenCodec::new(&settings.secret, clock.clone());
        let service = AuthService::new(
            store.clone(),
            tokens.clone(),
            cache.clone(),
            notifier.clone(),
            clock,
            settings,
            "https://app.example.com".to_string(),
        );
        Fixture {
            store,
            cache,
            notifier,
            tokens,
            service,
        }
    }

    async fn registered(f: &Fixture, email: &str) -> User {
        let user = f
            .service
            .register(Registration {
                email: email.to_string(),
                first_name: "Kari".to_string(),
                last_name: "Nordmann".to_string(),
                password: Password::new(STRONG.to_string()),
            })
            .await
            .unwrap();
        let token = f
            .notifier
            .last_secret(&user.email, NotificationKind::Registration)
            .unwrap();
        f.service.confirm_registration(&token).await.unwrap()
    }

    #[tokio::test]
    async fn register_stores_unverified_user_and_fingerprint() {
        let f = fixture();
        let user = f
            .service
            .register(Registration {
                email: " Kari@Example.com ".to_string(),
                first_name: "Kari".to_string(),
                last_name: "Nordmann".to_string(),
                password: Password::new(STRONG.to_string()),
            })
            .await
            .unwrap();

        assert_eq!(user.email, "kari@example.com");
        assert!(!user.email_verified);
        assert_eq!(f.store.used_password_count(user.id), 1);
        assert!(f
            .notifier
            .last_secret("kari@example.com", NotificationKind::Registration)
            .is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let f = fixture();
        registered(&f, "kari@example.com").await;

        let err = f
            .service
            .register(Registration {
                email: "KARI@example.com".to_string(),
                first_name: "K".to_string(),
                last_name: "N".to_string(),
                password: Password::new(STRONG.to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn weak_password_is_rejected_at_registration() {
        let f = fixture();
        let err = f
            .service
            .register(Registration {
                email: "kari@example.com".to_string(),
                first_name: "Kari".to_string(),
                last_name: "Nordmann".to_string(),
                password: Password::new("password".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn unverified_user_cannot_log_in() {
        let f = fixture();
        f.service
            .register(Registration {
                email: "kari@example.com".to_string(),
                first_name: "Kari".to_string(),
                last_name: "Nordmann".to_string(),
                password: Password::new(STRONG.to_string()),
            })
            .await
            .unwrap();

        let err = f
            .service
            .login("kari@example.com", &Password::new(STRONG.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn wrong_password_counts_and_success_resets() {
        let f = fixture();
        let user = registered(&f, "kari@example.com").await;

        for _ in 0..2 {
            assert!(f
                .service
                .login("kari@example.com", &Password::new("nope".to_string()))
                .await
                .is_err());
        }
        assert_eq!(f.store.user(user.id).unwrap().failed_login_attempts, 2);

        let outcome = f
            .service
            .login("KARI@example.com", &Password::new(STRONG.to_string()))
            .await
            .unwrap();
        let stored = f.store.user(user.id).unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.last_login_utc.is_some());
        assert!(f.tokens.verify(&outcome.access_token, TokenKind::Access).is_ok());
        assert!(f.tokens.verify(&outcome.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[tokio::test]
    async fn unknown_email_fails_like_wrong_password() {
        let f = fixture();
        let err = f
            .service
            .login("ghost@example.com", &Password::new(STRONG.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn logout_denies_both_tokens() {
        let f = fixture();
        registered(&f, "kari@example.com").await;
        let outcome = f
            .service
            .login("kari@example.com", &Password::new(STRONG.to_string()))
            .await
            .unwrap();

        f.service
            .logout(&outcome.access_token, Some(&outcome.refresh_token))
            .await;

        assert!(f.cache.is_denied(&outcome.access_token).await.unwrap());
        assert!(f.cache.is_denied(&outcome.refresh_token).await.unwrap());
    }

    #[tokio::test]
    async fn register_token_is_not_accepted_as_access_token() {
        let f = fixture();
        let user = registered(&f, "kari@example.com").await;
        let token = f
            .notifier
            .last_secret(&user.email, NotificationKind::Registration)
            .unwrap();
        assert!(f.tokens.verify(&token, TokenKind::Access).is_err());
    }
}
