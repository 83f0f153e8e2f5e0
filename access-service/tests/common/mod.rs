//! Shared setup for the router-level integration tests. Everything runs
//! in memory: store, revocation cache, notifier and clock.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{AccessConfig, TokenConfig},
    models::{ClientAccountId, NewUser, RoleCode, User},
    services::{
        Clock, ManualClock, MemoryRevocationCache, MemoryStore, RecordingNotifier,
        RevocationCache, TokenCodec, TokenKind,
    },
    utils::{hash_password, Password},
    AppState,
};
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery-staple";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryRevocationCache>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub tokens: TokenCodec,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AccessConfig::local(TokenConfig::default()))
    }

    pub fn with_config(config: AccessConfig) -> Self {
        Self::build(config, None)
    }

    /// App wired to `revocation` instead of the in-memory cache. `cache`
    /// is then left unused.
    pub fn with_revocation(revocation: Arc<dyn RevocationCache>) -> Self {
        Self::build(AccessConfig::local(TokenConfig::default()), Some(revocation))
    }

    fn build(config: AccessConfig, revocation: Option<Arc<dyn RevocationCache>>) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryRevocationCache::new(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let tokens = TokenCodec::new(&config.tokens.secret, clock.clone() as Arc<dyn Clock>);
        let revocation: Arc<dyn RevocationCache> = match revocation {
            Some(revocation) => revocation,
            None => cache.clone(),
        };

        let state = AppState::new(
            config,
            store.clone(),
            revocation,
            notifier.clone(),
            clock.clone(),
            None,
        );
        let router = build_router(state.clone());

        Self {
            router,
            state,
            store,
            cache,
            notifier,
            clock,
            tokens,
        }
    }

    /// Verified user with [`PASSWORD`].
    pub fn user(&self, email: &str) -> User {
        self.store.add_user(NewUser {
            email: email.to_string(),
            password_hash: hash_password(&Password::new(PASSWORD.to_string()))
                .unwrap()
                .into_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email_verified: true,
        })
    }

    pub fn member(&self, email: &str, account: i64) -> User {
        let user = self.user(email);
        self.store
            .add_membership(ClientAccountId(account), user.id, RoleCode::AA, true);
        user
    }

    pub fn access_token(&self, user: &User) -> String {
        self.tokens.issue(user.id, TokenKind::Access, 3600).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn basic_login(uri: &str, email: &str, password: &str) -> Request<Body> {
    let credentials = STANDARD.encode(format!("{}:{}", email, password));
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Basic {}", credentials))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of the `name` cookie set by the response, if any.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}
