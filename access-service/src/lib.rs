pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::AccessConfig;
use crate::services::{
    AuthService, Authenticator, Clock, Notifier, PasswordService, RevocationCache, Store,
    TokenCodec,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::session::login,
        handlers::auth::session::refresh,
        handlers::auth::session::logout,
        handlers::auth::session::verify_token,
        handlers::auth::registration::register,
        handlers::auth::registration::confirm_registration,
        handlers::auth::password::request_reset,
        handlers::auth::password::validate_reset_token,
        handlers::auth::password::request_mobile_code,
        handlers::auth::password::check_mobile_code,
        handlers::auth::password::new_password,
        handlers::client_accounts::list_client_accounts,
        handlers::client_accounts::create_client_account,
        handlers::client_accounts::get_client_account,
        handlers::client_accounts::update_client_account,
        handlers::client_accounts::next_sequence_number,
        handlers::contracts::list_contracts,
        handlers::contracts::create_contract,
        handlers::contracts::get_contract,
        handlers::contracts::update_contract,
        handlers::citizens::list_citizens,
        handlers::citizens::create_citizen,
        handlers::citizens::get_citizen,
        handlers::citizens::update_citizen,
        handlers::client_account_users::list_client_account_users,
        handlers::client_account_users::create_client_account_user,
        handlers::client_account_users::get_client_account_user,
        handlers::client_account_users::update_client_account_user,
        handlers::users::get_user,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::StatusResponse,
            dtos::auth::LoginResponse,
            dtos::auth::RefreshResponse,
            dtos::auth::VerifyTokenResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::ResetPasswordRequest,
            dtos::auth::MobileResetRequest,
            dtos::auth::MobileResetResponse,
            dtos::auth::MobileResetCheckRequest,
            dtos::auth::ResetTokenResponse,
            dtos::auth::NewPasswordRequest,
            dtos::resources::SequenceNumberResponse,
            dtos::resources::HealthResponse,
            models::PublicUser,
            models::PublicClientAccount,
            models::ClientAccountPatch,
            models::NewClientAccount,
            models::PublicContract,
            models::ContractPatch,
            models::NewContract,
            models::PublicCitizen,
            models::CitizenPatch,
            models::NewCitizen,
            models::PublicClientAccountUser,
            models::ClientAccountUserPatch,
            models::NewClientAccountUser,
            models::RoleCode,
            models::SequenceKind,
            models::UserId,
            models::ClientAccountId,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, token refresh and logout"),
        (name = "Registration", description = "User registration and email confirmation"),
        (name = "Password", description = "Password reset flows"),
        (name = "Client accounts", description = "Tenants the caller may act on"),
        (name = "Contracts", description = "Accounting firm and client links"),
        (name = "Citizens", description = "Tenant-owned records"),
        (name = "Client account users", description = "Tenant memberships"),
        (name = "Users", description = "User profiles"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub store: Arc<dyn Store>,
    pub revocation: Arc<dyn RevocationCache>,
    pub clock: Arc<dyn Clock>,
    pub authenticator: Authenticator,
    pub auth_service: AuthService,
    pub password_service: PasswordService,
    pub login_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wires the services over the given adapters.
    pub fn new(
        config: AccessConfig,
        store: Arc<dyn Store>,
        revocation: Arc<dyn RevocationCache>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let tokens = TokenCodec::new(&config.tokens.secret, clock.clone());
        let base_url = config.security.public_base_url.clone();

        let authenticator = Authenticator::new(tokens.clone(), revocation.clone(), store.clone());
        let auth_service = AuthService::new(
            store.clone(),
            tokens.clone(),
            revocation.clone(),
            notifier.clone(),
            clock.clone(),
            config.tokens.clone(),
            base_url.clone(),
        );
        let password_service = PasswordService::new(
            store.clone(),
            tokens,
            revocation.clone(),
            notifier,
            clock.clone(),
            config.tokens.clone(),
            base_url,
        );

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let password_reset_rate_limiter = create_ip_rate_limiter(
            limits.password_reset_attempts,
            limits.password_reset_window_seconds,
        );

        Self {
            config,
            store,
            revocation,
            clock,
            authenticator,
            auth_service,
            password_service,
            login_rate_limiter,
            password_reset_rate_limiter,
            metrics,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let password_reset_routes = Router::new()
        .route("/reset-password", post(handlers::auth::request_reset))
        .route(
            "/reset-password-mobile",
            post(handlers::auth::request_mobile_code),
        )
        .route(
            "/reset-password-mobile-check",
            post(handlers::auth::check_mobile_code),
        )
        .route("/new-password", post(handlers::auth::new_password))
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let authenticated_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/verify-token", get(handlers::auth::verify_token))
        .route(
            "/client-accounts",
            get(handlers::client_accounts::list_client_accounts)
                .post(handlers::client_accounts::create_client_account),
        )
        .route(
            "/client-accounts/:id",
            get(handlers::client_accounts::get_client_account)
                .patch(handlers::client_accounts::update_client_account),
        )
        .route(
            "/client-accounts/:id/sequences/:kind",
            post(handlers::client_accounts::next_sequence_number),
        )
        .route(
            "/contracts",
            get(handlers::contracts::list_contracts).post(handlers::contracts::create_contract),
        )
        .route(
            "/contracts/:id",
            get(handlers::contracts::get_contract).patch(handlers::contracts::update_contract),
        )
        .route(
            "/citizens",
            get(handlers::citizens::list_citizens).post(handlers::citizens::create_citizen),
        )
        .route(
            "/citizens/:id",
            get(handlers::citizens::get_citizen).patch(handlers::citizens::update_citizen),
        )
        .route(
            "/client-account-users",
            get(handlers::client_account_users::list_client_account_users)
                .post(handlers::client_account_users::create_client_account_user),
        )
        .route(
            "/client-account-users/:id",
            get(handlers::client_account_users::get_client_account_user)
                .patch(handlers::client_account_users::update_client_account_user),
        )
        .route("/users/:id", get(handlers::users::get_user))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %o, error = %e, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/refresh-token", post(handlers::auth::refresh))
        .route("/register-user", post(handlers::auth::register))
        .route(
            "/register-user/:token",
            get(handlers::auth::confirm_registration),
        )
        .route(
            "/reset-password/:token",
            get(handlers::auth::validate_reset_token),
        )
        .merge(login_route)
        .merge(password_reset_routes)
        .merge(authenticated_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.0.as_str())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
