mod common;

use access_service::{
    config::{AccessConfig, TokenConfig},
    services::{NotificationKind, UnavailableRevocationCache},
};
use std::sync::Arc;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Duration;
use common::{basic_login, body_json, get, json, set_cookie, TestApp, PASSWORD};
use serde_json::json;

fn refresh_with_cookie(refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/refresh-token")
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .body(Body::empty())
        .unwrap()
}

fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap()
}

#[tokio::test]
async fn register_confirm_login_refresh_logout() {
    let app = TestApp::new();

    let response = app
        .send(json(
            "POST",
            "/register-user",
            None,
            json!({
                "email": "Kari@Example.com",
                "first_name": "Kari",
                "last_name": "Nordmann",
                "password": PASSWORD,
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "kari@example.com");

    // Not confirmed yet.
    let response = app
        .send(basic_login("/auth/login", "kari@example.com", PASSWORD))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let register_token = app
        .notifier
        .last_secret("kari@example.com", NotificationKind::Registration)
        .expect("registration mail");
    let response = app
        .send(get(&format!("/register-user/{}", register_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(basic_login("/auth/login", "kari@example.com", PASSWORD))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response, "refresh_token").expect("refresh cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/auth/refresh-token"));
    assert!(cookie.contains("Max-Age=604800"));
    let refresh_token = cookie_value(&cookie);

    let body = body_json(response).await;
    assert!(body.get("refresh_token").is_none());
    let access_token = body["token"].as_str().unwrap().to_string();

    let response = app
        .send(get("/auth/verify-token", Some(&access_token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "kari@example.com");
    assert_eq!(body["client_account_ids"], json!([]));

    let response = app.send(refresh_with_cookie(&refresh_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(refreshed, access_token);

    let logout = Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(logout).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie(&response, "refresh_token").expect("cookie removal");
    assert!(cleared.contains("Max-Age=0"));

    let response = app
        .send(get("/auth/verify-token", Some(&access_token)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(refresh_with_cookie(&refresh_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_succeeds_when_revocation_cache_is_down() {
    let app = TestApp::with_revocation(Arc::new(UnavailableRevocationCache));
    app.user("ola@example.com");

    let response = app
        .send(basic_login("/auth/login", "ola@example.com", PASSWORD))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refresh_token = cookie_value(&set_cookie(&response, "refresh_token").unwrap());
    let access_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let logout = Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(logout).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie(&response, "refresh_token").expect("cookie removal");
    assert!(cleared.contains("Max-Age=0"));

    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["revocation_cache"], "down");
}

#[tokio::test]
async fn mobile_login_returns_refresh_token_in_body() {
    let app = TestApp::new();
    app.user("ola@example.com");

    let response = app
        .send(basic_login(
            "/auth/login?client_id=mobile",
            "ola@example.com",
            PASSWORD,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "refresh_token").is_none());

    let body = body_json(response).await;
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();

    // Mobile clients present the refresh token as a bearer token.
    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh-token")
        .header(header::AUTHORIZATION, format!("Bearer {}", refresh_token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = TestApp::new();
    let user = app.user("ola@example.com");
    let access_token = app.access_token(&user);

    let response = app.send(refresh_with_cookie(&access_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let app = TestApp::new();
    app.user("ola@example.com");

    let response = app
        .send(basic_login("/auth/login", "ola@example.com", "wrong-password"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(basic_login("/auth/login", "ghost@example.com", PASSWORD))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_and_weak_registrations_are_rejected() {
    let app = TestApp::new();
    app.user("ola@example.com");

    let response = app
        .send(json(
            "POST",
            "/register-user",
            None,
            json!({
                "email": "OLA@example.com",
                "first_name": "Ola",
                "last_name": "Nordmann",
                "password": PASSWORD,
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json(
            "POST",
            "/register-user",
            None,
            json!({
                "email": "new@example.com",
                "first_name": "New",
                "last_name": "Person",
                "password": "password",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json(
            "POST",
            "/register-user",
            None,
            json!({
                "email": "not-an-email",
                "first_name": "New",
                "last_name": "Person",
                "password": PASSWORD,
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let app = TestApp::new();
    let user = app.user("ola@example.com");
    let token = app.access_token(&user);

    let response = app.send(get("/auth/verify-token", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    app.clock.advance(Duration::seconds(3601));

    let response = app.send(get("/auth/verify-token", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_is_rate_limited_per_ip() {
    let mut config = AccessConfig::local(TokenConfig::default());
    config.rate_limit.login_attempts = 2;
    let app = TestApp::with_config(config);
    app.user("ola@example.com");

    let from = |ip: &str| {
        let mut request = basic_login("/auth/login", "ola@example.com", "wrong-password");
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    for _ in 0..2 {
        let response = app.send(from("203.0.113.7")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.send(from("203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let response = app.send(from("198.51.100.1")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
