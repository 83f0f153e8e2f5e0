mod common;

use access_service::services::NotificationKind;
use axum::http::StatusCode;
use chrono::Duration;
use common::{basic_login, body_json, get, json, TestApp, PASSWORD};
use serde_json::json;

const NEXT: &str = "violet-submarine-orchestra-42";

async fn reset_token(app: &TestApp, email: &str) -> String {
    let response = app
        .send(json("POST", "/reset-password", None, json!({ "email": email })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    app.notifier
        .last_secret(email, NotificationKind::PasswordReset)
        .expect("reset mail")
}

async fn set_password(app: &TestApp, token: &str, password: &str) -> StatusCode {
    app.send(json(
        "POST",
        "/new-password",
        None,
        json!({ "token": token, "password": password }),
    ))
    .await
    .status()
}

#[tokio::test]
async fn reset_request_does_not_reveal_unknown_emails() {
    let app = TestApp::new();

    let response = app
        .send(json(
            "POST",
            "/reset-password",
            None,
            json!({ "email": "ghost@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn web_reset_changes_password_once() {
    let app = TestApp::new();
    app.user("ola@example.com");

    let token = reset_token(&app, "ola@example.com").await;

    let response = app
        .send(get(&format!("/reset-password/{}", token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        set_password(&app, &token, "12345678").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(set_password(&app, &token, NEXT).await, StatusCode::OK);

    // Consumed tokens are denied.
    assert_eq!(
        set_password(&app, &token, "another-fresh-phrase-99").await,
        StatusCode::UNAUTHORIZED
    );
    let response = app
        .send(get(&format!("/reset-password/{}", token), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(basic_login("/auth/login", "ola@example.com", PASSWORD))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = app
        .send(basic_login("/auth/login", "ola@example.com", NEXT))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn previously_used_password_is_refused() {
    let app = TestApp::new();
    app.user("ola@example.com");

    let first = reset_token(&app, "ola@example.com").await;
    assert_eq!(set_password(&app, &first, NEXT).await, StatusCode::OK);

    let second = reset_token(&app, "ola@example.com").await;
    assert_eq!(
        set_password(&app, &second, NEXT).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn access_token_cannot_reset_a_password() {
    let app = TestApp::new();
    let user = app.user("ola@example.com");
    let access_token = app.access_token(&user);

    assert_eq!(
        set_password(&app, &access_token, NEXT).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn mobile_code_for_unknown_user_is_not_found() {
    let app = TestApp::new();
    let response = app
        .send(json(
            "POST",
            "/reset-password-mobile",
            None,
            json!({ "email": "ghost@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mobile_reset_flow() {
    let app = TestApp::new();
    app.user("ola@example.com");

    let response = app
        .send(json(
            "POST",
            "/reset-password-mobile",
            None,
            json!({ "email": "ola@example.com", "lang": "no" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let date = body_json(response).await["date"]
        .as_str()
        .unwrap()
        .to_string();
    let code = app
        .notifier
        .last_secret("ola@example.com", NotificationKind::ResetCode)
        .expect("reset code mail");

    let check = |code: &str| {
        json(
            "POST",
            "/reset-password-mobile-check",
            None,
            json!({ "email": "ola@example.com", "date": date, "code": code }),
        )
    };

    let wrong = if code == "0000" { "1111" } else { "0000" };
    let response = app.send(check(wrong)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(check(&code)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(set_password(&app, &token, NEXT).await, StatusCode::OK);

    app.clock.advance(Duration::hours(2));
    let response = app.send(check(&code)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
