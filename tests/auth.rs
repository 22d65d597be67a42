mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{PASSWORD, data, setup_app};

#[tokio::test]
async fn register_login_and_me() {
    let app = setup_app().await;
    let alice = app.register("Alice", "student").await;

    // same email twice
    app.server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Alice Again",
            "email": "alice@example.com",
            "password": PASSWORD,
        }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let resp = app.login("alice@example.com", PASSWORD).await;
    resp.assert_status_ok();
    let body = data(&resp);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("password_hash").is_none());

    let me = data(&app.get(&alice, "/api/auth/me").await);
    assert_eq!(me["name"], "Alice");
    assert_eq!(me["role"], "student");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = setup_app().await;
    app.register("Bob", "student").await;

    app.login("bob@example.com", "Wr0ngPass!")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.login("nobody@example.com", PASSWORD)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_validates_fields() {
    let app = setup_app().await;

    let resp = app
        .server
        .post("/api/auth/register")
        .json(&json!({ "name": "Al", "email": "not-an-email", "password": "weak" }))
        .await;
    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let errors = resp.json::<Value>()["errors"].clone();
    assert!(errors.get("name").is_some());
    assert!(errors.get("email").is_some());
    assert!(errors.get("password").is_some());
}

#[tokio::test]
async fn admin_role_cannot_be_self_assigned() {
    let app = setup_app().await;

    app.server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Mallory",
            "email": "mallory@example.com",
            "password": PASSWORD,
            "role": "admin",
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = setup_app().await;

    app.server
        .get("/api/auth/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/auth/me")
        .authorization_bearer("not-a-jwt")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_a_new_access_token() {
    let app = setup_app().await;
    app.register("Carol", "student").await;

    let tokens = data(&app.login("carol@example.com", PASSWORD).await);
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let resp = app
        .server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": refresh }))
        .await;
    resp.assert_status_ok();
    assert!(data(&resp)["access_token"].as_str().is_some());

    // an access token is not a refresh token
    let access = tokens["access_token"].as_str().unwrap();
    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": access }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_checks_current_password() {
    let app = setup_app().await;
    let dave = app.register("Dave", "student").await;

    let resp = app
        .put(
            &dave,
            "/api/auth/password",
            json!({ "current_password": "Wr0ngPass!", "new_password": "N3wPassw0rd!" }),
        )
        .await;
    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json::<Value>()["errors"].get("current_password").is_some());

    app.put(
        &dave,
        "/api/auth/password",
        json!({ "current_password": PASSWORD, "new_password": "N3wPassw0rd!" }),
    )
    .await
    .assert_status_ok();

    app.login("dave@example.com", "N3wPassw0rd!")
        .await
        .assert_status_ok();
}
