mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::PASSWORD;

#[tokio::test]
async fn health_and_descriptor_respond() -> Result<()> {
    let app = common::spawn_app().await;

    let res = app.get("/health", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["database"], "ok");

    let res = app.get("/", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "success");
    assert!(res.body["data"]["endpoints"].is_object());

    // security headers on every response
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert_eq!(res.headers["x-frame-options"], "DENY");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() -> Result<()> {
    let app = common::spawn_app().await;
    let res = app.get("/api/v1/nope", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["status"], "error");
    assert!(res.body["message"].as_str().unwrap().contains("/api/v1/nope"));
    Ok(())
}

#[tokio::test]
async fn register_sets_http_only_cookie_and_hides_credentials() -> Result<()> {
    let app = common::spawn_app().await;
    let res = app
        .post(
            "/api/v1/auth/register",
            json!({ "name": "Ada", "email": "Ada@Example.com", "password": PASSWORD, "password_confirm": PASSWORD }),
            None,
        )
        .await?;

    assert_eq!(res.status, StatusCode::CREATED);
    let user = &res.body["data"]["user"];
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["role"], "user");
    assert_eq!(user["subscription"]["plan"], "free");
    assert!(user.get("password_hash").is_none());
    assert!(res.body["data"].get("token").is_none());

    let cookie = res.set_cookie_header();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    Ok(())
}

#[tokio::test]
async fn register_rejects_bad_input() -> Result<()> {
    let app = common::spawn_app().await;
    app.register("Ada", "ada@example.com").await?;

    let dup = app
        .post(
            "/api/v1/auth/register",
            json!({ "name": "Other", "email": "ADA@example.com", "password": PASSWORD, "password_confirm": PASSWORD }),
            None,
        )
        .await?;
    assert_eq!(dup.status, StatusCode::BAD_REQUEST);
    assert_eq!(dup.body["message"], "Duplicate field value: email");

    let mismatch = app
        .post(
            "/api/v1/auth/register",
            json!({ "name": "Bob", "email": "bob@example.com", "password": PASSWORD, "password_confirm": "something-else" }),
            None,
        )
        .await?;
    assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);
    assert_eq!(mismatch.body["message"], "Passwords are not the same");

    let short = app
        .post(
            "/api/v1/auth/register",
            json!({ "name": "Bob", "email": "bob@example.com", "password": "short", "password_confirm": "short" }),
            None,
        )
        .await?;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert!(short.body["field_errors"]["password"].is_string());
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_rejected_in_envelope() -> Result<()> {
    let app = common::spawn_app().await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))?;
    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let app = common::spawn_app().await;
    app.register("Ada", "ada@example.com").await?;

    let wrong_password = app.login("ada@example.com", "not-the-password").await?;
    let unknown_email = app.login("nobody@example.com", PASSWORD).await?;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body["message"], "Incorrect email or password");
    assert_eq!(wrong_password.body["message"], unknown_email.body["message"]);

    let missing = app.post("/api/v1/auth/login", json!({ "email": "ada@example.com" }), None).await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let ok = app.login("ADA@example.com", PASSWORD).await?;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(ok.session_cookie().is_some());
    assert!(ok.body["data"]["user"]["last_login_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> Result<()> {
    let app = common::spawn_app().await;

    let res = app.get("/api/v1/users/me", None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "You are not logged in! Please log in to get access.");

    let res = app.get("/api/v1/users/me", Some("loggedout")).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/api/v1/users/me", Some("garbage.token.value")).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid token. Please log in again!");
    Ok(())
}

#[tokio::test]
async fn bearer_header_is_accepted() -> Result<()> {
    let app = common::spawn_app().await;
    let (token, _) = app.register("Ada", "ada@example.com").await?;

    let request = axum::http::Request::builder()
        .uri("/api/v1/users/me")
        .header("authorization", format!("Bearer {}", token))
        .body(axum::body::Body::empty())?;
    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_overwrites_cookie_with_sentinel() -> Result<()> {
    let app = common::spawn_app().await;
    let res = app.get("/api/v1/auth/logout", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.session_cookie().as_deref(), Some("loggedout"));
    assert!(res.set_cookie_header().contains("Max-Age=10"));
    Ok(())
}

#[tokio::test]
async fn update_password_invalidates_old_sessions() -> Result<()> {
    let app = common::spawn_app().await;
    let (old_token, _) = app.register("Ada", "ada@example.com").await?;

    let wrong = app
        .patch(
            "/api/v1/auth/update-password",
            json!({ "current_password": "nope-nope-nope", "password": "brand-new-pass", "password_confirm": "brand-new-pass" }),
            Some(&old_token),
        )
        .await?;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], "Your current password is wrong");

    let res = app
        .patch(
            "/api/v1/auth/update-password",
            json!({ "current_password": PASSWORD, "password": "brand-new-pass", "password_confirm": "brand-new-pass" }),
            Some(&old_token),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let new_token = res.session_cookie().expect("fresh cookie");

    let stale = app.get("/api/v1/users/me", Some(&old_token)).await?;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    assert_eq!(stale.body["message"], "User recently changed password! Please log in again.");

    let fresh = app.get("/api/v1/users/me", Some(&new_token)).await?;
    assert_eq!(fresh.status, StatusCode::OK);

    assert_eq!(app.login("ada@example.com", PASSWORD).await?.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("ada@example.com", "brand-new-pass").await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn password_reset_flow() -> Result<()> {
    let app = common::spawn_app().await;
    let (old_token, _) = app.register("Ada", "ada@example.com").await?;

    let unknown = app
        .post("/api/v1/auth/forgot-password", json!({ "email": "ghost@example.com" }), None)
        .await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let res = app
        .post("/api/v1/auth/forgot-password", json!({ "email": "ada@example.com" }), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let token = res.body["data"]["reset_token"].as_str().expect("reset token").to_string();
    assert_eq!(token.len(), 64);

    {
        let sent = app.mailer.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert!(sent[0].body.contains(&token));
    }

    let bad = app
        .patch(
            "/api/v1/auth/reset-password/not-a-real-token",
            json!({ "password": "reset-password-1", "password_confirm": "reset-password-1" }),
            None,
        )
        .await?;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["message"], "Token is invalid or has expired");

    let reset = app
        .patch(
            &format!("/api/v1/auth/reset-password/{}", token),
            json!({ "password": "reset-password-1", "password_confirm": "reset-password-1" }),
            None,
        )
        .await?;
    assert_eq!(reset.status, StatusCode::OK);
    assert!(reset.session_cookie().is_some());

    // single use
    let again = app
        .patch(
            &format!("/api/v1/auth/reset-password/{}", token),
            json!({ "password": "reset-password-2", "password_confirm": "reset-password-2" }),
            None,
        )
        .await?;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.get("/api/v1/users/me", Some(&old_token)).await?.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("ada@example.com", "reset-password-1").await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn failed_reset_mail_clears_the_token() -> Result<()> {
    let app = common::spawn_app_with(
        common::test_config(),
        common::RecordingMailer {
            fail: true,
            ..Default::default()
        },
    )
    .await;
    app.register("Ada", "ada@example.com").await?;

    let res = app
        .post("/api/v1/auth/forgot-password", json!({ "email": "ada@example.com" }), None)
        .await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

    use tenant_admin_api::database::UserRepository;
    let user = app.store.find_user_by_email("ada@example.com").await?.expect("user");
    assert!(user.password_reset_token.is_none());
    assert!(user.password_reset_expires.is_none());
    Ok(())
}
