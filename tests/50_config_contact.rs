mod common;

use anyhow::Result;
use axum::http::{header, StatusCode};
use serde_json::json;

use tenant_admin_api::database::models::Role;

#[tokio::test]
async fn config_documents_are_seeded_and_readable() -> Result<()> {
    let app = common::spawn_app().await;
    let (admin, _) = app.account_with_role(Role::Admin, "admin@example.com").await?;

    let res = app.get("/api/v1/config", Some(&admin)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 5);

    let res = app.get("/api/v1/config/feature_flags", Some(&admin)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["config"]["config_type"], "feature_flags");

    let res = app.get("/api/v1/config/colour_scheme", Some(&admin)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "No config found for type colour_scheme");
    Ok(())
}

#[tokio::test]
async fn config_upsert_validates_plans() -> Result<()> {
    let app = common::spawn_app().await;
    let (admin, admin_user) = app.account_with_role(Role::Admin, "admin@example.com").await?;

    let plans = app.get("/api/v1/config/plans", None).await?.body["data"]["plans"].clone();

    let res = app
        .put("/api/v1/config/feature_flags", json!({ "plans": plans }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let mut repeated = plans.as_array().unwrap().clone();
    repeated.push(repeated[0].clone());
    let res = app
        .put("/api/v1/config/subscription_plans", json!({ "plans": repeated }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Duplicate plan: free");

    let mut cheaper = plans.as_array().unwrap().clone();
    cheaper[1]["price_monthly"] = json!(990);
    let res = app
        .put("/api/v1/config/subscription_plans", json!({ "plans": cheaper }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["config"]["updated_by"], admin_user.id.to_string());

    // the new price flows into the public catalogue and into upgrade invoices
    let res = app.get("/api/v1/config/plans", None).await?;
    assert_eq!(res.body["data"]["plans"][1]["price_monthly"], 990);

    let (ada, _) = app.register("Ada", "ada@example.com").await?;
    let res = app
        .post("/api/v1/subscriptions/upgrade", json!({ "plan": "starter" }), Some(&ada))
        .await?;
    assert_eq!(res.body["data"]["invoice"]["amount"], 990);

    let res = app
        .put("/api/v1/config/system_settings", json!({ "settings": "not an object" }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .put(
            "/api/v1/config/system_settings",
            json!({ "settings": { "maintenance_mode": true } }),
            Some(&admin),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["config"]["settings"]["maintenance_mode"], true);
    Ok(())
}

#[tokio::test]
async fn contact_form_is_mailed_to_support() -> Result<()> {
    let app = common::spawn_app().await;

    let res = app
        .post(
            "/api/v1/contact",
            json!({
                "name": "Ada",
                "email": "Ada@Example.com",
                "subject": "Billing question",
                "message": "How do I download my invoices?"
            }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "success");
    assert!(res.body["message"].as_str().unwrap().starts_with("Thank you for your message"));

    let sent = app.mailer.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "support@localhost");
    assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
    assert!(sent[0].subject.contains("Billing question"));
    Ok(())
}

#[tokio::test]
async fn contact_form_validation() -> Result<()> {
    let app = common::spawn_app().await;

    let short = app
        .post(
            "/api/v1/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hi" }),
            None,
        )
        .await?;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert!(short.body["field_errors"]["message"].is_string());

    let bad_email = app
        .post(
            "/api/v1/contact",
            json!({ "name": "Ada", "email": "ada", "message": "A long enough message" }),
            None,
        )
        .await?;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let too_long = app
        .post(
            "/api/v1/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "x".repeat(5001) }),
            None,
        )
        .await?;
    assert_eq!(too_long.status, StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn contact_mail_failure_is_reported() -> Result<()> {
    let app = common::spawn_app_with(
        common::test_config(),
        common::RecordingMailer {
            fail: true,
            ..Default::default()
        },
    )
    .await;

    let res = app
        .post(
            "/api/v1/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Is anyone there?" }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["status"], "error");
    Ok(())
}

#[tokio::test]
async fn api_rate_limit_returns_429() -> Result<()> {
    let mut config = common::test_config();
    config.api.enable_rate_limiting = true;
    config.api.rate_limit_requests = 3;
    config.api.rate_limit_window_secs = 60;
    let app = common::spawn_app_with(config, common::RecordingMailer::default()).await;

    for _ in 0..3 {
        let res = app.get("/api/v1/config/plans", None).await?;
        assert_eq!(res.status, StatusCode::OK);
    }
    let res = app.get("/api/v1/config/plans", None).await?;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["status"], "error");
    assert!(res.headers.contains_key(header::RETRY_AFTER));

    // operational routes are outside the limiter
    assert_eq!(app.get("/health", None).await?.status, StatusCode::OK);
    Ok(())
}
