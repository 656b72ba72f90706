mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use tenant_admin_api::database::models::Role;

#[tokio::test]
async fn new_accounts_start_on_free() -> Result<()> {
    let app = common::spawn_app().await;
    let (token, _) = app.register("Ada", "ada@example.com").await?;

    let res = app.get("/api/v1/subscriptions/current", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    let sub = &res.body["data"]["subscription"];
    assert_eq!(sub["plan"], "free");
    assert_eq!(sub["status"], "active");
    assert_eq!(sub["cancel_at_period_end"], false);
    Ok(())
}

#[tokio::test]
async fn paid_upgrade_issues_an_unpaid_invoice() -> Result<()> {
    let app = common::spawn_app().await;
    let (token, user_id) = app.register("Ada", "ada@example.com").await?;

    let res = app
        .post("/api/v1/subscriptions/upgrade", json!({ "plan": "professional" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["subscription"]["plan"], "professional");

    let invoice = &res.body["data"]["invoice"];
    assert_eq!(invoice["status"], "unpaid");
    assert_eq!(invoice["amount"], 4900);
    assert_eq!(invoice["user_id"], user_id.as_str());
    let issued = chrono::DateTime::parse_from_rfc3339(invoice["issued_at"].as_str().unwrap())?;
    let due = chrono::DateTime::parse_from_rfc3339(invoice["due_date"].as_str().unwrap())?;
    assert_eq!((due - issued).num_days(), 14);

    let res = app.get("/api/v1/subscriptions/invoices", Some(&token)).await?;
    assert_eq!(res.body["results"], 1);
    let invoice_id = res.body["data"]["invoices"][0]["id"].as_str().unwrap().to_string();

    let res = app
        .get(&format!("/api/v1/subscriptions/invoices/{}", invoice_id), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    // another user's invoice is simply not found
    let (other, _) = app.register("Bob", "bob@example.com").await?;
    let res = app
        .get(&format!("/api/v1/subscriptions/invoices/{}", invoice_id), Some(&other))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "No invoice found with that ID");

    let res = app.get("/api/v1/subscriptions/invoices/not-a-uuid", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["message"].as_str().unwrap().starts_with("Invalid id"));
    Ok(())
}

#[tokio::test]
async fn transitions_enforce_plan_order() -> Result<()> {
    let app = common::spawn_app().await;
    let (token, _) = app.register("Ada", "ada@example.com").await?;

    let res = app
        .post("/api/v1/subscriptions/downgrade", json!({ "plan": "free" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Cannot downgrade from free to free");

    let res = app
        .post("/api/v1/subscriptions/upgrade", json!({ "plan": "starter" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post("/api/v1/subscriptions/upgrade", json!({ "plan": "free" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Cannot upgrade from starter to free");

    let res = app
        .post("/api/v1/subscriptions/upgrade", json!({ "plan": "platinum" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // downgrade is scheduled, current plan keeps applying
    let res = app
        .post("/api/v1/subscriptions/downgrade", json!({ "plan": "free" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let sub = &res.body["data"]["subscription"];
    assert_eq!(sub["plan"], "starter");
    assert_eq!(sub["pending_plan"], "free");
    assert!(sub["end_date"].is_string());
    assert!(res.body["data"].get("invoice").is_none());
    Ok(())
}

#[tokio::test]
async fn cancel_and_reactivate() -> Result<()> {
    let app = common::spawn_app().await;
    let (token, _) = app.register("Ada", "ada@example.com").await?;

    let res = app.post("/api/v1/subscriptions/cancel", json!({}), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/api/v1/subscriptions/reactivate", json!({}), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    app.post("/api/v1/subscriptions/upgrade", json!({ "plan": "enterprise" }), Some(&token))
        .await?;

    let res = app.post("/api/v1/subscriptions/cancel", json!({}), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["subscription"]["cancel_at_period_end"], true);
    assert_eq!(res.body["data"]["subscription"]["plan"], "enterprise");

    let res = app.post("/api/v1/subscriptions/cancel", json!({}), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/api/v1/subscriptions/reactivate", json!({}), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    let sub = &res.body["data"]["subscription"];
    assert_eq!(sub["cancel_at_period_end"], false);
    assert_eq!(sub["status"], "active");
    assert!(sub["end_date"].is_null());
    Ok(())
}

#[tokio::test]
async fn owner_upgrade_is_mirrored_on_the_tenant() -> Result<()> {
    let app = common::spawn_app().await;
    let (admin, _) = app.account_with_role(Role::Admin, "admin@example.com").await?;
    let (token, owner_id) = app.register("Owner", "owner@example.com").await?;

    let res = app
        .post(
            "/api/v1/admin/tenants",
            json!({ "name": "Acme", "slug": "acme", "owner_id": owner_id }),
            Some(&admin),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["tenant"]["subscription"]["plan"], "free");

    app.post("/api/v1/subscriptions/upgrade", json!({ "plan": "professional" }), Some(&token))
        .await?;

    let res = app.get("/api/v1/users/me/tenant", Some(&token)).await?;
    let mirror = &res.body["data"]["tenant"]["subscription"];
    assert_eq!(mirror["plan"], "professional");
    assert_eq!(mirror["features"]["custom_domain"], true);

    // custom domain is now allowed
    let res = app
        .patch("/api/v1/users/me/tenant", json!({ "domain": "Acme.Example.com" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["tenant"]["domain"], "acme.example.com");
    Ok(())
}

#[tokio::test]
async fn plan_catalogue_is_public() -> Result<()> {
    let app = common::spawn_app().await;
    let res = app.get("/api/v1/config/plans", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 4);
    let plans = res.body["data"]["plans"].as_array().unwrap();
    assert_eq!(plans[0]["plan"], "free");
    assert_eq!(plans[2]["price_monthly"], 4900);
    Ok(())
}
