use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{InvoiceFilter, Plan};
use crate::database::{InvoiceRepository, SubscriptionOutcome};
use crate::error::ApiError;
use crate::handlers::{parse_id, parse_param, Pagination};
use crate::middleware::{ApiResponse, CurrentUser, JsonBody, QueryParams};
use crate::services::subscription_service::{self, Transition};
use crate::services::validation::required;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub plan: Option<String>,
}

impl PlanRequest {
    fn plan(&self) -> Result<Plan, ApiError> {
        let raw = required("plan", self.plan.as_deref())?;
        parse_param("plan", Some(raw))?.ok_or_else(|| ApiError::field("plan", "Please provide plan"))
    }
}

fn outcome_body(outcome: SubscriptionOutcome) -> Value {
    let mut body = json!({ "subscription": outcome.user.subscription });
    if let Some(invoice) = outcome.invoice {
        body["invoice"] = json!(invoice);
    }
    body
}

/// GET /api/v1/subscriptions/current
pub async fn current(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<Value>, ApiError> {
    let subscription = subscription_service::current(&state, &user).await?;
    Ok(ApiResponse::success(json!({ "subscription": subscription })))
}

/// POST /api/v1/subscriptions/upgrade
pub async fn upgrade(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<PlanRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let outcome = subscription_service::apply(&state, &user, Transition::Upgrade(body.plan()?)).await?;
    Ok(ApiResponse::success(outcome_body(outcome)))
}

/// POST /api/v1/subscriptions/downgrade
pub async fn downgrade(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<PlanRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let outcome = subscription_service::apply(&state, &user, Transition::Downgrade(body.plan()?)).await?;
    Ok(ApiResponse::success(outcome_body(outcome)))
}

/// POST /api/v1/subscriptions/cancel
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<Value>, ApiError> {
    let outcome = subscription_service::apply(&state, &user, Transition::Cancel).await?;
    Ok(ApiResponse::success(outcome_body(outcome)))
}

/// POST /api/v1/subscriptions/reactivate
pub async fn reactivate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<Value>, ApiError> {
    let outcome = subscription_service::apply(&state, &user, Transition::Reactivate).await?;
    Ok(ApiResponse::success(outcome_body(outcome)))
}

/// GET /api/v1/subscriptions/invoices
pub async fn invoices(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<ApiResponse<Value>, ApiError> {
    let filter = InvoiceFilter {
        user_id: Some(user.id),
        status: None,
        offset: page.offset(),
        limit: page.limit(),
    };
    let found = state.store.list_invoices(&filter).await?;
    let count = found.items.len();
    Ok(ApiResponse::list(json!({ "invoices": found.items, "total": found.total }), count))
}

/// GET /api/v1/subscriptions/invoices/:id
///
/// Another user's invoice answers 404, never 403.
pub async fn invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id)?;
    let invoice = state
        .store
        .find_invoice(id)
        .await?
        .filter(|invoice| invoice.user_id == user.id)
        .ok_or_else(|| ApiError::not_found("No invoice found with that ID"))?;
    Ok(ApiResponse::success(json!({ "invoice": invoice })))
}
