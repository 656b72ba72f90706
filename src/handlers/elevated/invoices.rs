use axum::extract::{Path, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::database::models::{InvoiceFilter, InvoiceStatus, NewActivity};
use crate::database::InvoiceRepository;
use crate::error::ApiError;
use crate::handlers::{parse_id, parse_param, Pagination};
use crate::middleware::{ApiResponse, CurrentUser, JsonBody, QueryParams};
use crate::services::record_activity;
use crate::services::validation::required;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// GET /api/v1/admin/invoices
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<InvoiceQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let page = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let user_id = match query.user_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    let filter = InvoiceFilter {
        user_id,
        status: parse_param::<InvoiceStatus>("status", query.status.as_deref())?,
        offset: page.offset(),
        limit: page.limit(),
    };
    let found = state.store.list_invoices(&filter).await?;
    let count = found.items.len();
    Ok(ApiResponse::list(json!({ "invoices": found.items, "total": found.total }), count))
}

/// PATCH /api/v1/admin/invoices/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id)?;
    let raw = required("status", body.status.as_deref())?;
    let next: InvoiceStatus = raw
        .parse()
        .map_err(|_| ApiError::field("status", format!("Invalid status: {}", raw)))?;

    let invoice = state
        .store
        .find_invoice(id)
        .await?
        .ok_or_else(|| ApiError::not_found("No invoice found with that ID"))?;

    if !invoice.status.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "Cannot change invoice status from {} to {}",
            invoice.status, next
        )));
    }

    let paid_at = match next {
        InvoiceStatus::Paid => Some(Utc::now()),
        _ => invoice.paid_at,
    };
    let updated = state
        .store
        .update_invoice_status(id, next, paid_at)
        .await?
        .ok_or_else(|| ApiError::not_found("No invoice found with that ID"))?;

    info!(invoice_id = %id, from = %invoice.status, to = %next, "Invoice status changed");
    record_activity(
        &state,
        NewActivity::new(actor.id, actor.tenant_id, "invoice_status", updated.invoice_number.as_str()),
    )
    .await;
    Ok(ApiResponse::success(json!({ "invoice": updated })))
}
