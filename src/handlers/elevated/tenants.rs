use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{BillingInfo, Branding, NewActivity, Plan, TenantChanges, TenantFilter, TenantSettings};
use crate::database::TenantRepository;
use crate::error::ApiError;
use crate::handlers::{parse_id, parse_param, Pagination};
use crate::middleware::{ApiResponse, CurrentUser, JsonBody, QueryParams};
use crate::services::record_activity;
use crate::services::tenant_service::{self, TenantInput};
use crate::services::validation::required;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub search: Option<String>,
    pub owner_id: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub domain: Option<String>,
    pub owner_id: Option<String>,
    pub plan: Option<String>,
    pub billing: Option<BillingInfo>,
    pub branding: Option<Branding>,
    pub settings: Option<TenantSettings>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    /// An empty string removes the custom domain.
    pub domain: Option<String>,
    pub billing: Option<BillingInfo>,
    pub branding: Option<Branding>,
    pub settings: Option<TenantSettings>,
}

/// GET /api/v1/admin/tenants
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TenantQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let page = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let owner_id = match query.owner_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    let filter = TenantFilter {
        owner_id,
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        offset: page.offset(),
        limit: page.limit(),
    };
    let found = state.store.list_tenants(&filter).await?;
    let count = found.items.len();
    Ok(ApiResponse::list(json!({ "tenants": found.items, "total": found.total }), count))
}

/// POST /api/v1/admin/tenants
pub async fn create(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateTenantRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let name = required("name", body.name.as_deref())?.to_string();
    let owner_id = parse_id(required("owner_id", body.owner_id.as_deref())?)?;

    let input = TenantInput {
        name,
        slug: body.slug.filter(|s| !s.trim().is_empty()),
        domain: body.domain.filter(|d| !d.trim().is_empty()),
        owner_id,
        plan: parse_param::<Plan>("plan", body.plan.as_deref())?,
        billing: body.billing,
        branding: body.branding,
        settings: body.settings,
    };

    let tenant = tenant_service::create_tenant(&state, input).await?;
    Ok(ApiResponse::created(json!({ "tenant": tenant })))
}

/// GET /api/v1/admin/tenants/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id)?;
    let tenant = state
        .store
        .find_tenant(id)
        .await?
        .ok_or_else(|| ApiError::not_found("No tenant found with that ID"))?;
    Ok(ApiResponse::success(json!({ "tenant": tenant })))
}

/// PATCH /api/v1/admin/tenants/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateTenantRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id)?;
    let mut changes = TenantChanges {
        name: body.name,
        slug: body.slug.map(|s| s.trim().to_string()),
        domain: body.domain.map(|d| Some(d).filter(|d| !d.trim().is_empty())),
        billing: body.billing,
        branding: body.branding,
        settings: body.settings,
        ..Default::default()
    };
    tenant_service::validate_changes(&mut changes)?;

    let tenant = state
        .store
        .update_tenant(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No tenant found with that ID"))?;

    record_activity(&state, NewActivity::new(actor.id, Some(tenant.id), "admin_update_tenant", tenant.slug.as_str())).await;
    Ok(ApiResponse::success(json!({ "tenant": tenant })))
}

/// DELETE /api/v1/admin/tenants/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let id = parse_id(&id)?;
    let changes = TenantChanges {
        active: Some(false),
        ..Default::default()
    };
    let tenant = state
        .store
        .update_tenant(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No tenant found with that ID"))?;

    tracing::info!(tenant_id = %tenant.id, actor_id = %actor.id, "Tenant deactivated");
    record_activity(&state, NewActivity::new(actor.id, Some(tenant.id), "admin_delete_tenant", tenant.slug.as_str())).await;
    Ok(ApiResponse::no_content())
}
