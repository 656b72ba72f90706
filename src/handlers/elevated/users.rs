use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{Plan, Role, SubscriptionStatus, User, UserFilter, UserPreferences};
use crate::database::UserRepository;
use crate::error::ApiError;
use crate::handlers::{parse_id, parse_param, Pagination};
use crate::middleware::{ApiResponse, CurrentUser, JsonBody, QueryParams};
use crate::services::admin_service::{self, AccountUpdate, NewAccount};
use crate::services::subscription_service;
use crate::services::validation::{reject_password_fields, required, required_secret};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
    pub plan: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub preferences: Option<UserPreferences>,
    pub active: Option<bool>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub plan: Option<String>,
    pub status: Option<String>,
}

async fn load_user(state: &AppState, raw_id: &str) -> Result<User, ApiError> {
    let id = parse_id(raw_id)?;
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))
}

/// GET /api/v1/admin/users
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<UserQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let page = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let filter = UserFilter {
        role: parse_param::<Role>("role", query.role.as_deref())?,
        plan: parse_param::<Plan>("plan", query.plan.as_deref())?,
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        tenant_id: None,
        offset: page.offset(),
        limit: page.limit(),
    };

    let found = state.store.list_users(&filter).await?;
    let count = found.items.len();
    Ok(ApiResponse::list(
        json!({ "users": found.items, "total": found.total, "page": page.page() }),
        count,
    ))
}

/// POST /api/v1/admin/users
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let input = NewAccount {
        name: required("name", body.name.as_deref())?.to_string(),
        email: required("email", body.email.as_deref())?.to_string(),
        password: required_secret("password", body.password)?,
        role: parse_param("role", body.role.as_deref())?,
        plan: parse_param("plan", body.plan.as_deref())?,
    };

    let user = admin_service::create_account(&state, &actor, input).await?;
    Ok(ApiResponse::created(json!({ "user": user })))
}

/// GET /api/v1/admin/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let user = load_user(&state, &id).await?;
    Ok(ApiResponse::success(json!({ "user": user })))
}

/// PATCH /api/v1/admin/users/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    reject_password_fields(&body.password, &body.password_confirm)?;
    let target = load_user(&state, &id).await?;

    let update = AccountUpdate {
        name: body.name,
        email: body.email,
        role: parse_param("role", body.role.as_deref())?,
        preferences: body.preferences,
        active: body.active,
    };
    let user = admin_service::update_account(&state, &actor, &target, update).await?;
    Ok(ApiResponse::success(json!({ "user": user })))
}

/// DELETE /api/v1/admin/users/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let target = load_user(&state, &id).await?;
    admin_service::deactivate_account(&state, &actor, &target).await?;
    Ok(ApiResponse::no_content())
}

/// PATCH /api/v1/admin/users/:id/subscription
///
/// Takes effect immediately; no invoice is issued.
pub async fn set_subscription(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<SubscriptionRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let target = load_user(&state, &id).await?;
    admin_service::ensure_can_manage(&actor, &target)?;

    let plan: Plan = parse_param("plan", Some(required("plan", body.plan.as_deref())?))?
        .ok_or_else(|| ApiError::field("plan", "Please provide plan"))?;
    let status = parse_param::<SubscriptionStatus>("status", body.status.as_deref())?;

    let outcome = subscription_service::set_plan(&state, &target, plan, status).await?;
    tracing::info!(user_id = %target.id, actor_id = %actor.id, plan = %plan, "Subscription set by admin");
    Ok(ApiResponse::success(json!({
        "user": outcome.user,
        "subscription": outcome.user.subscription,
    })))
}
