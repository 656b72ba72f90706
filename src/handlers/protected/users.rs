use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{ActivityFilter, BillingInfo, Branding, NewActivity, TenantChanges, TenantSettings, UserChanges, UserPreferences};
use crate::database::{ActivityRepository, UserRepository};
use crate::error::ApiError;
use crate::handlers::elevated::activities::activity_limit;
use crate::handlers::end_session;
use crate::middleware::{ApiResponse, CurrentUser, JsonBody, QueryParams};
use crate::services::record_activity;
use crate::services::tenant_service;
use crate::services::validation::{normalize_email, reject_password_fields, validate_email_format, validate_name};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub preferences: Option<UserPreferences>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMyTenantRequest {
    pub name: Option<String>,
    /// An empty string removes the custom domain.
    pub domain: Option<String>,
    pub billing: Option<BillingInfo>,
    pub branding: Option<Branding>,
    pub settings: Option<TenantSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u64>,
}

/// GET /api/v1/users/me
pub async fn me(CurrentUser(user): CurrentUser) -> ApiResponse<Value> {
    ApiResponse::success(json!({ "user": user }))
}

/// PATCH /api/v1/users/me
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<UpdateMeRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    reject_password_fields(&body.password, &body.password_confirm)?;

    let mut changes = UserChanges::default();
    if let Some(name) = body.name {
        validate_name(&name)?;
        changes.name = Some(name.trim().to_string());
    }
    if let Some(email) = body.email {
        let email = normalize_email(&email);
        validate_email_format(&email)?;
        changes.email = Some(email);
    }
    changes.preferences = body.preferences;

    if changes.is_empty() {
        return Ok(ApiResponse::success(json!({ "user": user })));
    }

    let updated = state
        .store
        .update_user(user.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))?;

    record_activity(&state, NewActivity::new(updated.id, updated.tenant_id, "update_profile", "user")).await;
    Ok(ApiResponse::success(json!({ "user": updated })))
}

/// DELETE /api/v1/users/me
///
/// Soft delete: the account is deactivated and the session cookie cleared.
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>), ApiError> {
    let changes = UserChanges {
        active: Some(false),
        ..Default::default()
    };
    state
        .store
        .update_user(user.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))?;

    tracing::info!(user_id = %user.id, "Account deactivated");
    record_activity(&state, NewActivity::new(user.id, user.tenant_id, "deactivate", "user")).await;
    Ok((end_session(&state, jar), ApiResponse::no_content()))
}

/// GET /api/v1/users/me/activity
pub async fn my_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<ActivityQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let filter = ActivityFilter {
        user_id: Some(user.id),
        tenant_id: None,
        limit: activity_limit(query.limit),
    };
    let activities = state.store.list_activities(&filter).await?;
    let count = activities.len();
    Ok(ApiResponse::list(json!({ "activities": activities }), count))
}

/// GET /api/v1/users/me/tenant
pub async fn my_tenant(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<Value>, ApiError> {
    let tenant = tenant_service::owned_tenant(&state, &user).await?;
    Ok(ApiResponse::success(json!({ "tenant": tenant })))
}

/// PATCH /api/v1/users/me/tenant
pub async fn update_my_tenant(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<UpdateMyTenantRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let changes = TenantChanges {
        name: body.name,
        domain: body.domain.map(|d| Some(d).filter(|d| !d.trim().is_empty())),
        billing: body.billing,
        branding: body.branding,
        settings: body.settings,
        ..Default::default()
    };

    let tenant = tenant_service::update_owned_tenant(&state, &user, changes).await?;
    Ok(ApiResponse::success(json!({ "tenant": tenant })))
}
