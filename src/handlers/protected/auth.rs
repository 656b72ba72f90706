use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::start_session;
use crate::middleware::{ApiResponse, CurrentUser, JsonBody};
use crate::services::auth_service;
use crate::services::validation::required_secret;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// PATCH /api/v1/auth/update-password
///
/// Re-issues the session cookie: the password change invalidates the
/// token the request arrived with.
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    JsonBody(body): JsonBody<UpdatePasswordRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let current = required_secret("current_password", body.current_password)?;
    let password = required_secret("password", body.password)?;
    let confirm = required_secret("password_confirm", body.password_confirm)?;

    let user = auth_service::update_password(&state, &user, &current, password, &confirm).await?;
    let jar = start_session(&state, jar, &user)?;
    Ok((jar, ApiResponse::success(json!({ "user": user }))))
}
