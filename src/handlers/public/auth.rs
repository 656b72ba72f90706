use axum::extract::{Path, State};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::handlers::{end_session, start_session};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, JsonBody};
use crate::services::auth_service::{self, Registration};
use crate::services::validation::{required, required_secret};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let input = Registration {
        name: required("name", body.name.as_deref())?.to_string(),
        email: required("email", body.email.as_deref())?.to_string(),
        password: required_secret("password", body.password)?,
        password_confirm: required_secret("password_confirm", body.password_confirm)?,
    };

    let user = auth_service::register(&state, input).await?;
    let jar = start_session(&state, jar, &user)?;
    Ok((jar, ApiResponse::created(json!({ "user": user }))))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let (Some(email), Some(password)) = (body.email.as_deref(), body.password.as_deref()) else {
        return Err(ApiError::bad_request("Please provide email and password!"));
    };

    let user = auth_service::login(&state, email, password).await?;
    let jar = start_session(&state, jar, &user)?;
    Ok((jar, ApiResponse::success(json!({ "user": user }))))
}

/// GET /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (end_session(&state, jar), ApiResponse::message("Logged out"))
}

/// POST /api/v1/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ForgotPasswordRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let email = required("email", body.email.as_deref())?;
    let token = auth_service::forgot_password(&state, email).await?;

    Ok(ApiResponse {
        message: Some("Token sent to email!".to_string()),
        ..ApiResponse::success(json!({ "reset_token": token }))
    })
}

/// PATCH /api/v1/auth/reset-password/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let password = required_secret("password", body.password)?;
    let confirm = required_secret("password_confirm", body.password_confirm)?;

    let user = auth_service::reset_password(&state, &token, password, &confirm).await?;
    let jar = start_session(&state, jar, &user)?;
    Ok((jar, ApiResponse::success(json!({ "user": user }))))
}
