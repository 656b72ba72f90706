use axum::extract::State;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::admin_service;
use crate::state::AppState;

/// GET /api/v1/admin/stats
pub async fn dashboard(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let stats = admin_service::dashboard(&state).await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}
