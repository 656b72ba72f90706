use axum::extract::State;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::subscription_service::plan_catalogue;
use crate::state::AppState;

/// GET /api/v1/config/plans
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let plans = plan_catalogue(&state).await?;
    let count = plans.len();
    Ok(ApiResponse::list(json!({ "plans": plans }), count))
}
