use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::ActivityFilter;
use crate::database::ActivityRepository;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, QueryParams};
use crate::state::AppState;

pub const DEFAULT_ACTIVITY_LIMIT: u64 = 50;
pub const MAX_ACTIVITY_LIMIT: u64 = 200;

/// Clamp a requested activity count into `1..=MAX_ACTIVITY_LIMIT`.
pub fn activity_limit(requested: Option<u64>) -> u64 {
    match requested {
        None | Some(0) => DEFAULT_ACTIVITY_LIMIT,
        Some(n) => n.min(MAX_ACTIVITY_LIMIT),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub user_id: Option<String>,
    pub limit: Option<u64>,
}

/// GET /api/v1/admin/activities
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ActivityQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let user_id = match query.user_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    let filter = ActivityFilter {
        user_id,
        tenant_id: None,
        limit: activity_limit(query.limit),
    };
    let activities = state.store.list_activities(&filter).await?;
    let count = activities.len();
    Ok(ApiResponse::list(json!({ "activities": activities }), count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_and_cap() {
        assert_eq!(activity_limit(None), 50);
        assert_eq!(activity_limit(Some(0)), 50);
        assert_eq!(activity_limit(Some(10)), 10);
        assert_eq!(activity_limit(Some(1000)), 200);
    }
}
