pub mod admin_service;
pub mod auth_service;
pub mod seed;
pub mod subscription_service;
pub mod tenant_service;
pub mod validation;

use crate::database::models::NewActivity;
use crate::database::ActivityRepository;
use crate::state::AppState;

/// Appends to the activity log. Failures are logged and never fail the request.
pub async fn record_activity(state: &AppState, activity: NewActivity) {
    let action = activity.action.clone();
    if let Err(e) = state.store.record_activity(activity).await {
        tracing::warn!(%action, "Failed to record activity: {}", e);
    }
}
