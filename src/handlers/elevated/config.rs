use std::collections::HashSet;

use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::database::models::{ConfigType, ConfigUpdate, NewActivity, PlanDefinition};
use crate::database::ConfigRepository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, CurrentUser, JsonBody};
use crate::services::record_activity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    pub plans: Option<Vec<PlanDefinition>>,
    pub settings: Option<Value>,
}

fn parse_type(raw: &str) -> Result<ConfigType, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("No config found for type {}", raw)))
}

/// Plans belong to `subscription_plans` only, and each tier appears at most once.
fn validate_plans(config_type: ConfigType, plans: &[PlanDefinition]) -> Result<(), ApiError> {
    if config_type != ConfigType::SubscriptionPlans {
        return Err(ApiError::field(
            "plans",
            format!("Plans can only be set on {}", ConfigType::SubscriptionPlans),
        ));
    }
    let mut seen = HashSet::new();
    for definition in plans {
        if !seen.insert(definition.plan) {
            return Err(ApiError::field("plans", format!("Duplicate plan: {}", definition.plan)));
        }
        if definition.price_monthly < 0 || definition.price_yearly < 0 {
            return Err(ApiError::field("plans", "Plan prices cannot be negative"));
        }
    }
    Ok(())
}

/// GET /api/v1/config
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let configs = state.store.list_configs().await?;
    let count = configs.len();
    Ok(ApiResponse::list(json!({ "configs": configs }), count))
}

/// GET /api/v1/config/:type
pub async fn get(State(state): State<AppState>, Path(raw): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let config_type = parse_type(&raw)?;
    let config = state
        .store
        .find_config(config_type)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No config found for type {}", config_type)))?;
    Ok(ApiResponse::success(json!({ "config": config })))
}

/// PUT /api/v1/config/:type
pub async fn upsert(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(raw): Path<String>,
    JsonBody(body): JsonBody<ConfigRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let config_type = parse_type(&raw)?;
    if let Some(plans) = &body.plans {
        validate_plans(config_type, plans)?;
    }
    if matches!(&body.settings, Some(settings) if !settings.is_object()) {
        return Err(ApiError::field("settings", "Settings must be a JSON object"));
    }

    let update = ConfigUpdate {
        plans: body.plans,
        settings: body.settings,
        updated_by: Some(actor.id),
    };
    let config = state.store.upsert_config(config_type, update).await?;

    info!(config_type = %config_type, actor_id = %actor.id, "Config updated");
    record_activity(&state, NewActivity::new(actor.id, actor.tenant_id, "config_update", config_type.as_str())).await;
    Ok(ApiResponse::success(json!({ "config": config })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Plan;

    #[test]
    fn plans_only_on_the_plan_catalogue() {
        let catalogue = PlanDefinition::default_catalogue();
        assert!(validate_plans(ConfigType::SubscriptionPlans, &catalogue).is_ok());
        assert!(validate_plans(ConfigType::FeatureFlags, &catalogue).is_err());
    }

    #[test]
    fn repeated_plans_are_rejected() {
        let mut catalogue = PlanDefinition::default_catalogue();
        catalogue.push(catalogue[1].clone());
        let err = validate_plans(ConfigType::SubscriptionPlans, &catalogue).unwrap_err();
        assert_eq!(err.message(), format!("Duplicate plan: {}", Plan::Starter));
    }

    #[test]
    fn unknown_types_are_not_found() {
        assert_eq!(parse_type("nope").unwrap_err().status_code(), 404);
        assert_eq!(parse_type("system_settings").unwrap(), ConfigType::SystemSettings);
    }
}
