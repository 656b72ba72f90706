use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::Store;
use crate::state::AppState;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": {
            "name": "Tenant Admin API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant SaaS administration backend",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/api/v1/auth/* (public, update-password requires a session)",
                "users": "/api/v1/users/me* (protected)",
                "subscriptions": "/api/v1/subscriptions/* (protected)",
                "config": "/api/v1/config/plans (public), /api/v1/config/* (admin)",
                "contact": "/api/v1/contact (public)",
                "admin": "/api/v1/admin/* (admin, super-admin)",
            }
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unreachable"
                    }
                })),
            )
        }
    }
}
