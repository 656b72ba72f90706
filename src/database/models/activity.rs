use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit trail entry.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub action: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub action: String,
    pub target: String,
}

impl NewActivity {
    pub fn new(user_id: Uuid, tenant_id: Option<Uuid>, action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            user_id,
            tenant_id,
            action: action.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub limit: u64,
}

impl ActivityFilter {
    pub fn matches(&self, activity: &Activity) -> bool {
        self.user_id.map_or(true, |id| activity.user_id == id)
            && self.tenant_id.map_or(true, |id| activity.tenant_id == Some(id))
    }
}
