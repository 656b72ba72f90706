//! Default configuration documents and the bootstrap administrator.

use serde_json::{json, Value};
use tracing::info;

use crate::auth;
use crate::config::AdminBootstrap;
use crate::database::models::{ConfigType, ConfigUpdate, NewUser, PlanDefinition, Role, User, UserChanges};
use crate::database::{ConfigRepository, Store, StoreError, UserRepository};
use crate::services::validation::normalize_email;

fn default_settings(config_type: ConfigType) -> Value {
    match config_type {
        ConfigType::SubscriptionPlans => json!({ "trial_days": 0, "grace_period_days": 30 }),
        ConfigType::EmailTemplates => json!({
            "password_reset": {
                "subject": "Your password reset token (valid for 10 minutes)"
            },
            "welcome": { "subject": "Welcome aboard" }
        }),
        ConfigType::SystemSettings => json!({
            "maintenance_mode": false,
            "allow_registration": true,
            "support_email": null
        }),
        ConfigType::FeatureFlags => json!({ "tenant_self_service": true, "invoices": true }),
        ConfigType::MarketingContent => json!({ "headline": "", "announcements": [] }),
    }
}

/// Inserts every missing configuration document. Returns how many were created.
pub async fn seed_default_configs(store: &dyn Store) -> Result<usize, StoreError> {
    let mut created = 0;
    for config_type in ConfigType::ALL {
        if store.find_config(config_type).await?.is_some() {
            continue;
        }
        let plans = match config_type {
            ConfigType::SubscriptionPlans => Some(PlanDefinition::default_catalogue()),
            _ => None,
        };
        store
            .upsert_config(
                config_type,
                ConfigUpdate {
                    plans,
                    settings: Some(default_settings(config_type)),
                    updated_by: None,
                },
            )
            .await?;
        info!(config_type = %config_type, "Seeded default configuration");
        created += 1;
    }
    Ok(created)
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] auth::AuthError),
}

/// Creates (or promotes) the configured administrator as super-admin.
/// Does nothing unless both email and password are configured.
pub async fn bootstrap_admin(store: &dyn Store, admin: &AdminBootstrap) -> Result<Option<User>, SeedError> {
    let (Some(email), Some(password)) = (admin.email.as_deref(), admin.password.as_deref()) else {
        return Ok(None);
    };
    let email = normalize_email(email);

    if let Some(existing) = store.find_user_by_email(&email).await? {
        if existing.role == Role::SuperAdmin {
            return Ok(Some(existing));
        }
        let promoted = store
            .update_user(
                existing.id,
                UserChanges {
                    role: Some(Role::SuperAdmin),
                    ..Default::default()
                },
            )
            .await?;
        info!(%email, "Promoted existing user to super-admin");
        return Ok(promoted);
    }

    let mut user = NewUser::new(admin.name.clone(), email.clone(), auth::hash_password(password)?);
    user.role = Role::SuperAdmin;
    let user = store.create_user(user).await?;
    info!(%email, "Created bootstrap super-admin");
    Ok(Some(user))
}
