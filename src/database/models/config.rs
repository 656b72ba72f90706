use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::subscription::{Plan, TenantFeatures};
use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    SubscriptionPlans,
    EmailTemplates,
    SystemSettings,
    FeatureFlags,
    MarketingContent,
}

impl ConfigType {
    pub const ALL: [ConfigType; 5] = [
        ConfigType::SubscriptionPlans,
        ConfigType::EmailTemplates,
        ConfigType::SystemSettings,
        ConfigType::FeatureFlags,
        ConfigType::MarketingContent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::SubscriptionPlans => "subscription_plans",
            ConfigType::EmailTemplates => "email_templates",
            ConfigType::SystemSettings => "system_settings",
            ConfigType::FeatureFlags => "feature_flags",
            ConfigType::MarketingContent => "marketing_content",
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("config type", s))
    }
}

impl TryFrom<String> for ConfigType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One entry of the plan catalogue. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub plan: Plan,
    pub name: String,
    pub description: String,
    pub price_monthly: i64,
    pub price_yearly: i64,
    pub currency: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    pub limits: TenantFeatures,
}

impl PlanDefinition {
    pub fn default_catalogue() -> Vec<PlanDefinition> {
        Plan::ALL
            .into_iter()
            .map(|plan| {
                let (name, description, price_monthly, highlights): (&str, &str, i64, &[&str]) = match plan {
                    Plan::Free => ("Free", "For individuals trying things out", 0, &["Community support"]),
                    Plan::Starter => ("Starter", "For small teams getting started", 1900, &["API access", "Email support"]),
                    Plan::Professional => (
                        "Professional",
                        "For growing organizations",
                        4900,
                        &["Custom domain", "Priority support", "API access"],
                    ),
                    Plan::Enterprise => (
                        "Enterprise",
                        "For large organizations with custom needs",
                        19900,
                        &["White labeling", "Unlimited users", "Dedicated support"],
                    ),
                };
                PlanDefinition {
                    plan,
                    name: name.to_string(),
                    description: description.to_string(),
                    price_monthly,
                    price_yearly: price_monthly * 10,
                    currency: "usd".to_string(),
                    highlights: highlights.iter().map(|s| s.to_string()).collect(),
                    limits: plan.features(),
                }
            })
            .collect()
    }
}

/// One configuration document per `ConfigType`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConfigEntry {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub config_type: ConfigType,
    #[sqlx(json)]
    pub plans: Vec<PlanDefinition>,
    #[sqlx(json)]
    pub settings: Value,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigEntry {
    pub fn plan(&self, plan: Plan) -> Option<&PlanDefinition> {
        self.plans.iter().find(|p| p.plan == plan)
    }
}

/// Upsert payload; `None` keeps the stored value (or the default on insert).
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub plans: Option<Vec<PlanDefinition>>,
    pub settings: Option<Value>,
    pub updated_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_type_parses_snake_case() {
        assert_eq!("feature_flags".parse::<ConfigType>().unwrap(), ConfigType::FeatureFlags);
        assert!("featureFlags".parse::<ConfigType>().is_err());
    }

    #[test]
    fn default_catalogue_covers_every_plan_in_order() {
        let catalogue = PlanDefinition::default_catalogue();
        let plans: Vec<Plan> = catalogue.iter().map(|p| p.plan).collect();
        assert_eq!(plans, Plan::ALL.to_vec());
        assert_eq!(catalogue[0].price_monthly, 0);
        assert!(catalogue.iter().all(|p| p.price_yearly == p.price_monthly * 10));
    }
}
