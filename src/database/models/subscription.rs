use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days a downgrade or cancellation keeps the current plan before settling.
pub const GRACE_PERIOD_DAYS: i64 = 30;

/// Subscription tiers in ascending order. Every upgrade/downgrade check
/// compares through this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Starter,
    #[serde(alias = "pro")]
    Professional,
    Enterprise,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Starter, Plan::Professional, Plan::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Professional => "professional",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    /// Feature limits a tenant on this plan receives.
    pub fn features(&self) -> TenantFeatures {
        match self {
            Plan::Free => TenantFeatures {
                storage_gb: 1,
                max_users: 3,
                custom_domain: false,
                api_access: false,
                white_labeling: false,
                priority_support: false,
            },
            Plan::Starter => TenantFeatures {
                storage_gb: 10,
                max_users: 10,
                custom_domain: false,
                api_access: true,
                white_labeling: false,
                priority_support: false,
            },
            Plan::Professional => TenantFeatures {
                storage_gb: 100,
                max_users: 50,
                custom_domain: true,
                api_access: true,
                white_labeling: false,
                priority_support: true,
            },
            Plan::Enterprise => TenantFeatures {
                storage_gb: 1000,
                max_users: 0,
                custom_domain: true,
                api_access: true,
                white_labeling: true,
                priority_support: true,
            },
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "starter" => Ok(Plan::Starter),
            "professional" | "pro" => Ok(Plan::Professional),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(format!("Unknown plan '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Cancelled,
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            other => Err(format!("Unknown subscription status '{}'", other)),
        }
    }
}

/// Subscription sub-document embedded in a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    /// When a pending downgrade or cancellation takes effect.
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending_plan: Option<Plan>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl Subscription {
    pub fn new(plan: Plan, now: DateTime<Utc>) -> Self {
        Self {
            plan,
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: None,
            pending_plan: None,
            cancel_at_period_end: false,
        }
    }

    pub fn grace_end(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(GRACE_PERIOD_DAYS)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled
    }

    /// Applies a pending downgrade or cancellation whose end date has passed.
    /// Returns `true` when the subscription changed.
    pub fn settle(&mut self, now: DateTime<Utc>) -> bool {
        let due = matches!(self.end_date, Some(end) if end <= now);
        if !due {
            return false;
        }

        if self.cancel_at_period_end {
            self.plan = Plan::Free;
            self.status = SubscriptionStatus::Cancelled;
        } else if let Some(pending) = self.pending_plan {
            self.plan = pending;
            self.status = SubscriptionStatus::Active;
            self.start_date = now;
        } else {
            return false;
        }

        self.pending_plan = None;
        self.cancel_at_period_end = false;
        self.end_date = None;
        true
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new(Plan::Free, Utc::now())
    }
}

/// Limits and switches derived from a tenant's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantFeatures {
    pub storage_gb: u32,
    /// 0 means unlimited.
    pub max_users: u32,
    pub custom_domain: bool,
    pub api_access: bool,
    pub white_labeling: bool,
    pub priority_support: bool,
}

/// Subscription mirrored onto a tenant, with the features its plan grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSubscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub features: TenantFeatures,
}

impl TenantSubscription {
    pub fn new(plan: Plan, now: DateTime<Utc>) -> Self {
        Self {
            plan,
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: None,
            features: plan.features(),
        }
    }

    /// Mirror of a user's subscription; features follow the plan in force.
    pub fn mirror(subscription: &Subscription) -> Self {
        Self {
            plan: subscription.plan,
            status: subscription.status,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            features: subscription.plan.features(),
        }
    }
}
