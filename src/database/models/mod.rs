pub mod activity;
pub mod config;
pub mod invoice;
pub mod subscription;
pub mod tenant;
pub mod user;

pub use activity::{Activity, ActivityFilter, NewActivity};
pub use config::{ConfigEntry, ConfigType, ConfigUpdate, PlanDefinition};
pub use invoice::{Invoice, InvoiceFilter, InvoiceItem, InvoiceStatus, NewInvoice};
pub use subscription::{Plan, Subscription, SubscriptionStatus, TenantFeatures, TenantSubscription};
pub use tenant::{BillingInfo, Branding, NewTenant, Tenant, TenantChanges, TenantFilter, TenantSettings};
pub use user::{NewUser, Role, User, UserChanges, UserFilter, UserPreferences};

use serde::Serialize;
use std::collections::BTreeMap;

/// A stored or submitted value that names no known variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Aggregates shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub users_by_plan: BTreeMap<String, i64>,
    pub active_tenants: i64,
    pub invoices_by_status: BTreeMap<String, i64>,
    /// Sum of paid invoices, minor units.
    pub revenue: i64,
    /// Sum of unpaid invoices, minor units.
    pub outstanding: i64,
}
