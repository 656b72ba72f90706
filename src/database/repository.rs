//! Store traits for every collection.
//!
//! Default reads exclude soft-deleted (`active = false`) users and tenants;
//! each implementation applies that predicate explicitly in its queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{
    Activity, ActivityFilter, ConfigEntry, ConfigType, ConfigUpdate, DashboardStats, Invoice, InvoiceFilter,
    InvoiceStatus, NewActivity, NewInvoice, NewTenant, NewUser, Subscription, Tenant, TenantChanges,
    TenantFilter, TenantSubscription, User, UserChanges, UserFilter,
};
use super::StoreResult;

/// Default and maximum page sizes for list queries.
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// A page of results together with the total number of matches.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn page_limit(limit: u64) -> u64 {
    match limit {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, input: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// `email` must already be lower-cased.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Active user holding `token_hash` whose reset window has not closed at `now`.
    async fn find_user_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<User>>;
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Page<User>>;
    /// Returns `None` when no active user has that id.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Inserts the tenant and links its owner in one unit of work.
    async fn create_tenant(&self, input: NewTenant) -> StoreResult<Tenant>;
    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>>;
    async fn list_tenants(&self, filter: &TenantFilter) -> StoreResult<Page<Tenant>>;
    async fn update_tenant(&self, id: Uuid, changes: TenantChanges) -> StoreResult<Option<Tenant>>;
}

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn find_config(&self, config_type: ConfigType) -> StoreResult<Option<ConfigEntry>>;
    async fn list_configs(&self) -> StoreResult<Vec<ConfigEntry>>;
    async fn upsert_config(&self, config_type: ConfigType, update: ConfigUpdate) -> StoreResult<ConfigEntry>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn create_invoice(&self, input: NewInvoice) -> StoreResult<Invoice>;
    async fn find_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>>;
    async fn list_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Page<Invoice>>;
    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Invoice>>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn record_activity(&self, input: NewActivity) -> StoreResult<Activity>;
    /// Newest first.
    async fn list_activities(&self, filter: &ActivityFilter) -> StoreResult<Vec<Activity>>;
}

/// A user's new subscription plus everything that must change with it.
#[derive(Debug, Clone)]
pub struct SubscriptionChange {
    pub user_id: Uuid,
    pub subscription: Subscription,
    /// Mirror written onto the tenant the user owns.
    pub tenant: Option<(Uuid, TenantSubscription)>,
    pub invoice: Option<NewInvoice>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionOutcome {
    pub user: User,
    pub tenant: Option<Tenant>,
    pub invoice: Option<Invoice>,
}

#[async_trait]
pub trait Store:
    UserRepository + TenantRepository + ConfigRepository + InvoiceRepository + ActivityRepository
{
    /// Writes the user subscription, the tenant mirror and the invoice
    /// atomically: either all of them are stored or none is.
    async fn apply_subscription_change(&self, change: SubscriptionChange) -> StoreResult<SubscriptionOutcome>;

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats>;

    /// Round-trips to the backing store.
    async fn ping(&self) -> StoreResult<()>;
}
