//! In-process store with the same semantics as the Postgres store.
//!
//! Used by the test suite and by development servers started without a
//! `DATABASE_URL`. All collections sit behind one lock so multi-record
//! writes are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    Activity, ActivityFilter, ConfigEntry, ConfigType, ConfigUpdate, DashboardStats, Invoice, InvoiceFilter,
    InvoiceStatus, NewActivity, NewInvoice, NewTenant, NewUser, Tenant, TenantChanges, TenantFilter, User,
    UserChanges, UserFilter,
};
use super::repository::{
    page_limit, ActivityRepository, ConfigRepository, InvoiceRepository, Page, Store, SubscriptionChange,
    SubscriptionOutcome, TenantRepository, UserRepository,
};
use super::{StoreError, StoreResult};

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    tenants: HashMap<Uuid, Tenant>,
    configs: HashMap<ConfigType, ConfigEntry>,
    invoices: HashMap<Uuid, Invoice>,
    activities: Vec<Activity>,
}

impl Collections {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users.values().any(|u| u.email == email && Some(u.id) != except)
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.tenants.values().any(|t| t.slug == slug && Some(t.id) != except)
    }

    fn domain_taken(&self, domain: &str, except: Option<Uuid>) -> bool {
        self.tenants
            .values()
            .any(|t| t.domain.as_deref() == Some(domain) && Some(t.id) != except)
    }

    fn active_user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.get_mut(&id).filter(|u| u.active)
    }

    fn insert_invoice(&mut self, input: NewInvoice, now: DateTime<Utc>) -> StoreResult<Invoice> {
        if self.invoices.values().any(|i| i.invoice_number == input.invoice_number) {
            return Err(duplicate("invoice_number"));
        }
        let invoice = Invoice {
            id: Uuid::new_v4(),
            amount: input.amount(),
            invoice_number: input.invoice_number,
            user_id: input.user_id,
            tenant_id: input.tenant_id,
            currency: input.currency,
            status: input.status,
            items: input.items,
            issued_at: input.issued_at,
            due_date: input.due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }
}

fn duplicate(field: &str) -> StoreError {
    StoreError::Duplicate {
        field: field.to_string(),
    }
}

/// Sorts newest first and cuts one page out of `items`.
fn paginate<T, K: Ord>(mut items: Vec<T>, offset: u64, limit: u64, key: impl Fn(&T) -> K) -> Page<T> {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(page_limit(limit) as usize)
        .collect();
    Page { items, total }
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        let mut data = self.data.write().await;
        if data.email_taken(&input.email, None) {
            return Err(duplicate("email"));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            password_hash: input.password_hash,
            role: input.role,
            subscription: input.subscription,
            tenant_id: input.tenant_id,
            preferences: input.preferences,
            active: true,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.get(&id).filter(|u| u.active).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.values().find(|u| u.active && u.email == email).cloned())
    }

    async fn find_user_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data
            .users
            .values()
            .find(|u| {
                u.active
                    && u.password_reset_token.as_deref() == Some(token_hash)
                    && u.password_reset_expires.map_or(false, |expires| expires > now)
            })
            .cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Page<User>> {
        let data = self.data.read().await;
        let matches = data.users.values().filter(|u| filter.matches(u)).cloned().collect();
        Ok(paginate(matches, filter.offset, filter.limit, |u: &User| u.created_at))
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut data = self.data.write().await;
        if let Some(email) = &changes.email {
            if data.email_taken(email, Some(id)) {
                return Err(duplicate("email"));
            }
        }
        let Some(user) = data.active_user_mut(id) else {
            return Ok(None);
        };
        changes.apply(user, Utc::now());
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn create_tenant(&self, input: NewTenant) -> StoreResult<Tenant> {
        let mut data = self.data.write().await;
        if data.slug_taken(&input.slug, None) {
            return Err(duplicate("slug"));
        }
        if let Some(domain) = &input.domain {
            if data.domain_taken(domain, None) {
                return Err(duplicate("domain"));
            }
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: input.name,
            slug: input.slug,
            domain: input.domain,
            owner_id: input.owner_id,
            subscription: input.subscription,
            billing: input.billing,
            branding: input.branding,
            settings: input.settings,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let owner = data
            .active_user_mut(input.owner_id)
            .ok_or_else(|| StoreError::NotFound("No user found with that ID".to_string()))?;
        owner.tenant_id = Some(tenant.id);
        owner.updated_at = now;

        data.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        let data = self.data.read().await;
        Ok(data.tenants.get(&id).filter(|t| t.active).cloned())
    }

    async fn list_tenants(&self, filter: &TenantFilter) -> StoreResult<Page<Tenant>> {
        let data = self.data.read().await;
        let matches = data.tenants.values().filter(|t| filter.matches(t)).cloned().collect();
        Ok(paginate(matches, filter.offset, filter.limit, |t: &Tenant| t.created_at))
    }

    async fn update_tenant(&self, id: Uuid, changes: TenantChanges) -> StoreResult<Option<Tenant>> {
        let mut data = self.data.write().await;
        if let Some(slug) = &changes.slug {
            if data.slug_taken(slug, Some(id)) {
                return Err(duplicate("slug"));
            }
        }
        if let Some(Some(domain)) = &changes.domain {
            if data.domain_taken(domain, Some(id)) {
                return Err(duplicate("domain"));
            }
        }
        let Some(tenant) = data.tenants.get_mut(&id).filter(|t| t.active) else {
            return Ok(None);
        };
        changes.apply(tenant, Utc::now());
        Ok(Some(tenant.clone()))
    }
}

#[async_trait]
impl ConfigRepository for MemoryStore {
    async fn find_config(&self, config_type: ConfigType) -> StoreResult<Option<ConfigEntry>> {
        let data = self.data.read().await;
        Ok(data.configs.get(&config_type).cloned())
    }

    async fn list_configs(&self) -> StoreResult<Vec<ConfigEntry>> {
        let data = self.data.read().await;
        let mut configs: Vec<ConfigEntry> = data.configs.values().cloned().collect();
        configs.sort_by_key(|c| c.config_type.as_str());
        Ok(configs)
    }

    async fn upsert_config(&self, config_type: ConfigType, update: ConfigUpdate) -> StoreResult<ConfigEntry> {
        let mut data = self.data.write().await;
        let now = Utc::now();
        let entry = data.configs.entry(config_type).or_insert_with(|| ConfigEntry {
            id: Uuid::new_v4(),
            config_type,
            plans: Vec::new(),
            settings: serde_json::json!({}),
            updated_by: None,
            created_at: now,
            updated_at: now,
        });
        if let Some(plans) = update.plans {
            entry.plans = plans;
        }
        if let Some(settings) = update.settings {
            entry.settings = settings;
        }
        if update.updated_by.is_some() {
            entry.updated_by = update.updated_by;
        }
        entry.updated_at = now;
        Ok(entry.clone())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn create_invoice(&self, input: NewInvoice) -> StoreResult<Invoice> {
        let mut data = self.data.write().await;
        data.insert_invoice(input, Utc::now())
    }

    async fn find_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>> {
        let data = self.data.read().await;
        Ok(data.invoices.get(&id).cloned())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Page<Invoice>> {
        let data = self.data.read().await;
        let matches = data.invoices.values().filter(|i| filter.matches(i)).cloned().collect();
        Ok(paginate(matches, filter.offset, filter.limit, |i: &Invoice| i.issued_at))
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Invoice>> {
        let mut data = self.data.write().await;
        let Some(invoice) = data.invoices.get_mut(&id) else {
            return Ok(None);
        };
        invoice.status = status;
        if paid_at.is_some() {
            invoice.paid_at = paid_at;
        }
        invoice.updated_at = Utc::now();
        Ok(Some(invoice.clone()))
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn record_activity(&self, input: NewActivity) -> StoreResult<Activity> {
        let mut data = self.data.write().await;
        let activity = Activity {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            tenant_id: input.tenant_id,
            action: input.action,
            target: input.target,
            created_at: Utc::now(),
        };
        data.activities.push(activity.clone());
        Ok(activity)
    }

    async fn list_activities(&self, filter: &ActivityFilter) -> StoreResult<Vec<Activity>> {
        let data = self.data.read().await;
        // Appended in time order, so reverse iteration is newest first.
        Ok(data
            .activities
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .take(filter.limit.max(1) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn apply_subscription_change(&self, change: SubscriptionChange) -> StoreResult<SubscriptionOutcome> {
        let mut data = self.data.write().await;
        let now = Utc::now();

        // Validate every target before mutating anything.
        if !data.users.get(&change.user_id).map_or(false, |u| u.active) {
            return Err(StoreError::NotFound("No user found with that ID".to_string()));
        }
        if let Some((tenant_id, _)) = &change.tenant {
            if !data.tenants.get(tenant_id).map_or(false, |t| t.active) {
                return Err(StoreError::NotFound("No tenant found with that ID".to_string()));
            }
        }
        if let Some(invoice) = &change.invoice {
            if data.invoices.values().any(|i| i.invoice_number == invoice.invoice_number) {
                return Err(duplicate("invoice_number"));
            }
        }

        let invoice = match change.invoice {
            Some(input) => Some(data.insert_invoice(input, now)?),
            None => None,
        };

        let tenant = match change.tenant {
            Some((tenant_id, mirror)) => data.tenants.get_mut(&tenant_id).map(|tenant| {
                tenant.subscription = mirror;
                tenant.updated_at = now;
                tenant.clone()
            }),
            None => None,
        };

        let user = data
            .active_user_mut(change.user_id)
            .map(|user| {
                user.subscription = change.subscription;
                user.updated_at = now;
                user.clone()
            })
            .ok_or_else(|| StoreError::NotFound("No user found with that ID".to_string()))?;

        Ok(SubscriptionOutcome { user, tenant, invoice })
    }

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        let data = self.data.read().await;
        let mut stats = DashboardStats::default();

        for user in data.users.values().filter(|u| u.active) {
            stats.total_users += 1;
            *stats.users_by_role.entry(user.role.as_str().to_string()).or_default() += 1;
            *stats
                .users_by_plan
                .entry(user.subscription.plan.as_str().to_string())
                .or_default() += 1;
        }
        stats.active_tenants = data.tenants.values().filter(|t| t.active).count() as i64;

        for invoice in data.invoices.values() {
            *stats
                .invoices_by_status
                .entry(invoice.status.as_str().to_string())
                .or_default() += 1;
            match invoice.status {
                InvoiceStatus::Paid => stats.revenue += invoice.amount,
                InvoiceStatus::Unpaid => stats.outstanding += invoice.amount,
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Plan, Subscription, TenantSubscription};

    fn new_user(email: &str) -> NewUser {
        NewUser::new("Test User", email, "hash")
    }

    fn new_tenant(owner_id: Uuid, slug: &str) -> NewTenant {
        NewTenant {
            name: "Acme".into(),
            slug: slug.into(),
            domain: None,
            owner_id,
            subscription: TenantSubscription::new(Plan::Free, Utc::now()),
            billing: Default::default(),
            branding: Default::default(),
            settings: Default::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();
        let err = store.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field } if field == "email"));
    }

    #[tokio::test]
    async fn deactivated_users_disappear_from_default_queries() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("gone@example.com")).await.unwrap();
        store
            .update_user(user.id, UserChanges { active: Some(false), ..Default::default() })
            .await
            .unwrap();

        assert!(store.find_user(user.id).await.unwrap().is_none());
        assert!(store.find_user_by_email("gone@example.com").await.unwrap().is_none());
        assert_eq!(store.list_users(&UserFilter::default()).await.unwrap().total, 0);
        assert!(store
            .update_user(user.id, UserChanges { name: Some("x".into()), ..Default::default() })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn creating_a_tenant_links_its_owner() {
        let store = MemoryStore::new();
        let owner = store.create_user(new_user("owner@example.com")).await.unwrap();
        let tenant = store.create_tenant(new_tenant(owner.id, "acme")).await.unwrap();

        let owner = store.find_user(owner.id).await.unwrap().unwrap();
        assert_eq!(owner.tenant_id, Some(tenant.id));

        let err = store.create_tenant(new_tenant(owner.id, "acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field } if field == "slug"));
    }

    #[tokio::test]
    async fn tenant_creation_fails_without_owner() {
        let store = MemoryStore::new();
        let err = store.create_tenant(new_tenant(Uuid::new_v4(), "orphan")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.list_tenants(&TenantFilter::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn subscription_change_is_all_or_nothing() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("sub@example.com")).await.unwrap();
        let upgraded = Subscription::new(Plan::Enterprise, Utc::now());

        // Unknown tenant: nothing may be written.
        let err = store
            .apply_subscription_change(SubscriptionChange {
                user_id: user.id,
                subscription: upgraded.clone(),
                tenant: Some((Uuid::new_v4(), TenantSubscription::mirror(&upgraded))),
                invoice: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let unchanged = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.subscription.plan, Plan::Free);
    }

    #[tokio::test]
    async fn reset_token_lookup_honours_expiry() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("reset@example.com")).await.unwrap();
        let now = Utc::now();
        store
            .update_user(
                user.id,
                UserChanges {
                    password_reset: Some(Some(("digest".into(), now + chrono::Duration::minutes(10)))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.find_user_by_reset_token("digest", now).await.unwrap().is_some());
        assert!(store
            .find_user_by_reset_token("digest", now + chrono::Duration::minutes(11))
            .await
            .unwrap()
            .is_none());
        assert!(store.find_user_by_reset_token("other", now).await.unwrap().is_none());
    }
}
