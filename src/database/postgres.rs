use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::migrate::MigrateError;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use tokio::sync::OnceCell;
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
use super::{DatabaseError, DatabaseManager, StoreError, StoreResult};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, subscription, tenant_id, preferences, active, \
     password_changed_at, password_reset_token, password_reset_expires, last_login_at, created_at, updated_at";

const TENANT_COLUMNS: &str =
    "id, name, slug, domain, owner_id, subscription, billing, branding, settings, active, created_at, updated_at";

const CONFIG_COLUMNS: &str = "id, config_type, plans, settings, updated_by, created_at, updated_at";

const INVOICE_COLUMNS: &str = "id, invoice_number, user_id, tenant_id, amount, currency, status, items, \
     issued_at, due_date, paid_at, created_at, updated_at";

const ACTIVITY_COLUMNS: &str = "id, user_id, tenant_id, action, target, created_at";

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE active = TRUE");
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(plan) = filter.plan {
        qb.push(" AND subscription->>'plan' = ").push_bind(plan.as_str());
    }
    if let Some(tenant_id) = filter.tenant_id {
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_tenant_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TenantFilter) {
    qb.push(" WHERE active = TRUE");
    if let Some(owner_id) = filter.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner_id);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR slug ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_invoice_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, offset: u64, limit: u64) {
    qb.push(" LIMIT ")
        .push_bind(page_limit(limit) as i64)
        .push(" OFFSET ")
        .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
}

fn schema_error(err: DatabaseError) -> StoreError {
    match err {
        DatabaseError::Sqlx(e) | DatabaseError::Migration(MigrateError::Execute(e)) => e.into(),
        other => StoreError::Schema(other.to_string()),
    }
}

/// Postgres-backed store. Every statement goes through the shared pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: Arc<OnceCell<()>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// The pool, once migrations have been applied to it.
    ///
    /// A pool created while the database was down is migrated on the first
    /// call that reaches it; failed attempts are retried on the next call.
    async fn ready(&self) -> StoreResult<&PgPool> {
        self.schema
            .get_or_try_init(|| async { DatabaseManager::migrate(&self.pool).await.map_err(schema_error) })
            .await?;
        Ok(&self.pool)
    }

    async fn insert_invoice<'c, E>(executor: E, input: NewInvoice) -> StoreResult<Invoice>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let amount = input.amount();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "INSERT INTO invoices (id, invoice_number, user_id, tenant_id, amount, currency, status, items, issued_at, due_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(input.invoice_number)
        .bind(input.user_id)
        .bind(input.tenant_id)
        .bind(amount)
        .bind(input.currency)
        .bind(input.status.as_str())
        .bind(Json(input.items))
        .bind(input.issued_at)
        .bind(input.due_date)
        .fetch_one(executor)
        .await?;
        Ok(invoice)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, subscription, tenant_id, preferences)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(input.name)
        .bind(input.email)
        .bind(input.password_hash)
        .bind(input.role.as_str())
        .bind(Json(input.subscription))
        .bind(input.tenant_id)
        .bind(Json(input.preferences))
        .fetch_one(self.ready().await?)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active = TRUE"
        ))
        .bind(id)
        .fetch_optional(self.ready().await?)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active = TRUE"
        ))
        .bind(email)
        .fetch_optional(self.ready().await?)
        .await?;
        Ok(user)
    }

    async fn find_user_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE password_reset_token = $1 AND password_reset_expires > $2 AND active = TRUE"
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.ready().await?)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.ready().await?).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC");
        push_page(&mut query, filter.offset, filter.limit);
        let items = query.build_query_as::<User>().fetch_all(self.ready().await?).await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(name) = changes.name {
                set.push("name = ").push_bind_unseparated(name);
            }
            if let Some(email) = changes.email {
                set.push("email = ").push_bind_unseparated(email);
            }
            if let Some(role) = changes.role {
                set.push("role = ").push_bind_unseparated(role.as_str());
            }
            if let Some(preferences) = changes.preferences {
                set.push("preferences = ").push_bind_unseparated(Json(preferences));
            }
            if let Some(subscription) = changes.subscription {
                set.push("subscription = ").push_bind_unseparated(Json(subscription));
            }
            if let Some(tenant_id) = changes.tenant_id {
                set.push("tenant_id = ").push_bind_unseparated(tenant_id);
            }
            if let Some(active) = changes.active {
                set.push("active = ").push_bind_unseparated(active);
            }
            if let Some(hash) = changes.password_hash {
                set.push("password_hash = ").push_bind_unseparated(hash);
            }
            if let Some(changed_at) = changes.password_changed_at {
                set.push("password_changed_at = ").push_bind_unseparated(changed_at);
            }
            match changes.password_reset {
                Some(Some((token, expires))) => {
                    set.push("password_reset_token = ").push_bind_unseparated(token);
                    set.push("password_reset_expires = ").push_bind_unseparated(expires);
                }
                Some(None) => {
                    set.push("password_reset_token = NULL");
                    set.push("password_reset_expires = NULL");
                }
                None => {}
            }
            if let Some(at) = changes.last_login_at {
                set.push("last_login_at = ").push_bind_unseparated(at);
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND active = TRUE RETURNING ")
            .push(USER_COLUMNS);

        let user = qb.build_query_as::<User>().fetch_optional(self.ready().await?).await?;
        Ok(user)
    }
}

#[async_trait]
impl TenantRepository for PgStore {
    async fn create_tenant(&self, input: NewTenant) -> StoreResult<Tenant> {
        let tenant_id = Uuid::new_v4();
        let mut tx = self.ready().await?.begin().await?;

        let linked = sqlx::query("UPDATE users SET tenant_id = $1, updated_at = NOW() WHERE id = $2 AND active = TRUE")
            .bind(tenant_id)
            .bind(input.owner_id)
            .execute(&mut *tx)
            .await?;
        if linked.rows_affected() == 0 {
            return Err(StoreError::NotFound("No user found with that ID".to_string()));
        }

        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "INSERT INTO tenants (id, name, slug, domain, owner_id, subscription, billing, branding, settings)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(input.name)
        .bind(input.slug)
        .bind(input.domain)
        .bind(input.owner_id)
        .bind(Json(input.subscription))
        .bind(Json(input.billing))
        .bind(Json(input.branding))
        .bind(Json(input.settings))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(tenant)
    }

    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1 AND active = TRUE"
        ))
        .bind(id)
        .fetch_optional(self.ready().await?)
        .await?;
        Ok(tenant)
    }

    async fn list_tenants(&self, filter: &TenantFilter) -> StoreResult<Page<Tenant>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tenants");
        push_tenant_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.ready().await?).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {TENANT_COLUMNS} FROM tenants"));
        push_tenant_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC");
        push_page(&mut query, filter.offset, filter.limit);
        let items = query.build_query_as::<Tenant>().fetch_all(self.ready().await?).await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_tenant(&self, id: Uuid, changes: TenantChanges) -> StoreResult<Option<Tenant>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tenants SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(name) = changes.name {
                set.push("name = ").push_bind_unseparated(name);
            }
            if let Some(slug) = changes.slug {
                set.push("slug = ").push_bind_unseparated(slug);
            }
            if let Some(domain) = changes.domain {
                set.push("domain = ").push_bind_unseparated(domain);
            }
            if let Some(owner_id) = changes.owner_id {
                set.push("owner_id = ").push_bind_unseparated(owner_id);
            }
            if let Some(subscription) = changes.subscription {
                set.push("subscription = ").push_bind_unseparated(Json(subscription));
            }
            if let Some(billing) = changes.billing {
                set.push("billing = ").push_bind_unseparated(Json(billing));
            }
            if let Some(branding) = changes.branding {
                set.push("branding = ").push_bind_unseparated(Json(branding));
            }
            if let Some(settings) = changes.settings {
                set.push("settings = ").push_bind_unseparated(Json(settings));
            }
            if let Some(active) = changes.active {
                set.push("active = ").push_bind_unseparated(active);
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND active = TRUE RETURNING ")
            .push(TENANT_COLUMNS);

        let tenant = qb.build_query_as::<Tenant>().fetch_optional(self.ready().await?).await?;
        Ok(tenant)
    }
}

#[async_trait]
impl ConfigRepository for PgStore {
    async fn find_config(&self, config_type: ConfigType) -> StoreResult<Option<ConfigEntry>> {
        let entry = sqlx::query_as::<_, ConfigEntry>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM configs WHERE config_type = $1"
        ))
        .bind(config_type.as_str())
        .fetch_optional(self.ready().await?)
        .await?;
        Ok(entry)
    }

    async fn list_configs(&self) -> StoreResult<Vec<ConfigEntry>> {
        let entries = sqlx::query_as::<_, ConfigEntry>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM configs ORDER BY config_type"
        ))
        .fetch_all(self.ready().await?)
        .await?;
        Ok(entries)
    }

    async fn upsert_config(&self, config_type: ConfigType, update: ConfigUpdate) -> StoreResult<ConfigEntry> {
        let entry = sqlx::query_as::<_, ConfigEntry>(&format!(
            "INSERT INTO configs (id, config_type, plans, settings, updated_by)
             VALUES ($1, $2, COALESCE($3, '[]'::jsonb), COALESCE($4, '{{}}'::jsonb), $5)
             ON CONFLICT (config_type) DO UPDATE SET
                 plans = COALESCE($3, configs.plans),
                 settings = COALESCE($4, configs.settings),
                 updated_by = COALESCE($5, configs.updated_by),
                 updated_at = NOW()
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(config_type.as_str())
        .bind(update.plans.map(Json))
        .bind(update.settings)
        .bind(update.updated_by)
        .fetch_one(self.ready().await?)
        .await?;
        Ok(entry)
    }
}

#[async_trait]
impl InvoiceRepository for PgStore {
    async fn create_invoice(&self, input: NewInvoice) -> StoreResult<Invoice> {
        Self::insert_invoice(self.ready().await?, input).await
    }

    async fn find_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.ready().await?)
            .await?;
        Ok(invoice)
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Page<Invoice>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM invoices");
        push_invoice_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.ready().await?).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {INVOICE_COLUMNS} FROM invoices"));
        push_invoice_filters(&mut query, filter);
        query.push(" ORDER BY issued_at DESC");
        push_page(&mut query, filter.offset, filter.limit);
        let items = query.build_query_as::<Invoice>().fetch_all(self.ready().await?).await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices SET status = $2, paid_at = COALESCE($3, paid_at), updated_at = NOW()
             WHERE id = $1
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(paid_at)
        .fetch_optional(self.ready().await?)
        .await?;
        Ok(invoice)
    }
}

#[async_trait]
impl ActivityRepository for PgStore {
    async fn record_activity(&self, input: NewActivity) -> StoreResult<Activity> {
        let activity = sqlx::query_as::<_, Activity>(&format!(
            "INSERT INTO activities (id, user_id, tenant_id, action, target)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ACTIVITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.tenant_id)
        .bind(input.action)
        .bind(input.target)
        .fetch_one(self.ready().await?)
        .await?;
        Ok(activity)
    }

    async fn list_activities(&self, filter: &ActivityFilter) -> StoreResult<Vec<Activity>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE TRUE"));
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(tenant_id) = filter.tenant_id {
            qb.push(" AND tenant_id = ").push_bind(tenant_id);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.max(1) as i64);

        let activities = qb.build_query_as::<Activity>().fetch_all(self.ready().await?).await?;
        Ok(activities)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn apply_subscription_change(&self, change: SubscriptionChange) -> StoreResult<SubscriptionOutcome> {
        let mut tx = self.ready().await?.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET subscription = $2, updated_at = NOW()
             WHERE id = $1 AND active = TRUE
             RETURNING {USER_COLUMNS}"
        ))
        .bind(change.user_id)
        .bind(Json(change.subscription))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("No user found with that ID".to_string()))?;

        let tenant = match change.tenant {
            Some((tenant_id, mirror)) => Some(
                sqlx::query_as::<_, Tenant>(&format!(
                    "UPDATE tenants SET subscription = $2, updated_at = NOW()
                     WHERE id = $1 AND active = TRUE
                     RETURNING {TENANT_COLUMNS}"
                ))
                .bind(tenant_id)
                .bind(Json(mirror))
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound("No tenant found with that ID".to_string()))?,
            ),
            None => None,
        };

        let invoice = match change.invoice {
            Some(input) => Some(Self::insert_invoice(&mut *tx, input).await?),
            None => None,
        };

        // Dropping `tx` on any early return above rolls everything back.
        tx.commit().await?;
        Ok(SubscriptionOutcome { user, tenant, invoice })
    }

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        let mut stats = DashboardStats::default();

        let by_role: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users WHERE active = TRUE GROUP BY role")
                .fetch_all(self.ready().await?)
                .await?;
        stats.total_users = by_role.iter().map(|(_, n)| n).sum();
        stats.users_by_role = by_role.into_iter().collect();

        let by_plan: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(subscription->>'plan', 'free'), COUNT(*) FROM users WHERE active = TRUE GROUP BY 1",
        )
        .fetch_all(self.ready().await?)
        .await?;
        stats.users_by_plan = by_plan.into_iter().collect();

        stats.active_tenants = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE active = TRUE")
            .fetch_one(self.ready().await?)
            .await?;

        let by_status: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM invoices GROUP BY status")
            .fetch_all(self.ready().await?)
            .await?;
        stats.invoices_by_status = by_status.into_iter().collect();

        let (revenue, outstanding): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::BIGINT,
                    COALESCE(SUM(amount) FILTER (WHERE status = 'unpaid'), 0)::BIGINT
             FROM invoices",
        )
        .fetch_one(self.ready().await?)
        .await?;
        stats.revenue = revenue;
        stats.outstanding = outstanding;

        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.ready().await?).await?;
        Ok(())
    }
}
