use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::subscription::TenantSubscription;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingInfo {
    pub email: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            logo_url: None,
            primary_color: "#4f46e5".to_string(),
            secondary_color: "#0ea5e9".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSettings {
    pub allow_signup: bool,
    pub timezone: String,
    pub locale: String,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            allow_signup: false,
            timezone: "UTC".to_string(),
            locale: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub owner_id: Uuid,
    #[sqlx(json)]
    pub subscription: TenantSubscription,
    #[sqlx(json)]
    pub billing: BillingInfo,
    #[sqlx(json)]
    pub branding: Branding,
    #[sqlx(json)]
    pub settings: TenantSettings,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub owner_id: Uuid,
    pub subscription: TenantSubscription,
    pub billing: BillingInfo,
    pub branding: Branding,
    pub settings: TenantSettings,
}

#[derive(Debug, Clone, Default)]
pub struct TenantChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    /// `Some(None)` removes the custom domain.
    pub domain: Option<Option<String>>,
    pub owner_id: Option<Uuid>,
    pub subscription: Option<TenantSubscription>,
    pub billing: Option<BillingInfo>,
    pub branding: Option<Branding>,
    pub settings: Option<TenantSettings>,
    pub active: Option<bool>,
}

impl TenantChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.domain.is_none()
            && self.owner_id.is_none()
            && self.subscription.is_none()
            && self.billing.is_none()
            && self.branding.is_none()
            && self.settings.is_none()
            && self.active.is_none()
    }

    pub fn apply(self, tenant: &mut Tenant, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            tenant.name = name;
        }
        if let Some(slug) = self.slug {
            tenant.slug = slug;
        }
        if let Some(domain) = self.domain {
            tenant.domain = domain;
        }
        if let Some(owner_id) = self.owner_id {
            tenant.owner_id = owner_id;
        }
        if let Some(subscription) = self.subscription {
            tenant.subscription = subscription;
        }
        if let Some(billing) = self.billing {
            tenant.billing = billing;
        }
        if let Some(branding) = self.branding {
            tenant.branding = branding;
        }
        if let Some(settings) = self.settings {
            tenant.settings = settings;
        }
        if let Some(active) = self.active {
            tenant.active = active;
        }
        tenant.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

impl TenantFilter {
    pub fn matches(&self, tenant: &Tenant) -> bool {
        if !tenant.active {
            return false;
        }
        if let Some(owner_id) = self.owner_id {
            if tenant.owner_id != owner_id {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !tenant.name.to_lowercase().contains(&needle) && !tenant.slug.contains(&needle) {
                return false;
            }
        }
        true
    }
}
